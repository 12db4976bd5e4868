//! # Shopsync Stream
//!
//! The server-push side of the client core: a long-lived, role-scoped
//! event channel that survives drops with bounded exponential backoff and
//! degrades to a polling hint instead of ever giving up while a session
//! exists.
//!
//! Delivery is at-most-once per physical event; the synchronizer's
//! legality-checked apply path makes duplicates harmless and periodic
//! reconciliation covers gaps.

pub mod source;
pub mod sse;
pub mod subscriber;

pub use source::{EventSource, EventStream, StreamError};
pub use sse::SseEventSource;
pub use subscriber::{EventSubscriber, StreamStatus, Subscription};
