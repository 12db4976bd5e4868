//! # Shopsync Core
//!
//! Domain types and invariants for the Shopsync storefront client core.
//!
//! This crate is the leaf of the workspace: it owns the order lifecycle
//! state machine, the session store, the push-event wire envelope, the
//! shared error taxonomy and the runtime configuration. The request client
//! (`shopsync-client`), the push subscriber (`shopsync-stream`) and the
//! synchronizer (`shopsync-orders`) all build on it.
//!
//! ## Core Concepts
//!
//! - **Session**: the credential pair plus actor role; at most one per
//!   device, owned by [`session::SessionStore`]
//! - **Order lifecycle**: `Pending → Processing → Shipped → Delivered`,
//!   with `Cancelled` reachable from any non-terminal state; legality is
//!   enforced locally before any remote call
//! - **Confirmation window**: a customer may confirm delivery only after a
//!   configured interval has elapsed since dispatch
//! - **Server wins**: authoritative state always lives server-side; local
//!   state is a read-through cache corrected by push events and
//!   reconciliation

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod order;
pub mod role;
pub mod session;

pub use clock::{Clock, SystemClock};
pub use config::{BackoffPolicy, SyncConfig};
pub use error::{Result, SyncError};
pub use event::{OrderEventType, PushEnvelope};
pub use order::{Order, OrderId, OrderRecord, OrderStatus};
pub use role::Role;
pub use session::{AccessToken, RefreshToken, Session, SessionStore};
