//! # Shopsync Client
//!
//! The authenticated request layer: every outbound call carries the current
//! access credential, and an expired-credential rejection triggers exactly
//! one single-flight renewal followed by exactly one retry.
//!
//! The transport is a trait seam ([`transport::Transport`]) so tests drive
//! the client with a scripted in-memory transport; production uses the
//! reqwest-backed [`http::HttpTransport`].

pub mod client;
pub mod http;
pub mod storage;
pub mod transport;

pub use client::ApiClient;
pub use http::HttpTransport;
pub use storage::{CredentialStore, FileCredentialStore, StorageError};
pub use transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
