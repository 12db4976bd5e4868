//! Event source seam.

use futures::stream::BoxStream;
use shopsync_core::event::PushEnvelope;
use shopsync_core::role::Role;
use shopsync_core::session::AccessToken;
use thiserror::Error;

/// A live push channel: envelopes until the connection drops.
pub type EventStream = BoxStream<'static, Result<PushEnvelope, StreamError>>;

/// Failures of a single push connection.
///
/// All of these are transient from the subscriber's point of view; it
/// reconnects with backoff and only reports degradation after repeated
/// failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Could not open the channel.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// The channel broke or delivered something undecodable.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server closed the channel.
    #[error("Channel closed by server")]
    Closed,
}

/// Opens role-scoped push channels.
///
/// Scoping is enforced server-side from the credential presented at
/// connection time; the client consumes whatever it is sent.
pub trait EventSource: Send + Sync {
    /// Opens a channel authenticated by `token` for the given role.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Connect`] if the channel cannot be opened.
    fn connect(
        &self,
        token: &AccessToken,
        role: Role,
    ) -> impl Future<Output = Result<EventStream, StreamError>> + Send;
}
