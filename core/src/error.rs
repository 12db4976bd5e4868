//! Error taxonomy shared across the client core.

use crate::order::OrderStatus;
use thiserror::Error;

/// Result type alias for client-core operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Failure modes of the client core, organized by where they surface.
///
/// The taxonomy is deliberately small: terminal session failures route the
/// UI to a re-authentication prompt, locally detected illegality never
/// reaches the network, and remote refusals carry the server's stated
/// reason because the server is the source of truth.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// No active session; the caller must log in first.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Credential renewal failed terminally; the session was cleared and
    /// the actor must log in again. Never retried.
    #[error("Session expired")]
    SessionExpired,

    /// The requested transition is outside the legality table, blocked by
    /// a terminal status, the actor's role, or the confirmation window.
    /// Detected locally; never sent to the remote.
    #[error("Illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Status the order currently holds.
        from: OrderStatus,
        /// Status that was requested.
        to: OrderStatus,
    },

    /// The remote refused an otherwise legal-looking transition. The
    /// server's verdict is authoritative; the local cache is resynced
    /// rather than the call retried.
    #[error("Remote rejected the request: {reason}")]
    RemoteRejected {
        /// The server's stated reason.
        reason: String,
    },

    /// The push channel has failed repeatedly and the synchronizer is
    /// polling instead. Non-fatal; surfaced at most as a "reconnecting"
    /// indicator.
    #[error("Push channel degraded, falling back to polling")]
    StreamDegraded,

    /// A transport-level failure (connect, TLS, decode). Transient; only
    /// the renewal flow carries a single retry.
    #[error("Network error: {0}")]
    Network(String),

    /// The order is not in the local cache.
    #[error("Unknown order: {0}")]
    UnknownOrder(String),
}

impl SyncError {
    /// Returns `true` if the failure forces re-authentication.
    ///
    /// # Examples
    ///
    /// ```
    /// # use shopsync_core::SyncError;
    /// assert!(SyncError::SessionExpired.is_terminal());
    /// assert!(!SyncError::StreamDegraded.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::SessionExpired)
    }

    /// Returns `true` if the failure is expected to clear on its own.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::StreamDegraded)
    }
}
