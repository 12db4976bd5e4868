//! Session state and the session store.
//!
//! There is at most one [`Session`] per device. The [`SessionStore`] owns
//! it: the credential pair is swapped as a unit (never one token at a
//! time), and `clear` bumps a teardown generation that dependents watch so
//! the push channel closes and in-flight renewals abandon within one tick.

use crate::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};

/// Short-lived credential attached to every outbound request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken(String);

impl AccessToken {
    /// Creates an access token from its wire form.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// Returns the raw token for header injection.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens never reach logs.
        write!(f, "AccessToken(..)")
    }
}

/// Long-lived credential used only against the renewal endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken(String);

impl RefreshToken {
    /// Creates a refresh token from its wire form.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// Returns the raw token for the renewal request body.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefreshToken(..)")
    }
}

/// The authenticated session: credential pair, actor role and an expiry
/// hint the server sent alongside the pair.
///
/// The hint is advisory only — expiry is detected by the remote rejecting
/// a request, never by the client racing a clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Credential attached to requests.
    pub access: AccessToken,
    /// Credential for renewal.
    pub refresh: RefreshToken,
    /// Actor role, fixed at login.
    pub role: Role,
    /// Server-supplied hint for when `access` expires.
    pub expires_hint: Option<DateTime<Utc>>,
}

/// Holds the single session for this device.
///
/// All reads and writes are serialized behind one lock; `replace` swaps the
/// whole session atomically (last write wins) and `clear` signals every
/// dependent to tear down. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
    teardown_tx: watch::Sender<u64>,
}

impl SessionStore {
    /// Creates an empty (logged-out) store.
    #[must_use]
    pub fn new() -> Self {
        let (teardown_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(None)),
            teardown_tx,
        }
    }

    /// Creates a store seeded with a persisted session.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        let (teardown_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(Some(session))),
            teardown_tx,
        }
    }

    /// Returns a snapshot of the current session, if logged in.
    pub async fn current(&self) -> Option<Session> {
        self.inner.read().await.clone()
    }

    /// Atomically replaces the session (login or successful renewal).
    pub async fn replace(&self, session: Session) {
        *self.inner.write().await = Some(session);
    }

    /// Removes the session and signals dependents to tear down.
    ///
    /// Used on logout and on terminal renewal failure. The teardown
    /// generation is bumped even when the store was already empty, so a
    /// subscriber mid-reconnect still observes the signal.
    pub async fn clear(&self) {
        *self.inner.write().await = None;
        self.teardown_tx.send_modify(|generation| *generation += 1);
    }

    /// Current teardown generation; bumped once per [`Self::clear`].
    #[must_use]
    pub fn teardown_generation(&self) -> u64 {
        *self.teardown_tx.borrow()
    }

    /// Watch handle for teardown signals.
    ///
    /// The channel carries a generation counter rather than a boolean so a
    /// receiver that was created between two `clear` calls still sees a
    /// change notification for the second one.
    #[must_use]
    pub fn watch_teardown(&self) -> watch::Receiver<u64> {
        self.teardown_tx.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
