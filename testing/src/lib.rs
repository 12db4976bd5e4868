//! # Shopsync Testing
//!
//! Mock collaborators and helpers for testing the client core:
//!
//! - [`MockTransport`](mocks::MockTransport): scripted request/renewal
//!   transport with call counters for single-flight assertions
//! - [`MockEventSource`](mocks::MockEventSource): scripted push-channel
//!   connect attempts for reconnect and degraded-mode tests
//! - [`mocks::FixedClock`]: deterministic time for the confirmation-window
//!   gate
//! - [`init_tracing`]: env-filtered subscriber for test logs

pub mod mocks;

/// Installs a tracing subscriber honoring `RUST_LOG` for tests.
///
/// Safe to call from multiple tests; only the first call installs.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builds a session with the given tokens and role.
#[must_use]
pub fn session(
    access: &str,
    refresh: &str,
    role: shopsync_core::Role,
) -> shopsync_core::Session {
    shopsync_core::Session {
        access: shopsync_core::AccessToken::new(access.to_string()),
        refresh: shopsync_core::RefreshToken::new(refresh.to_string()),
        role,
        expires_hint: None,
    }
}
