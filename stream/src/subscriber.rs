//! Supervised push-channel subscription.
//!
//! [`EventSubscriber::subscribe`] spawns one supervision task per call.
//! The task keeps a channel open for as long as a session exists: on any
//! drop it waits a bounded exponential backoff and reconnects, and after a
//! configured run of consecutive failures it marks itself degraded so the
//! synchronizer can fall back to polling. It never gives up on its own;
//! only session teardown (or dropping the [`Subscription`]) ends it.

use crate::source::{EventSource, StreamError};
use futures::StreamExt;
use shopsync_core::config::BackoffPolicy;
use shopsync_core::event::PushEnvelope;
use shopsync_core::session::SessionStore;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Observable state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Opening (or re-opening) the channel.
    Connecting,
    /// Channel open, events flowing.
    Connected,
    /// Repeated failures; still retrying at the backoff ceiling, but the
    /// synchronizer should poll. Cleared by the next successful connect.
    Degraded,
    /// Torn down; a new subscription is needed after the next login.
    Closed,
}

/// Buffered events between the supervision task and the consumer.
const EVENT_BUFFER: usize = 64;

/// Factory for push-channel subscriptions.
pub struct EventSubscriber<S> {
    source: Arc<S>,
    sessions: SessionStore,
    backoff: BackoffPolicy,
    degraded_after: u32,
}

impl<S: EventSource + 'static> EventSubscriber<S> {
    /// Creates a subscriber over `source`, scoped by the session in
    /// `sessions`.
    #[must_use]
    pub fn new(
        source: S,
        sessions: SessionStore,
        backoff: BackoffPolicy,
        degraded_after: u32,
    ) -> Self {
        Self {
            source: Arc::new(source),
            sessions,
            backoff,
            degraded_after,
        }
    }

    /// Opens the push channel and returns a handle to consume it.
    ///
    /// Does not block: connection and reconnection happen inside the
    /// spawned task. Dropping the returned [`Subscription`] aborts it.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (status_tx, status_rx) = watch::channel(StreamStatus::Connecting);

        let source = Arc::clone(&self.source);
        let sessions = self.sessions.clone();
        let backoff = self.backoff.clone();
        let degraded_after = self.degraded_after;

        let task = tokio::spawn(async move {
            supervise(source, sessions, backoff, degraded_after, events_tx, &status_tx).await;
            status_tx.send_replace(StreamStatus::Closed);
        });

        Subscription {
            events: events_rx,
            status: status_rx,
            task,
        }
    }
}

/// Connect-consume-backoff loop; returns when the session is torn down,
/// absent, or the consumer went away.
async fn supervise<S: EventSource>(
    source: Arc<S>,
    sessions: SessionStore,
    backoff: BackoffPolicy,
    degraded_after: u32,
    events_tx: mpsc::Sender<PushEnvelope>,
    status_tx: &watch::Sender<StreamStatus>,
) {
    let mut teardown = sessions.watch_teardown();
    let generation = *teardown.borrow_and_update();
    let mut failures: u32 = 0;

    loop {
        if sessions.teardown_generation() != generation {
            tracing::debug!("Session torn down, closing push channel");
            return;
        }
        let Some(session) = sessions.current().await else {
            tracing::debug!("No session, closing push channel");
            return;
        };

        match source.connect(&session.access, session.role).await {
            Ok(mut stream) => {
                status_tx.send_replace(StreamStatus::Connected);
                failures = 0;
                tracing::info!(role = %session.role, "Push channel open");

                loop {
                    tokio::select! {
                        _ = teardown.changed() => {
                            tracing::debug!("Session torn down, closing push channel");
                            return;
                        }
                        item = stream.next() => match item {
                            Some(Ok(envelope)) => {
                                // The buffer can be full with a stalled
                                // consumer; teardown must still win.
                                tokio::select! {
                                    sent = events_tx.send(envelope) => {
                                        if sent.is_err() {
                                            // Consumer dropped the subscription.
                                            return;
                                        }
                                    }
                                    _ = teardown.changed() => {
                                        tracing::debug!("Session torn down, closing push channel");
                                        return;
                                    }
                                }
                            }
                            Some(Err(err)) => {
                                log_drop(&err);
                                break;
                            }
                            None => {
                                log_drop(&StreamError::Closed);
                                break;
                            }
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, failures, "Push channel connect failed");
            }
        }

        failures += 1;
        metrics::counter!("shopsync.stream.reconnects").increment(1);
        if failures >= degraded_after && *status_tx.borrow() != StreamStatus::Degraded {
            tracing::warn!(failures, "Push channel degraded, synchronizer should poll");
            status_tx.send_replace(StreamStatus::Degraded);
        } else if *status_tx.borrow() != StreamStatus::Degraded {
            status_tx.send_replace(StreamStatus::Connecting);
        }

        let delay = backoff.delay_for_attempt(failures.saturating_sub(1));
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = teardown.changed() => {
                tracing::debug!("Session torn down during backoff, closing push channel");
                return;
            }
        }
    }
}

/// Transient drops are logged, never surfaced to the UI.
fn log_drop(err: &StreamError) {
    tracing::debug!(error = %err, "Push channel dropped, will reconnect");
}

/// Handle on a live push subscription.
///
/// Owns the supervision task; dropping the handle aborts it.
pub struct Subscription {
    events: mpsc::Receiver<PushEnvelope>,
    status: watch::Receiver<StreamStatus>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Next pushed envelope; `None` once the channel is closed for good.
    pub async fn next_event(&mut self) -> Option<PushEnvelope> {
        self.events.recv().await
    }

    /// Current channel status.
    #[must_use]
    pub fn status(&self) -> StreamStatus {
        *self.status.borrow()
    }

    /// Watch handle for status changes (degraded-mode polling hooks on
    /// this).
    #[must_use]
    pub fn status_watch(&self) -> watch::Receiver<StreamStatus> {
        self.status.clone()
    }

    /// Tears the subscription down explicitly.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
