//! Authenticated request client with single-flight credential renewal.
//!
//! # Renewal protocol
//!
//! A request rejected with an expired-credential signal joins the single
//! process-wide renewal (starting it if none is in flight), then retries
//! exactly once with the refreshed credential. Renewal itself gets one
//! retry on a network error; any further failure is terminal — the session
//! is cleared, and every caller parked on the renewal observes the same
//! [`SyncError::SessionExpired`].

use crate::storage::CredentialStore;
use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};
use futures::FutureExt;
use futures::future::Shared;
use shopsync_core::session::{Session, SessionStore};
use shopsync_core::{Result, SyncError};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

type RenewalFuture = Shared<Pin<Box<dyn Future<Output = Result<Session>> + Send>>>;

/// The single-flight renewal slot.
///
/// Invariant: at most one renewal future exists process-wide. The id lets
/// the completing future clear only its own entry, so a renewal started
/// after this one finished is never clobbered.
#[derive(Default)]
struct RenewalSlot {
    task: Option<(u64, RenewalFuture)>,
    next_id: u64,
}

/// Authenticated request client.
///
/// Cheap to clone; clones share the session store and the renewal slot.
pub struct ApiClient<T, C = ()> {
    transport: Arc<T>,
    sessions: SessionStore,
    persistence: Option<Arc<C>>,
    renewal: Arc<Mutex<RenewalSlot>>,
}

impl<T, C> Clone for ApiClient<T, C> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            sessions: self.sessions.clone(),
            persistence: self.persistence.clone(),
            renewal: Arc::clone(&self.renewal),
        }
    }
}

impl<T: Transport + 'static> ApiClient<T, ()> {
    /// Creates a client without durable credential persistence.
    #[must_use]
    pub fn new(transport: T, sessions: SessionStore) -> Self {
        Self {
            transport: Arc::new(transport),
            sessions,
            persistence: None,
            renewal: Arc::new(Mutex::new(RenewalSlot::default())),
        }
    }
}

impl<T: Transport + 'static, C: CredentialStore + 'static> ApiClient<T, C> {
    /// Creates a client that mirrors session changes (renewal, teardown)
    /// into a durable credential store.
    #[must_use]
    pub fn with_persistence(transport: T, sessions: SessionStore, store: C) -> Self {
        Self {
            transport: Arc::new(transport),
            sessions,
            persistence: Some(Arc::new(store)),
            renewal: Arc::new(Mutex::new(RenewalSlot::default())),
        }
    }

    /// The session store this client reads its credential from.
    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Sends an authenticated request.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Unauthenticated`] when no session exists
    /// - [`SyncError::SessionExpired`] when renewal failed terminally, or
    ///   the remote rejected a freshly renewed credential
    /// - [`SyncError::RemoteRejected`] for any other remote refusal
    /// - [`SyncError::Network`] for transport failures; arbitrary requests
    ///   are never retried on these
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let Some(session) = self.sessions.current().await else {
            return Err(SyncError::Unauthenticated);
        };

        match self.transport.execute(request, &session.access).await {
            Ok(response) => Ok(response),
            Err(TransportError::CredentialExpired) => {
                let renewed = self.join_renewal().await?;
                tracing::debug!(
                    method = request.method.as_str(),
                    path = %request.path,
                    "Retrying request with renewed credential"
                );
                match self.transport.execute(request, &renewed.access).await {
                    Ok(response) => Ok(response),
                    Err(TransportError::CredentialExpired) => {
                        // A credential renewed moments ago was rejected
                        // again; renewal no longer authenticates us.
                        tracing::warn!("Freshly renewed credential rejected, clearing session");
                        self.teardown().await;
                        Err(SyncError::SessionExpired)
                    }
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Joins the in-flight renewal, starting one if the slot is empty.
    ///
    /// Every concurrent caller awaits the same shared future and observes
    /// the same renewed session or the same terminal error.
    async fn join_renewal(&self) -> Result<Session> {
        let future = {
            let mut slot = self
                .renewal
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some((_, future)) = &slot.task {
                tracing::debug!("Joining in-flight credential renewal");
                future.clone()
            } else {
                let id = slot.next_id;
                slot.next_id += 1;
                let future = self.start_renewal(id);
                slot.task = Some((id, future.clone()));
                future
            }
        };
        future.await
    }

    /// Builds the renewal future for slot entry `id`.
    ///
    /// The future owns clones of everything it touches so it can be shared
    /// across callers; it clears its own slot entry on completion.
    fn start_renewal(&self, id: u64) -> RenewalFuture {
        let transport = Arc::clone(&self.transport);
        let sessions = self.sessions.clone();
        let persistence = self.persistence.clone();
        let renewal = Arc::clone(&self.renewal);

        let future: Pin<Box<dyn Future<Output = Result<Session>> + Send>> =
            Box::pin(async move {
                metrics::counter!("shopsync.client.renewals").increment(1);
                tracing::info!("Renewing expired credential");

                let result = Self::renew_once_with_retry(&transport, &sessions).await;

                match &result {
                    Ok(session) => {
                        sessions.replace(session.clone()).await;
                        if let Some(store) = &persistence {
                            if let Err(err) = store.save(session).await {
                                tracing::warn!(error = %err, "Failed to persist renewed credentials");
                            }
                        }
                        tracing::info!("Credential renewal succeeded");
                    }
                    Err(err) => {
                        metrics::counter!("shopsync.client.renewal_failures").increment(1);
                        tracing::error!(error = %err, "Credential renewal failed, clearing session");
                        sessions.clear().await;
                        if let Some(store) = &persistence {
                            if let Err(err) = store.clear().await {
                                tracing::warn!(error = %err, "Failed to clear persisted credentials");
                            }
                        }
                    }
                }

                let mut slot = renewal.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.task.as_ref().is_some_and(|(task_id, _)| *task_id == id) {
                    slot.task = None;
                }

                result
            });
        future.shared()
    }

    /// One renewal round-trip, with a single retry on a network error.
    ///
    /// A remote rejection of the renewal credential is terminal and is not
    /// retried.
    async fn renew_once_with_retry(
        transport: &Arc<T>,
        sessions: &SessionStore,
    ) -> Result<Session> {
        let Some(current) = sessions.current().await else {
            return Err(SyncError::Unauthenticated);
        };

        match transport.renew(&current.refresh).await {
            Ok(session) => Ok(session),
            Err(TransportError::Network(reason)) => {
                tracing::warn!(error = %reason, "Renewal hit a network error, retrying once");
                match transport.renew(&current.refresh).await {
                    Ok(session) => Ok(session),
                    Err(_) => Err(SyncError::SessionExpired),
                }
            }
            Err(_) => Err(SyncError::SessionExpired),
        }
    }

    /// Clears the session and the durable credential copy.
    async fn teardown(&self) {
        self.sessions.clear().await;
        if let Some(store) = &self.persistence {
            if let Err(err) = store.clear().await {
                tracing::warn!(error = %err, "Failed to clear persisted credentials");
            }
        }
    }
}
