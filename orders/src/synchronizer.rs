//! The order lifecycle synchronizer.

use crate::notifications::{NotificationEntry, NotificationLedger};
use shopsync_client::client::ApiClient;
use shopsync_client::storage::CredentialStore;
use shopsync_client::transport::{ApiRequest, Transport};
use shopsync_core::clock::{Clock, SystemClock};
use shopsync_core::config::SyncConfig;
use shopsync_core::event::{OrderEventType, PushEnvelope};
use shopsync_core::order::{Order, OrderId, OrderRecord, OrderStatus};
use shopsync_core::{Result, SyncError};
use shopsync_stream::subscriber::Subscription;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// The event type a reconciliation-discovered status change corresponds to.
const fn event_for(status: OrderStatus) -> OrderEventType {
    match status {
        OrderStatus::Pending => OrderEventType::Placed,
        OrderStatus::Processing => OrderEventType::Processing,
        OrderStatus::Shipped => OrderEventType::Shipped,
        OrderStatus::Delivered => OrderEventType::Delivered,
        OrderStatus::Cancelled => OrderEventType::Cancelled,
    }
}

/// Maintains the locally known state of every order visible to the current
/// actor.
///
/// The cache is written only here — push events, reconciliation rows and
/// mutation responses all pass through the same legality-checked apply
/// path, so live push and manual refresh cannot diverge in effect. Callers
/// treat [`OrderSynchronizer::observe`] results as immutable snapshots.
///
/// Cheap to clone; clones share the cache and ledger.
pub struct OrderSynchronizer<T, C = ()> {
    client: ApiClient<T, C>,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    notifications: Arc<RwLock<NotificationLedger>>,
    needs_resync: Arc<AtomicBool>,
}

impl<T, C> Clone for OrderSynchronizer<T, C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            orders: Arc::clone(&self.orders),
            notifications: Arc::clone(&self.notifications),
            needs_resync: Arc::clone(&self.needs_resync),
        }
    }
}

impl<T: Transport + 'static, C: CredentialStore + 'static> OrderSynchronizer<T, C> {
    /// Creates a synchronizer on the system clock.
    #[must_use]
    pub fn new(client: ApiClient<T, C>, config: SyncConfig) -> Self {
        Self::with_clock(client, config, Arc::new(SystemClock))
    }

    /// Creates a synchronizer with an injected clock (tests).
    #[must_use]
    pub fn with_clock(client: ApiClient<T, C>, config: SyncConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            config,
            clock,
            orders: Arc::new(RwLock::new(HashMap::new())),
            notifications: Arc::new(RwLock::new(NotificationLedger::new())),
            needs_resync: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot of one order, if known locally.
    pub async fn observe(&self, order_id: &OrderId) -> Option<Order> {
        self.orders.read().await.get(order_id).cloned()
    }

    /// Snapshot of every locally known order.
    pub async fn orders(&self) -> Vec<Order> {
        self.orders.read().await.values().cloned().collect()
    }

    /// Count of unseen transitions for the badge.
    pub async fn pending_notifications(&self) -> usize {
        self.notifications.read().await.pending()
    }

    /// Snapshot of the unseen transitions, newest first.
    pub async fn notifications(&self) -> Vec<NotificationEntry> {
        self.notifications.read().await.entries()
    }

    /// Marks an order's transitions as seen (UI opened the detail).
    pub async fn acknowledge(&self, order_id: &OrderId) {
        self.notifications.write().await.acknowledge(order_id);
    }

    /// Whether the local cache should be reconciled ahead of schedule.
    #[must_use]
    pub fn needs_resync(&self) -> bool {
        self.needs_resync.load(Ordering::Acquire)
    }

    /// Requests a state transition for an order.
    ///
    /// Legality is checked locally first: the transition must appear in
    /// the legality table from the order's current status, the session
    /// role must match the transition's triggering role, the order must
    /// not be terminal, and a customer confirming delivery must be past
    /// the confirmation window. Any of these failing rejects the call with
    /// [`SyncError::IllegalTransition`] before a byte goes out.
    ///
    /// The remote is the final arbiter: its response is applied as
    /// authoritative on success, and a rejection leaves the cache on the
    /// last authoritative status and flags a resync instead of retrying.
    ///
    /// # Errors
    ///
    /// - [`SyncError::UnknownOrder`] if the order is not cached
    /// - [`SyncError::IllegalTransition`] for any locally detected
    ///   violation
    /// - [`SyncError::RemoteRejected`] when the server refuses
    /// - [`SyncError::Unauthenticated`] / [`SyncError::SessionExpired`] /
    ///   [`SyncError::Network`] from the request layer
    pub async fn request_transition(&self, order_id: &OrderId, to: OrderStatus) -> Result<Order> {
        let Some(session) = self.client.sessions().current().await else {
            return Err(SyncError::Unauthenticated);
        };
        let current = self
            .observe(order_id)
            .await
            .ok_or_else(|| SyncError::UnknownOrder(order_id.to_string()))?;

        let illegal = || SyncError::IllegalTransition {
            from: current.status,
            to,
        };
        let Some(required_role) = current.status.triggering_role(to) else {
            return Err(illegal());
        };
        if required_role != session.role {
            tracing::debug!(
                order_id = %order_id,
                role = %session.role,
                required = %required_role,
                "Transition refused: wrong role"
            );
            return Err(illegal());
        }
        if to == OrderStatus::Delivered
            && !current.confirmable(self.clock.now(), self.config.confirmation_window)
        {
            tracing::debug!(
                order_id = %order_id,
                dispatched_at = ?current.dispatched_at,
                "Confirmation refused: window not yet elapsed"
            );
            return Err(illegal());
        }

        let request = ApiRequest::post(
            format!("/orders/{order_id}/transition"),
            serde_json::json!({ "to": to }),
        );
        match self.client.send(&request).await {
            Ok(response) => {
                let record: OrderRecord = response.json()?;
                let updated = self.absorb_authoritative(record).await;
                // The actor caused this transition; it is not "unseen".
                self.notifications
                    .write()
                    .await
                    .remove(order_id, event_for(updated.status));
                Ok(updated)
            }
            Err(SyncError::RemoteRejected { reason }) => {
                // Server wins. Nothing was applied locally; resync so the
                // cache reflects whatever state the server actually holds.
                tracing::warn!(order_id = %order_id, reason = %reason, "Remote rejected transition");
                self.needs_resync.store(true, Ordering::Release);
                Err(SyncError::RemoteRejected { reason })
            }
            Err(err) => Err(err),
        }
    }

    /// Folds an authoritative mutation response into the cache.
    async fn absorb_authoritative(&self, record: OrderRecord) -> Order {
        let now = self.clock.now();
        let mut orders = self.orders.write().await;
        match orders.get_mut(&record.id) {
            Some(order) => {
                Self::absorb_steps(order, &record, now);
                order.absorb_record(&record, now);
                order.clone()
            }
            None => {
                let order = Order::from_record(record, now);
                orders.insert(order.id.clone(), order.clone());
                order
            }
        }
    }

    /// Walks a cached order up to an authoritative status, one legal
    /// transition at a time.
    ///
    /// Returns the steps that changed the order, so reconciliation can
    /// record one notification per missed transition. The server is the
    /// source of truth: a status the legality table cannot reach from the
    /// cached one (the cache somehow ran ahead) is taken as-is.
    fn absorb_steps(
        order: &mut Order,
        record: &OrderRecord,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Vec<OrderStatus> {
        if let Some(path) = order.status.path_to(record.status) {
            let mut applied = Vec::new();
            for step in path {
                if order.apply_status(step, now) {
                    applied.push(step);
                }
            }
            applied
        } else {
            tracing::warn!(
                order_id = %record.id,
                local = %order.status,
                remote = %record.status,
                "Authoritative status unreachable from cached one, taking server's"
            );
            order.status = record.status;
            order.last_synced_at = now;
            vec![record.status]
        }
    }

    /// Applies a push-delivered event.
    ///
    /// The single apply path: legal transitions move the cache and record
    /// a notification; duplicates and illegal moves are logged and
    /// discarded, which makes at-most-once delivery with gaps and
    /// reordering safe. A push event for an unknown order creates it
    /// (first observation).
    ///
    /// Returns `true` if the cache changed.
    pub async fn apply_event(&self, envelope: &PushEnvelope) -> bool {
        let target = envelope.event.target_status();
        let now = self.clock.now();

        let changed = {
            let mut orders = self.orders.write().await;
            match orders.get_mut(&envelope.order_id) {
                Some(order) => {
                    let applied = order.apply_status(target, envelope.timestamp);
                    if !applied {
                        tracing::debug!(
                            order_id = %envelope.order_id,
                            from = %order.status,
                            to = %target,
                            "Discarding push event: not a legal transition"
                        );
                    }
                    applied
                }
                None => {
                    orders.insert(
                        envelope.order_id.clone(),
                        Order {
                            id: envelope.order_id.clone(),
                            status: target,
                            dispatched_at: (target == OrderStatus::Shipped)
                                .then_some(envelope.timestamp),
                            last_synced_at: now,
                        },
                    );
                    true
                }
            }
        };

        if changed {
            self.notifications
                .write()
                .await
                .insert(envelope.order_id.clone(), envelope.event, now);
        }
        changed
    }

    /// Fetches the full role-scoped order list and reconciles the cache.
    ///
    /// Every row routes through the same legality-checked apply used for
    /// push events, so a missed or reordered push is corrected here: a row
    /// several statuses ahead of the cache is decomposed into its legal
    /// step sequence and each missed transition records a notification.
    /// Orders the server no longer reports are evicted along with their
    /// notifications. First observations do not notify (the initial fetch
    /// is not "news").
    ///
    /// # Errors
    ///
    /// Propagates request-layer errors; the cache is left untouched on
    /// failure.
    pub async fn reconcile(&self) -> Result<()> {
        let response = self.client.send(&ApiRequest::get("/orders")).await?;
        let records: Vec<OrderRecord> = response.json()?;
        let now = self.clock.now();

        let mut notify = Vec::new();
        let mut evicted = Vec::new();
        {
            let seen: HashSet<OrderId> = records.iter().map(|r| r.id.clone()).collect();
            let mut orders = self.orders.write().await;

            for record in records {
                match orders.get_mut(&record.id) {
                    Some(order) => {
                        for step in Self::absorb_steps(order, &record, now) {
                            notify.push((record.id.clone(), event_for(step)));
                        }
                        order.absorb_record(&record, now);
                    }
                    None => {
                        orders.insert(record.id.clone(), Order::from_record(record, now));
                    }
                }
            }

            orders.retain(|id, _| {
                let keep = seen.contains(id);
                if !keep {
                    evicted.push(id.clone());
                }
                keep
            });
        }

        let mut notifications = self.notifications.write().await;
        for (order_id, event) in notify {
            notifications.insert(order_id, event, now);
        }
        for order_id in &evicted {
            notifications.acknowledge(order_id);
        }
        drop(notifications);

        self.needs_resync.store(false, Ordering::Release);
        tracing::debug!(evicted = evicted.len(), "Reconciled order cache");
        Ok(())
    }

    /// Drops the cache and ledger (session changed hands).
    pub async fn evict_all(&self) {
        self.orders.write().await.clear();
        self.notifications.write().await.clear();
        self.needs_resync.store(false, Ordering::Release);
    }

    /// Drives the synchronizer from a live subscription.
    ///
    /// Consumes push events as they arrive and reconciles on every
    /// `poll_interval` tick: delivery is at-most-once, so even a healthy
    /// channel can have gaps, and the standing poll is what repairs them.
    /// While the channel is degraded the same tick is the only source of
    /// updates. Returns when the session is torn down, after evicting all
    /// local state.
    pub async fn run(&self, mut subscription: Subscription) {
        let mut teardown = self.client.sessions().watch_teardown();
        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so polling starts one
        // interval in.
        poll.tick().await;

        loop {
            tokio::select! {
                _ = teardown.changed() => {
                    tracing::debug!("Session torn down, stopping synchronizer");
                    break;
                }
                event = subscription.next_event() => match event {
                    Some(envelope) => {
                        self.apply_event(&envelope).await;
                    }
                    None => {
                        tracing::debug!("Subscription closed, stopping synchronizer");
                        break;
                    }
                },
                _ = poll.tick() => {
                    if let Err(err) = self.reconcile().await {
                        if err.is_terminal() {
                            tracing::warn!(error = %err, "Synchronizer stopping: session gone");
                            break;
                        }
                        tracing::warn!(error = %err, "Reconciliation poll failed");
                    }
                }
            }
        }

        self.evict_all().await;
    }
}
