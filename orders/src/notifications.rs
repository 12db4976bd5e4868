//! Notification aggregation.
//!
//! One entry per `(order, event)` pair: duplicate pushes for the same
//! transition collapse into a single unseen notification. Entries are
//! destroyed when the actor acknowledges the order (opens its detail) or
//! when the order is evicted from the cache.

use chrono::{DateTime, Utc};
use shopsync_core::event::OrderEventType;
use shopsync_core::order::OrderId;
use std::collections::HashMap;

/// A state transition the current actor has not yet seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEntry {
    /// Order the transition concerns.
    pub order_id: OrderId,
    /// Kind of transition.
    pub event: OrderEventType,
    /// When the synchronizer observed it.
    pub observed_at: DateTime<Utc>,
}

/// Deduplicating store of unseen transitions.
#[derive(Debug, Default)]
pub struct NotificationLedger {
    entries: HashMap<(OrderId, OrderEventType), NotificationEntry>,
}

impl NotificationLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an unseen transition.
    ///
    /// Returns `false` if an entry for the same `(order, event)` pair
    /// already exists; the duplicate is dropped.
    pub fn insert(&mut self, order_id: OrderId, event: OrderEventType, at: DateTime<Utc>) -> bool {
        let key = (order_id.clone(), event);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(
            key,
            NotificationEntry {
                order_id,
                event,
                observed_at: at,
            },
        );
        true
    }

    /// Destroys every entry for `order_id`; returns how many existed.
    ///
    /// Called when the actor opens the order detail, and when an order is
    /// evicted.
    pub fn acknowledge(&mut self, order_id: &OrderId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(id, _), _| id != order_id);
        before - self.entries.len()
    }

    /// Destroys the entry for one specific transition, if present.
    pub fn remove(&mut self, order_id: &OrderId, event: OrderEventType) {
        self.entries.remove(&(order_id.clone(), event));
    }

    /// Count of unseen transitions.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Snapshot of all entries, newest first.
    #[must_use]
    pub fn entries(&self) -> Vec<NotificationEntry> {
        let mut entries: Vec<_> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        entries
    }

    /// Destroys everything (logout).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
