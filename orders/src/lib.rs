//! # Shopsync Orders
//!
//! The order lifecycle synchronizer: the one component UI code talks to.
//! It keeps a local read-through cache of every order visible to the
//! current actor, gates mutations on the legality table, the actor's role
//! and the confirmation window, and folds push events and periodic
//! reconciliation through a single idempotent apply path.
//!
//! Unseen transitions are aggregated into the notification ledger for the
//! badge count; acknowledging an order destroys its entries.

pub mod notifications;
pub mod synchronizer;

pub use notifications::{NotificationEntry, NotificationLedger};
pub use synchronizer::OrderSynchronizer;
