//! Push-channel wire envelope and typed order events.
//!
//! The push channel delivers JSON envelopes `{ type, orderId, payload,
//! timestamp }`. Envelope `type` strings map onto [`OrderEventType`]; the
//! subscriber decodes envelopes and hands typed events to the synchronizer,
//! which is responsible for tolerating duplicates and gaps.

use crate::order::{OrderId, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of order event the server pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventType {
    /// A new order was placed (admin scope).
    Placed,
    /// The order was accepted and is being prepared.
    Processing,
    /// The order was handed to the carrier.
    Shipped,
    /// The customer confirmed receipt.
    Delivered,
    /// The order was cancelled.
    Cancelled,
}

impl OrderEventType {
    /// The status an order holds after this event, used by the idempotent
    /// apply path.
    ///
    /// `Placed` maps to the initial status rather than a transition.
    #[must_use]
    pub const fn target_status(self) -> OrderStatus {
        match self {
            Self::Placed => OrderStatus::Pending,
            Self::Processing => OrderStatus::Processing,
            Self::Shipped => OrderStatus::Shipped,
            Self::Delivered => OrderStatus::Delivered,
            Self::Cancelled => OrderStatus::Cancelled,
        }
    }
}

impl fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placed => write!(f, "placed"),
            Self::Processing => write!(f, "processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A push-channel message as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEnvelope {
    /// Event kind.
    #[serde(rename = "type")]
    pub event: OrderEventType,
    /// Order the event concerns.
    pub order_id: OrderId,
    /// Event-specific payload; opaque to the core.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Server-side time of the event.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn envelope_decodes_wire_json() {
        let json = r#"{
            "type": "shipped",
            "orderId": "order-42",
            "payload": { "carrier": "dhl" },
            "timestamp": "2026-03-01T12:00:00Z"
        }"#;
        let envelope: PushEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.event, OrderEventType::Shipped);
        assert_eq!(envelope.order_id.as_str(), "order-42");
        assert_eq!(envelope.payload["carrier"], "dhl");
    }

    #[test]
    fn envelope_tolerates_missing_payload() {
        let json = r#"{
            "type": "cancelled",
            "orderId": "order-7",
            "timestamp": "2026-03-01T12:00:00Z"
        }"#;
        let envelope: PushEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.payload.is_null());
    }

    #[test]
    fn event_types_map_to_statuses() {
        assert_eq!(
            OrderEventType::Placed.target_status(),
            OrderStatus::Pending
        );
        assert_eq!(
            OrderEventType::Delivered.target_status(),
            OrderStatus::Delivered
        );
    }
}
