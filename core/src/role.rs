//! Actor roles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of the currently authenticated actor.
///
/// The role determines which order transitions may be initiated locally
/// (see [`crate::order::OrderStatus::triggering_role`]) and which scope the
/// server applies to the push channel: an admin channel carries new-order
/// events, a customer channel carries status events for that customer's own
/// orders only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A shopper: may confirm delivery of their own shipped orders.
    Customer,
    /// Back-office staff: may accept, ship and cancel orders.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn role_serde_roundtrip() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::Admin);
    }
}
