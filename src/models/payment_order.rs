use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle of a payment order. `Created` is the only non-terminal state;
/// a terminal order must never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Created,
    Success,
    Failed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Success => "SUCCESS",
            OrderStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(OrderStatus::Created),
            "SUCCESS" => Some(OrderStatus::Success),
            "FAILED" => Some(OrderStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Success | OrderStatus::Failed)
    }

    /// CREATED -> SUCCESS and CREATED -> FAILED are the only legal moves.
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        self == OrderStatus::Created && to.is_terminal()
    }
}

/// Record of one external payment gateway transaction.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub id: i64,
    /// Order id assigned by the gateway, referenced from confirmation requests.
    pub order_id: String,
    /// Payment id reported by the gateway once the payment resolves.
    pub payment_id: Option<String>,
    /// Amount in minor units (paise).
    pub amount: i64,
    pub status: String,
    pub description: String,
    pub created_at: NaiveDateTime,
}

impl PaymentOrder {
    pub fn status(&self) -> Option<OrderStatus> {
        OrderStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentOrder {
    pub order_id: String,
    pub amount: i64,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_reaches_both_terminal_states() {
        assert!(OrderStatus::Created.can_transition_to(OrderStatus::Success));
        assert!(OrderStatus::Created.can_transition_to(OrderStatus::Failed));
    }

    #[test]
    fn terminal_states_never_transition() {
        for from in [OrderStatus::Success, OrderStatus::Failed] {
            for to in [OrderStatus::Created, OrderStatus::Success, OrderStatus::Failed] {
                assert!(!from.can_transition_to(to));
            }
        }
        assert!(!OrderStatus::Created.can_transition_to(OrderStatus::Created));
    }

    #[test]
    fn status_strings_round_trip() {
        for s in [OrderStatus::Created, OrderStatus::Success, OrderStatus::Failed] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::parse("PENDING"), None);
    }
}
