use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Coordinates;

/// Delivery lifecycle reported by the server for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    OnDelivery,
    Completed,
}

impl OrderStatus {
    /// Human-readable label for status display.
    pub fn display(&self) -> &'static str {
        match self {
            OrderStatus::OnDelivery => "On Delivery",
            OrderStatus::Completed => "Completed",
        }
    }
}

/// One order as returned by the ordering service.
///
/// The drone's `current_position` and the timestamps move on every poll
/// while the order is on delivery; `delivery_timestamp` only appears once
/// the order has completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub oid: i64,
    pub mid: i64,
    #[serde(default)]
    pub uid: Option<i64>,
    pub status: OrderStatus,
    #[serde(default)]
    pub delivery_location: Option<Coordinates>,
    #[serde(default)]
    pub current_position: Option<Coordinates>,
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expected_delivery_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivery_timestamp: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_on_delivery(&self) -> bool {
        self.status == OrderStatus::OnDelivery
    }

    /// Formatted time remaining until the expected delivery, or a
    /// placeholder when the server has not provided an estimate.
    pub fn eta(&self, now: DateTime<Utc>) -> String {
        match self.expected_delivery_timestamp {
            Some(expected) => crate::utils::time_remaining(expected, now),
            None => "Not available".to_string(),
        }
    }
}
