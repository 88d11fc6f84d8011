//! Order status as stored by the backend.

use serde::{Deserialize, Serialize};

/// The lifecycle status of an order.
///
/// Only `Pending`, `Accepted` and `Processing` are fetched by the feed; the
/// remaining variants exist so rows in other states still decode. Any status
/// string this crate does not know decodes as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, waiting to be picked up by staff.
    Pending,

    /// Picked up by staff.
    Accepted,

    /// Being worked on.
    Processing,

    /// Ready for collection.
    Ready,

    /// Handed over (terminal).
    Completed,

    /// Cancelled (terminal).
    Cancelled,

    /// A status value this crate does not recognise.
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Processing => "processing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
