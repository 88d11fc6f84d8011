//! Order rows and the enriched order exposed to consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, decode_row};
use crate::{Location, Money, OrderId, OrderItem, OrderStatus, StudentProfile};

/// An order row as read from the backend.
///
/// Columns this crate has no use for are kept verbatim in `attributes` and
/// written back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub floor: Option<Location>,
    #[serde(default)]
    pub block: Option<Location>,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl OrderRecord {
    /// Validates a raw order row.
    pub fn from_row(row: serde_json::Value) -> Result<Self> {
        decode_row(row)
    }
}

/// An order enriched with its line items and a display profile.
///
/// Both `items` and `student` are always populated; a degraded order carries
/// an empty item list rather than none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    #[serde(flatten)]
    pub record: OrderRecord,
    pub items: Vec<OrderItem>,
    pub student: StudentProfile,
}

impl Order {
    /// Creates an enriched order.
    pub fn new(record: OrderRecord, items: Vec<OrderItem>, student: StudentProfile) -> Self {
        Self {
            record,
            items,
            student,
        }
    }

    /// Degraded order: no items, placeholder profile.
    pub fn without_items(record: OrderRecord) -> Self {
        let student = StudentProfile::placeholder_for(&record);
        Self::new(record, Vec::new(), student)
    }

    /// Degraded order: no items, fallback profile.
    pub fn fallback(record: OrderRecord) -> Self {
        Self::new(record, Vec::new(), StudentProfile::fallback())
    }

    pub fn id(&self) -> OrderId {
        self.record.id
    }

    pub fn status(&self) -> OrderStatus {
        self.record.status
    }

    /// Sum of all line totals.
    pub fn total(&self) -> Money {
        self.items.iter().map(OrderItem::total_price).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RowError;
    use serde_json::json;

    fn order_row(floor: serde_json::Value, block: serde_json::Value) -> serde_json::Value {
        json!({
            "id": uuid::Uuid::new_v4(),
            "status": "pending",
            "created_at": "2024-03-01T10:15:00Z",
            "floor": floor,
            "block": block,
            "notes": "no starch",
            "total_amount": 4200
        })
    }

    #[test]
    fn test_from_row_keeps_passthrough_attributes() {
        let record = OrderRecord::from_row(order_row(json!(3), json!("B"))).unwrap();
        assert_eq!(record.status, OrderStatus::Pending);
        assert_eq!(record.floor, Some(Location::Number(3)));
        assert_eq!(record.block, Some(Location::from("B")));
        assert_eq!(record.attributes["notes"], "no starch");
        assert_eq!(record.attributes["total_amount"], 4200);
        assert!(!record.attributes.contains_key("status"));
    }

    #[test]
    fn test_null_and_missing_location() {
        let record = OrderRecord::from_row(order_row(json!(null), json!(null))).unwrap();
        assert_eq!(record.floor, None);
        assert_eq!(record.block, None);

        let mut row = order_row(json!(1), json!("A"));
        row.as_object_mut().unwrap().remove("floor");
        let record = OrderRecord::from_row(row).unwrap();
        assert_eq!(record.floor, None);
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let mut row = order_row(json!(1), json!("A"));
        row.as_object_mut().unwrap().remove("id");
        assert!(matches!(
            OrderRecord::from_row(row),
            Err(RowError::Decode(_))
        ));
    }

    #[test]
    fn test_without_items_uses_placeholder() {
        let record = OrderRecord::from_row(order_row(json!(null), json!("C"))).unwrap();
        let order = Order::without_items(record);
        assert!(order.items.is_empty());
        assert!(order.student.is_placeholder());
        assert_eq!(order.student.floor, Location::not_available());
        assert_eq!(order.student.block, Location::from("C"));
        assert_eq!(order.total(), Money::zero());
    }

    #[test]
    fn test_serialized_order_is_flat() {
        let record = OrderRecord::from_row(order_row(json!(2), json!("D"))).unwrap();
        let id = record.id;
        let json = serde_json::to_value(Order::fallback(record)).unwrap();
        assert_eq!(json["id"], json!(id));
        assert_eq!(json["notes"], "no starch");
        assert_eq!(json["items"], json!([]));
        assert_eq!(json["student"]["kind"], "fallback");
    }
}
