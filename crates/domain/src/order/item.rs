//! Line items and the catalogue entries they reference.

use serde::{Deserialize, Serialize};

use crate::error::{Result, decode_row};
use crate::{Money, RecordId};

/// A catalogue entry embedded in each line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClothingItem {
    pub id: RecordId,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub description: Option<String>,
}

/// A line item of an order, with its clothing item embedded.
///
/// The embedded entry travels under the relation name `clothing_items`,
/// matching the backend's nested select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: RecordId,
    pub quantity: u32,
    pub price: Money,
    #[serde(rename = "clothing_items")]
    pub clothing_item: ClothingItem,
}

impl OrderItem {
    /// Validates a raw item row.
    pub fn from_row(row: serde_json::Value) -> Result<Self> {
        decode_row(row)
    }

    /// Returns the total price for this line (quantity * price).
    pub fn total_price(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RowError;
    use serde_json::json;

    fn item_row() -> serde_json::Value {
        json!({
            "id": uuid::Uuid::new_v4(),
            "order_id": uuid::Uuid::new_v4(),
            "clothing_item_id": uuid::Uuid::new_v4(),
            "quantity": 2,
            "price": 1500,
            "clothing_items": {
                "id": uuid::Uuid::new_v4(),
                "name": "Shirt",
                "price": 1500,
                "description": null
            }
        })
    }

    #[test]
    fn test_from_row_with_embedded_clothing_item() {
        let item = OrderItem::from_row(item_row()).unwrap();
        assert_eq!(item.quantity, 2);
        assert_eq!(item.clothing_item.name, "Shirt");
        assert_eq!(item.clothing_item.description, None);
        assert_eq!(item.total_price().cents(), 3000);
    }

    #[test]
    fn test_missing_embedded_item_is_rejected() {
        let mut row = item_row();
        row.as_object_mut().unwrap().remove("clothing_items");
        assert!(matches!(
            OrderItem::from_row(row),
            Err(RowError::Decode(_))
        ));
    }

    #[test]
    fn test_non_object_row_is_rejected() {
        assert!(matches!(
            OrderItem::from_row(json!([1, 2])),
            Err(RowError::NotAnObject("array"))
        ));
    }
}
