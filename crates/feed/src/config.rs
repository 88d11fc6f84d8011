//! Feed configuration.

use backend::{ChannelSpec, Direction, Query};
use common::OrderId;
use domain::OrderStatus;

use crate::Category;

/// Names the tables, relations and status groups the feed reads.
///
/// The defaults match the backend schema in `migrations/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Schema of the orders table, used for the change channel.
    pub schema: String,

    /// Table holding orders.
    pub orders_table: String,

    /// Column orders are sorted by, newest first.
    pub created_at_column: String,

    /// Table holding line items.
    pub items_table: String,

    /// Column on the items table referencing the order.
    pub items_order_key: String,

    /// Relation embedded into each line item.
    pub clothing_relation: String,

    /// Column on the items table referencing the clothing item.
    pub clothing_key: String,

    /// Statuses shown in the pending collection.
    pub pending_statuses: Vec<OrderStatus>,

    /// Statuses shown in the active collection.
    pub active_statuses: Vec<OrderStatus>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            orders_table: "orders".to_string(),
            created_at_column: "created_at".to_string(),
            items_table: "order_items".to_string(),
            items_order_key: "order_id".to_string(),
            clothing_relation: "clothing_items".to_string(),
            clothing_key: "clothing_item_id".to_string(),
            pending_statuses: vec![OrderStatus::Pending],
            active_statuses: vec![OrderStatus::Accepted, OrderStatus::Processing],
        }
    }
}

impl FeedConfig {
    /// Returns the statuses that make up a category.
    pub fn statuses(&self, category: Category) -> &[OrderStatus] {
        match category {
            Category::Pending => &self.pending_statuses,
            Category::Active => &self.active_statuses,
        }
    }

    /// Builds the select for one category, newest first.
    ///
    /// A single status becomes an equality filter, several a membership filter.
    pub fn category_query(&self, category: Category) -> Query {
        let statuses = self.statuses(category);
        let query = Query::table(&self.orders_table);
        let query = match statuses {
            [status] => query.eq("status", status.as_str()),
            _ => query.in_("status", statuses.iter().map(OrderStatus::as_str)),
        };
        query.order(&self.created_at_column, Direction::Descending)
    }

    /// Builds the line-item select for one order.
    pub fn items_query(&self, order_id: OrderId) -> Query {
        Query::table(&self.items_table)
            .eq(&self.items_order_key, order_id.to_string())
            .embed(&self.clothing_relation, &self.clothing_key)
    }

    /// Change channel covering every mutation of the orders table.
    pub fn channel(&self) -> ChannelSpec {
        ChannelSpec::table(&self.schema, &self.orders_table)
    }
}
