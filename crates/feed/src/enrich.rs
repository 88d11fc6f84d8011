//! Order enrichment: line items plus a display profile per order.

use std::sync::Arc;

use backend::Backend;
use common::OrderId;
use domain::{Order, OrderItem, OrderRecord, StudentProfile};
use futures_util::future::join_all;

use crate::{FeedConfig, FeedError, Result};

/// Attaches line items and a student profile to orders.
///
/// Every order is handled in its own task, so one order's failure (or panic)
/// only degrades that order:
/// - items query fails: empty items, placeholder profile
/// - anything else goes wrong: empty items, fallback profile
pub struct Enricher<B> {
    backend: Arc<B>,
    config: Arc<FeedConfig>,
}

impl<B> Clone for Enricher<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: Arc::clone(&self.config),
        }
    }
}

impl<B: Backend + 'static> Enricher<B> {
    /// Creates an enricher reading items from `backend`.
    pub fn new(backend: Arc<B>, config: Arc<FeedConfig>) -> Self {
        Self { backend, config }
    }

    /// Enriches every order concurrently.
    ///
    /// Returns exactly one order per input, in input order, regardless of
    /// the order in which the item fetches complete.
    pub async fn enrich(&self, records: Vec<OrderRecord>) -> Vec<Order> {
        if records.is_empty() {
            return Vec::new();
        }

        let tasks = records.iter().cloned().map(|record| {
            let enricher = self.clone();
            tokio::spawn(async move { enricher.enrich_one(record).await })
        });
        let results = join_all(tasks).await;

        records
            .into_iter()
            .zip(results)
            .map(|(record, result)| match result {
                Ok(order) => order,
                Err(e) => {
                    tracing::error!(order_id = %record.id, error = %e, "order enrichment task failed");
                    metrics::counter!("feed_order_fallbacks_total").increment(1);
                    Order::fallback(record)
                }
            })
            .collect()
    }

    /// Enriches a single order. Never fails; errors select a degraded shape.
    pub async fn enrich_one(&self, record: OrderRecord) -> Order {
        match self.fetch_items(record.id).await {
            Ok(items) => {
                let student = StudentProfile::placeholder_for(&record);
                Order::new(record, items, student)
            }
            Err(FeedError::Backend(e)) => {
                tracing::warn!(order_id = %record.id, error = %e, "failed to fetch order items");
                metrics::counter!("feed_item_fetch_failures_total").increment(1);
                Order::without_items(record)
            }
            Err(e) => {
                tracing::error!(order_id = %record.id, error = %e, "failed to process order");
                metrics::counter!("feed_order_fallbacks_total").increment(1);
                Order::fallback(record)
            }
        }
    }

    /// Fetches and validates the line items of one order.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = self.backend.select(self.config.items_query(order_id)).await?;
        rows.into_iter()
            .map(|row| OrderItem::from_row(row).map_err(FeedError::from))
            .collect()
    }
}
