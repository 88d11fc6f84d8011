use async_trait::async_trait;
use sqlx::postgres::{PgListener, PgRow};
use sqlx::{PgPool, Row as _};
use tokio::sync::mpsc;

use crate::query::value_text;
use crate::{
    Backend, ChangeEvent, ChangeFeed, ChannelSpec, Direction, FeedSignal, Filter, Query, Result,
    Row, Subscription, SubscriptionStatus,
};

/// Notification channel the change trigger publishes on.
pub const DEFAULT_NOTIFY_CHANNEL: &str = "table_changes";

/// PostgreSQL-backed implementation of [`Backend`] and [`ChangeFeed`].
///
/// Rows are returned as `to_jsonb` objects. Changes arrive through the
/// `notify_table_change` trigger installed by the migrations and are read
/// with a dedicated `LISTEN` connection per subscription.
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

/// A bind parameter for a generated select.
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Text(Option<String>),
    TextArray(Vec<String>),
}

impl PostgresBackend {
    /// Creates a new PostgreSQL backend.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn build_select(query: &Query) -> Result<(String, Vec<Bind>)> {
        query.validate()?;

        let mut row_expr = String::from("to_jsonb(t.*)");
        for embed in &query.embeds {
            row_expr.push_str(&format!(
                " || jsonb_build_object('{rel}', (SELECT to_jsonb(r.*) FROM \"{rel}\" r WHERE r.id = t.\"{key}\"))",
                rel = embed.relation,
                key = embed.local_key,
            ));
        }

        let mut sql = format!(
            "SELECT {row_expr} AS data FROM \"{}\" t WHERE 1=1",
            query.table
        );
        let mut binds = Vec::with_capacity(query.filters.len());

        for filter in &query.filters {
            let n = binds.len() + 1;
            match filter {
                Filter::Eq { field, value } => {
                    sql.push_str(&format!(" AND t.\"{field}\"::text = ${n}"));
                    binds.push(Bind::Text(value_text(value)));
                }
                Filter::In { field, values } => {
                    sql.push_str(&format!(" AND t.\"{field}\"::text = ANY(${n})"));
                    binds.push(Bind::TextArray(
                        values.iter().filter_map(value_text).collect(),
                    ));
                }
            }
        }

        if let Some(order) = &query.order {
            let direction = match order.direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            sql.push_str(&format!(" ORDER BY t.\"{}\" {direction}", order.field));
        }

        Ok((sql, binds))
    }

    fn row_to_json(row: PgRow) -> Result<Row> {
        Ok(row.try_get::<serde_json::Value, _>("data")?)
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    #[tracing::instrument(skip(self, query), fields(table = %query.table))]
    async fn select(&self, query: Query) -> Result<Vec<Row>> {
        let (sql, binds) = Self::build_select(&query)?;

        let mut sqlx_query = sqlx::query(&sql);
        for bind in binds {
            sqlx_query = match bind {
                Bind::Text(value) => sqlx_query.bind(value),
                Bind::TextArray(values) => sqlx_query.bind(values),
            };
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        metrics::counter!("backend_rows_fetched", "table" => query.table.clone())
            .increment(rows.len() as u64);

        rows.into_iter()
            .map(|row| Self::row_to_json(row).map(|r| query.project(r)))
            .collect()
    }
}

#[async_trait]
impl ChangeFeed for PostgresBackend {
    #[tracing::instrument(skip(self), fields(channel = %channel.name()))]
    async fn subscribe(&self, channel: ChannelSpec) -> Result<Subscription> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(DEFAULT_NOTIFY_CHANNEL).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(FeedSignal::Status(SubscriptionStatus::Subscribed));

        let spec = channel.clone();
        let task = tokio::spawn(async move {
            loop {
                let signal = match listener.recv().await {
                    Ok(notification) => {
                        match serde_json::from_str::<ChangeEvent>(notification.payload()) {
                            Ok(event) if spec.accepts(&event) => FeedSignal::Change(event),
                            Ok(_) => continue,
                            Err(e) => {
                                tracing::warn!(error = %e, "discarding malformed change payload");
                                continue;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, channel = %spec.name(), "change listener error");
                        FeedSignal::Status(SubscriptionStatus::ChannelError(e.to_string()))
                    }
                };

                if tx.send(signal).is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(channel, rx, move || task.abort()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_select_for_category_query() {
        let query = Query::table("orders")
            .in_("status", ["accepted", "processing"])
            .order("created_at", Direction::Descending);
        let (sql, binds) = PostgresBackend::build_select(&query).unwrap();

        assert_eq!(
            sql,
            "SELECT to_jsonb(t.*) AS data FROM \"orders\" t WHERE 1=1 \
             AND t.\"status\"::text = ANY($1) ORDER BY t.\"created_at\" DESC"
        );
        assert_eq!(
            binds,
            vec![Bind::TextArray(vec![
                "accepted".to_string(),
                "processing".to_string()
            ])]
        );
    }

    #[test]
    fn test_build_select_with_embed() {
        let query = Query::table("order_items")
            .eq("order_id", "abc")
            .embed("clothing_items", "clothing_item_id");
        let (sql, binds) = PostgresBackend::build_select(&query).unwrap();

        assert!(sql.contains(
            "jsonb_build_object('clothing_items', (SELECT to_jsonb(r.*) FROM \"clothing_items\" r WHERE r.id = t.\"clothing_item_id\"))"
        ));
        assert!(sql.ends_with("AND t.\"order_id\"::text = $1"));
        assert_eq!(binds, vec![Bind::Text(Some("abc".to_string()))]);
    }

    #[test]
    fn test_build_select_rejects_bad_identifiers() {
        let query = Query::table("orders").eq("status\" OR 1=1 --", "x");
        assert!(PostgresBackend::build_select(&query).is_err());
    }
}
