//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p backend --test postgres_integration
//! ```

use std::sync::Arc;
use std::time::Duration;

use backend::{
    Backend, ChangeFeed, ChangeKind, ChannelSpec, Direction, FeedSignal, PostgresBackend, Query,
    SubscriptionStatus,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_order_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh backend with its own pool and cleared tables
async fn get_test_backend() -> PostgresBackend {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders, clothing_items")
        .execute(&pool)
        .await
        .unwrap();

    PostgresBackend::new(pool)
}

async fn insert_order(pool: &PgPool, status: &str, minutes_ago: i32, floor: Option<i32>) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO orders (id, status, created_at, floor, block) \
         VALUES ($1, $2, NOW() - make_interval(mins => $3), $4, 'B')",
    )
    .bind(id)
    .bind(status)
    .bind(minutes_ago)
    .bind(floor)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn insert_item(pool: &PgPool, order_id: Uuid, name: &str, quantity: i32) -> Uuid {
    let clothing_id = Uuid::new_v4();
    sqlx::query("INSERT INTO clothing_items (id, name, price, description) VALUES ($1, $2, 1500, NULL)")
        .bind(clothing_id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();

    let item_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO order_items (id, order_id, clothing_item_id, quantity, price) \
         VALUES ($1, $2, $3, $4, 1500)",
    )
    .bind(item_id)
    .bind(order_id)
    .bind(clothing_id)
    .bind(quantity)
    .execute(pool)
    .await
    .unwrap();
    item_id
}

#[tokio::test]
#[serial]
async fn select_by_status_newest_first() {
    let backend = get_test_backend().await;
    let pool = backend.pool().clone();

    let older = insert_order(&pool, "accepted", 30, Some(2)).await;
    let newer = insert_order(&pool, "processing", 5, None).await;
    insert_order(&pool, "pending", 1, Some(1)).await;

    let rows = backend
        .select(
            Query::table("orders")
                .in_("status", ["accepted", "processing"])
                .order("created_at", Direction::Descending),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], newer.to_string());
    assert_eq!(rows[1]["id"], older.to_string());
    assert_eq!(rows[0]["floor"], serde_json::Value::Null);
    assert_eq!(rows[1]["floor"], 2);
}

#[tokio::test]
#[serial]
async fn select_items_with_embedded_clothing_item() {
    let backend = get_test_backend().await;
    let pool = backend.pool().clone();

    let order_id = insert_order(&pool, "pending", 0, None).await;
    let other_order = insert_order(&pool, "pending", 0, None).await;
    let item_id = insert_item(&pool, order_id, "Bedsheet", 2).await;
    insert_item(&pool, other_order, "Towel", 1).await;

    let rows = backend
        .select(
            Query::table("order_items")
                .eq("order_id", order_id.to_string())
                .embed("clothing_items", "clothing_item_id"),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], item_id.to_string());
    assert_eq!(rows[0]["quantity"], 2);
    assert_eq!(rows[0]["clothing_items"]["name"], "Bedsheet");
    assert_eq!(rows[0]["clothing_items"]["price"], 1500);
}

#[tokio::test]
#[serial]
async fn column_projection() {
    let backend = get_test_backend().await;
    let pool = backend.pool().clone();
    insert_order(&pool, "pending", 0, Some(4)).await;

    let rows = backend
        .select(Query::table("orders").select(["id", "floor"]))
        .await
        .unwrap();

    let keys: Vec<_> = rows[0].as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&"floor".to_string()));
}

#[tokio::test]
#[serial]
async fn change_feed_delivers_row_changes() {
    let backend = get_test_backend().await;
    let pool = backend.pool().clone();

    let mut sub = backend
        .subscribe(ChannelSpec::table("public", "orders"))
        .await
        .unwrap();
    assert_eq!(
        sub.next().await,
        Some(FeedSignal::Status(SubscriptionStatus::Subscribed))
    );

    let id = insert_order(&pool, "pending", 0, None).await;
    sqlx::query("UPDATE orders SET status = 'accepted' WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let mut kinds = Vec::new();
    for _ in 0..3 {
        let signal = tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .unwrap();
        match signal {
            Some(FeedSignal::Change(event)) => {
                assert_eq!(event.table, "orders");
                kinds.push(event.kind);
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    assert_eq!(
        kinds,
        vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]
    );
}

#[tokio::test]
#[serial]
async fn change_feed_ignores_other_channels() {
    let backend = get_test_backend().await;
    let pool = backend.pool().clone();

    let mut sub = backend
        .subscribe(ChannelSpec::table("public", "orders").only(ChangeKind::Delete))
        .await
        .unwrap();
    let _ = sub.next().await;

    let id = insert_order(&pool, "pending", 0, None).await;
    sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let signal = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .unwrap();
    match signal {
        Some(FeedSignal::Change(event)) => {
            assert_eq!(event.kind, ChangeKind::Delete);
            assert_eq!(event.id, Some(serde_json::json!(id.to_string())));
            assert_eq!(event.old_record, None);
        }
        other => panic!("unexpected signal: {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn large_rows_can_be_written_while_followed() {
    let backend = get_test_backend().await;
    let pool = backend.pool().clone();

    let mut sub = backend
        .subscribe(ChannelSpec::table("public", "orders"))
        .await
        .unwrap();
    let _ = sub.next().await;

    let id = insert_order(&pool, "pending", 0, None).await;
    sqlx::query("UPDATE orders SET notes = repeat('x', 20000) WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let mut events = Vec::new();
    for _ in 0..2 {
        let signal = tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .unwrap();
        match signal {
            Some(FeedSignal::Change(event)) => events.push(event),
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    assert_eq!(events[1].kind, ChangeKind::Update);
    assert_eq!(events[1].id, Some(serde_json::json!(id.to_string())));
    assert_eq!(events[1].record, None);

    let rows = backend
        .select(Query::table("orders").eq("id", id.to_string()))
        .await
        .unwrap();
    assert_eq!(rows[0]["notes"].as_str().unwrap().len(), 20000);
}
