//! HTTP server for the live order feed.
//!
//! Serves the pending and active order collections kept current by
//! [`feed::OrderFeed`], with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use backend::{Backend, ChangeFeed};
use feed::{FeedConfig, NotificationLog, OrderFeed};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<B: Backend + ChangeFeed + 'static>(
    state: Arc<AppState<B>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<B>))
        .route("/orders", get(routes::orders::list::<B>))
        .route("/orders/active", get(routes::orders::list_active::<B>))
        .route("/orders/loading", get(routes::orders::loading::<B>))
        .route("/orders/refresh", post(routes::orders::refresh::<B>))
        .route("/orders/{id}", get(routes::orders::get::<B>))
        .route("/orders/{id}/items", get(routes::orders::items::<B>))
        .route(
            "/notifications",
            get(routes::notifications::list::<B>).delete(routes::notifications::clear::<B>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around `backend` with the default feed
/// configuration. The feed is not started.
pub fn create_default_state<B: Backend + ChangeFeed + 'static>(backend: B) -> Arc<AppState<B>> {
    let notifications = NotificationLog::new();
    let feed = OrderFeed::new(
        Arc::new(backend),
        Arc::new(notifications.clone()),
        FeedConfig::default(),
    );

    Arc::new(AppState {
        feed,
        notifications,
    })
}
