//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use backend::{Backend, ChangeFeed};
use feed::LoadingState;
use serde::Serialize;

use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Whether the feed is following the change feed.
    pub realtime: bool,
    pub loading: LoadingState,
}

/// GET /health: returns service and feed status.
pub async fn check<B: Backend + ChangeFeed + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        realtime: state.feed.is_running().await,
        loading: state.feed.loading(),
    })
}
