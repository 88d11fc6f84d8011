//! Recent feed notifications.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use backend::{Backend, ChangeFeed};
use feed::Notification;

use crate::routes::orders::AppState;

/// GET /notifications: notifications raised by the feed, oldest first.
pub async fn list<B: Backend + ChangeFeed + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> Json<Vec<Notification>> {
    Json(state.notifications.notifications())
}

/// DELETE /notifications: dismisses every retained notification.
pub async fn clear<B: Backend + ChangeFeed + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> axum::http::StatusCode {
    state.notifications.clear();
    axum::http::StatusCode::NO_CONTENT
}
