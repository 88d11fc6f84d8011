//! Order feed endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use backend::{Backend, ChangeFeed};
use common::OrderId;
use domain::{Order, OrderItem};
use feed::{LoadingState, NotificationLog, OrderFeed};
use serde::Serialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<B> {
    pub feed: OrderFeed<B>,
    pub notifications: NotificationLog,
}

// -- Response types --

/// An enriched order plus its computed total.
#[derive(Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub total_cents: i64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let total_cents = order.total().cents();
        Self { order, total_cents }
    }
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub pending: usize,
    pub active: usize,
    pub loading: LoadingState,
}

fn responses(orders: &[Order]) -> Vec<OrderResponse> {
    orders.iter().cloned().map(OrderResponse::from).collect()
}

// -- Handlers --

/// GET /orders: pending orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<B: Backend + ChangeFeed + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> Json<Vec<OrderResponse>> {
    Json(responses(&state.feed.orders()))
}

/// GET /orders/active: accepted and processing orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_active<B: Backend + ChangeFeed + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> Json<Vec<OrderResponse>> {
    Json(responses(&state.feed.active_orders()))
}

/// GET /orders/loading: per-collection loading flags.
pub async fn loading<B: Backend + ChangeFeed + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> Json<LoadingState> {
    Json(state.feed.loading())
}

/// POST /orders/refresh: re-fetch both collections now.
#[tracing::instrument(skip(state))]
pub async fn refresh<B: Backend + ChangeFeed + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> (StatusCode, Json<RefreshResponse>) {
    state.feed.refresh().await;
    let response = RefreshResponse {
        pending: state.feed.orders().len(),
        active: state.feed.active_orders().len(),
        loading: state.feed.loading(),
    };
    (StatusCode::OK, Json(response))
}

/// GET /orders/{id}: one order from either collection.
#[tracing::instrument(skip(state))]
pub async fn get<B: Backend + ChangeFeed + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .feed
        .find(order_id)
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;
    Ok(Json(order.into()))
}

/// GET /orders/{id}/items: current line items, read from the backend.
#[tracing::instrument(skip(state))]
pub async fn items<B: Backend + ChangeFeed + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderItem>>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let items = state.feed.fetch_items(order_id).await?;
    Ok(Json(items))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(OrderId::from(uuid))
}
