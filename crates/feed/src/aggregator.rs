//! The live order feed.

use std::sync::Arc;

use backend::{Backend, ChangeFeed, FeedSignal, Subscription, SubscriptionStatus};
use common::OrderId;
use domain::{Order, OrderItem, OrderRecord};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::{Enricher, FeedConfig, FeedError, Notification, Notifier, Result};

/// The two order collections the feed maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Orders waiting to be accepted.
    Pending,
    /// Orders accepted or being processed.
    Active,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Pending, Category::Active];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Pending => "pending",
            Category::Active => "active",
        }
    }

    /// Description of the notification raised when this category's query fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Category::Pending => "Failed to fetch pending orders",
            Category::Active => "Failed to fetch active orders",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether each collection is currently being loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingState {
    pub orders: bool,
    pub active_orders: bool,
}

impl LoadingState {
    /// Both collections loading.
    pub const LOADING: LoadingState = LoadingState {
        orders: true,
        active_orders: true,
    };

    /// Nothing loading.
    pub const IDLE: LoadingState = LoadingState {
        orders: false,
        active_orders: false,
    };

    pub fn set(&mut self, category: Category, loading: bool) {
        match category {
            Category::Pending => self.orders = loading,
            Category::Active => self.active_orders = loading,
        }
    }
}

type Collection = Arc<watch::Sender<Arc<Vec<Order>>>>;

/// Holds the change listener task and aborts it once the last feed handle
/// is dropped.
#[derive(Default)]
struct ListenerSlot(Mutex<Option<JoinHandle<()>>>);

impl Drop for ListenerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.0.get_mut().take() {
            handle.abort();
        }
    }
}

/// Keeps the pending and active order collections current.
///
/// Every refresh runs the two category queries as independent tasks,
/// enriches the returned orders and replaces the matching collection. A
/// failing query leaves its collection untouched and raises one
/// notification. After [`start`](Self::start), every change on the orders
/// table triggers another refresh.
///
/// Collections and loading flags are published through `watch` channels;
/// snapshots are cheap `Arc` clones.
pub struct OrderFeed<B> {
    backend: Arc<B>,
    enricher: Enricher<B>,
    notifier: Arc<dyn Notifier>,
    config: Arc<FeedConfig>,
    orders: Collection,
    active_orders: Collection,
    loading: Arc<watch::Sender<LoadingState>>,
    refreshes: Arc<watch::Sender<u64>>,
    listener: Arc<ListenerSlot>,
}

impl<B> Clone for OrderFeed<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            enricher: self.enricher.clone(),
            notifier: Arc::clone(&self.notifier),
            config: Arc::clone(&self.config),
            orders: Arc::clone(&self.orders),
            active_orders: Arc::clone(&self.active_orders),
            loading: Arc::clone(&self.loading),
            refreshes: Arc::clone(&self.refreshes),
            listener: Arc::clone(&self.listener),
        }
    }
}

impl<B: Backend + ChangeFeed + 'static> OrderFeed<B> {
    /// Creates a feed. Both collections start empty and both loading flags
    /// start set until the first refresh settles them.
    pub fn new(backend: Arc<B>, notifier: Arc<dyn Notifier>, config: FeedConfig) -> Self {
        let config = Arc::new(config);
        let (orders, _) = watch::channel(Arc::new(Vec::new()));
        let (active_orders, _) = watch::channel(Arc::new(Vec::new()));
        let (loading, _) = watch::channel(LoadingState::LOADING);
        let (refreshes, _) = watch::channel(0);

        Self {
            enricher: Enricher::new(Arc::clone(&backend), Arc::clone(&config)),
            backend,
            notifier,
            config,
            orders: Arc::new(orders),
            active_orders: Arc::new(active_orders),
            loading: Arc::new(loading),
            refreshes: Arc::new(refreshes),
            listener: Arc::default(),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Enriches raw order records. See [`Enricher::enrich`].
    pub async fn enrich(&self, records: Vec<OrderRecord>) -> Vec<Order> {
        self.enricher.enrich(records).await
    }

    /// Fetches the current line items of one order straight from the backend.
    pub async fn fetch_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        self.enricher.fetch_items(order_id).await
    }

    /// Looks an order up in either collection.
    pub fn find(&self, order_id: OrderId) -> Option<Order> {
        Category::ALL.iter().find_map(|&category| {
            self.collection(category)
                .iter()
                .find(|order| order.id() == order_id)
                .cloned()
        })
    }

    /// Current pending orders, newest first.
    pub fn orders(&self) -> Arc<Vec<Order>> {
        self.orders.borrow().clone()
    }

    /// Current accepted and processing orders, newest first.
    pub fn active_orders(&self) -> Arc<Vec<Order>> {
        self.active_orders.borrow().clone()
    }

    /// Current snapshot of one category.
    pub fn collection(&self, category: Category) -> Arc<Vec<Order>> {
        self.sender(category).borrow().clone()
    }

    pub fn loading(&self) -> LoadingState {
        *self.loading.borrow()
    }

    pub fn subscribe_orders(&self) -> watch::Receiver<Arc<Vec<Order>>> {
        self.orders.subscribe()
    }

    pub fn subscribe_active_orders(&self) -> watch::Receiver<Arc<Vec<Order>>> {
        self.active_orders.subscribe()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<LoadingState> {
        self.loading.subscribe()
    }

    /// Number of refreshes completed so far.
    pub fn refresh_count(&self) -> u64 {
        *self.refreshes.borrow()
    }

    /// Watches the completed-refresh counter.
    pub fn subscribe_refreshes(&self) -> watch::Receiver<u64> {
        self.refreshes.subscribe()
    }

    /// Returns true while the change listener is running.
    pub async fn is_running(&self) -> bool {
        self.listener
            .0
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// A handle for the listener task. It shares everything except the
    /// listener slot, so the task never keeps its own slot alive.
    fn detached(&self) -> Self {
        Self {
            listener: Arc::default(),
            ..self.clone()
        }
    }

    fn sender(&self, category: Category) -> &Collection {
        match category {
            Category::Pending => &self.orders,
            Category::Active => &self.active_orders,
        }
    }

    /// Re-fetches both collections.
    ///
    /// Never fails: query failures are reported through the notifier and
    /// leave the affected collection as it was. Concurrent refreshes are
    /// allowed; the last one to finish a category wins.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) {
        metrics::counter!("feed_refreshes_total").increment(1);
        self.loading.send_replace(LoadingState::LOADING);

        let pending = tokio::spawn(self.clone().refresh_category(Category::Pending));
        let active = tokio::spawn(self.clone().refresh_category(Category::Active));
        let (pending, active) = tokio::join!(pending, active);

        if let Some(err) = [pending, active]
            .into_iter()
            .filter_map(|r| r.err().map(FeedError::from))
            .next()
        {
            tracing::error!(error = %err, "order refresh failed");
            self.notifier
                .notify(Notification::error("Failed to fetch orders"));
            self.loading.send_replace(LoadingState::IDLE);
        }

        self.refreshes.send_modify(|n| *n += 1);
    }

    async fn refresh_category(self, category: Category) {
        match self.load_category(category).await {
            Ok(orders) => {
                tracing::debug!(%category, count = orders.len(), "collection refreshed");
                self.sender(category).send_replace(Arc::new(orders));
            }
            Err(e) => {
                tracing::error!(%category, error = %e, "category query failed");
                metrics::counter!("feed_query_failures_total", "category" => category.label())
                    .increment(1);
                self.notifier
                    .notify(Notification::error(category.failure_message()));
            }
        }
        self.loading.send_modify(|state| state.set(category, false));
    }

    /// Runs one category query and enriches the valid rows.
    pub async fn load_category(&self, category: Category) -> Result<Vec<Order>> {
        let rows = self
            .backend
            .select(self.config.category_query(category))
            .await?;

        let records = rows
            .into_iter()
            .filter_map(|row| match OrderRecord::from_row(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(%category, error = %e, "dropping malformed order row");
                    metrics::counter!("feed_rows_rejected_total").increment(1);
                    None
                }
            })
            .collect();

        Ok(self.enricher.enrich(records).await)
    }

    /// Loads both collections and starts following the orders change feed.
    ///
    /// Does nothing if the feed is already running. A failure to join the
    /// change feed is reported as a connection error; the initial load is
    /// kept either way.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) {
        let mut listener = self.listener.0.lock().await;
        if listener.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!("order feed already running");
            return;
        }

        self.refresh().await;

        let channel = self.config.channel();
        match self.backend.subscribe(channel.clone()).await {
            Ok(subscription) => {
                tracing::info!(channel = %channel.name(), "following order changes");
                *listener = Some(tokio::spawn(self.detached().listen(subscription)));
            }
            Err(e) => {
                tracing::error!(channel = %channel.name(), error = %e, "failed to join change feed");
                self.notifier.notify(Notification::connection_error());
            }
        }
    }

    /// Stops following changes and releases the subscription.
    ///
    /// Refreshes already in flight run to completion. Dropping every handle
    /// to the feed also stops the listener, without waiting for it.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self) {
        let Some(handle) = self.listener.0.lock().await.take() else {
            return;
        };
        handle.abort();
        // Awaiting guarantees the subscription has been dropped.
        let _ = handle.await;
        tracing::info!("order feed stopped");
    }

    async fn listen(self, mut subscription: Subscription) {
        let channel = subscription.channel().name();

        while let Some(signal) = subscription.next().await {
            match signal {
                FeedSignal::Change(event) => {
                    tracing::debug!(%channel, kind = ?event.kind, "order change received");
                    metrics::counter!("feed_change_notifications_total").increment(1);
                    let feed = self.clone();
                    tokio::spawn(async move { feed.refresh().await });
                }
                FeedSignal::Status(SubscriptionStatus::Subscribed) => {
                    tracing::info!(%channel, "subscribed to order changes");
                }
                FeedSignal::Status(SubscriptionStatus::ChannelError(reason)) => {
                    tracing::error!(%channel, %reason, "change feed channel error");
                    self.notifier.notify(Notification::connection_error());
                }
                FeedSignal::Status(SubscriptionStatus::Closed) => {
                    tracing::info!(%channel, "change feed closed");
                    break;
                }
            }
        }
    }
}
