use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::query::value_text;
use crate::{
    Backend, BackendError, ChangeEvent, ChangeFeed, ChangeKind, ChannelSpec, FeedSignal, Query,
    Result, Row, Subscription, SubscriptionStatus,
};

type FailureRule = Arc<dyn Fn(&Query) -> bool + Send + Sync>;

#[derive(Default)]
struct InMemoryState {
    tables: HashMap<String, Vec<Row>>,
    subscribers: HashMap<u64, (ChannelSpec, mpsc::UnboundedSender<FeedSignal>)>,
    next_subscriber: u64,
    failures: Vec<FailureRule>,
    fail_subscribe: bool,
    query_log: Vec<Query>,
}

impl InMemoryState {
    fn publish(&mut self, event: ChangeEvent) {
        self.subscribers
            .retain(|_, (spec, tx)| !spec.accepts(&event) || tx.send(FeedSignal::Change(event.clone())).is_ok());
    }
}

/// In-memory backend for tests and local runs.
///
/// Tables are vectors of JSON rows keyed by their `id` column. Writes through
/// [`insert`](Self::insert), [`update`](Self::update) and
/// [`delete`](Self::delete) publish change events to matching subscriptions
/// under the `public` schema.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryBackend {
    /// Schema every in-memory table lives in.
    pub const SCHEMA: &'static str = "public";

    /// Creates a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a row and publishes an `INSERT` change.
    pub fn insert(&self, table: &str, row: Row) {
        let mut state = self.state();
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        state.publish(ChangeEvent {
            schema: Self::SCHEMA.to_string(),
            table: table.to_string(),
            kind: ChangeKind::Insert,
            id: row.get("id").cloned(),
            record: Some(row),
            old_record: None,
        });
    }

    /// Inserts rows without publishing changes.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        self.state()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Merges `patch` into the row with the given id and publishes an
    /// `UPDATE` change. Returns false if no such row exists.
    pub fn update(&self, table: &str, id: impl Into<Value>, patch: Row) -> bool {
        let id = id.into();
        let mut state = self.state();
        let Some(row) = state
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| same_id(r, &id)))
        else {
            return false;
        };

        let old = row.clone();
        if let (Value::Object(target), Value::Object(fields)) = (&mut *row, patch) {
            target.extend(fields);
        }
        let new = row.clone();

        state.publish(ChangeEvent {
            schema: Self::SCHEMA.to_string(),
            table: table.to_string(),
            kind: ChangeKind::Update,
            id: Some(id),
            record: Some(new),
            old_record: Some(old),
        });
        true
    }

    /// Removes the row with the given id and publishes a `DELETE` change.
    /// Returns false if no such row exists.
    pub fn delete(&self, table: &str, id: impl Into<Value>) -> bool {
        let id = id.into();
        let mut state = self.state();
        let Some(rows) = state.tables.get_mut(table) else {
            return false;
        };
        let Some(pos) = rows.iter().position(|r| same_id(r, &id)) else {
            return false;
        };

        let old = rows.remove(pos);
        state.publish(ChangeEvent {
            schema: Self::SCHEMA.to_string(),
            table: table.to_string(),
            kind: ChangeKind::Delete,
            id: Some(id),
            record: None,
            old_record: Some(old),
        });
        true
    }

    /// Returns a copy of every row in a table.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// Makes every select matching `rule` fail with a query error.
    pub fn fail_when(&self, rule: impl Fn(&Query) -> bool + Send + Sync + 'static) {
        self.state().failures.push(Arc::new(rule));
    }

    /// Removes all failure rules.
    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Configures whether `subscribe` fails.
    pub fn set_fail_on_subscribe(&self, fail: bool) {
        self.state().fail_subscribe = fail;
    }

    /// Sends a status to every open subscription.
    pub fn broadcast_status(&self, status: SubscriptionStatus) {
        self.state()
            .subscribers
            .retain(|_, (_, tx)| tx.send(FeedSignal::Status(status.clone())).is_ok());
    }

    /// Returns every query run so far, oldest first.
    pub fn query_log(&self) -> Vec<Query> {
        self.state().query_log.clone()
    }

    /// Returns the number of queries run against `table`.
    pub fn query_count(&self, table: &str) -> usize {
        self.state()
            .query_log
            .iter()
            .filter(|q| q.table == table)
            .count()
    }

    /// Returns the number of open subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.state().subscribers.len()
    }
}

fn same_id(row: &Row, id: &Value) -> bool {
    match (row.get("id").and_then(value_text), value_text(id)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    #[tracing::instrument(skip(self, query), fields(table = %query.table))]
    async fn select(&self, query: Query) -> Result<Vec<Row>> {
        query.validate()?;

        let mut state = self.state();
        state.query_log.push(query.clone());

        if state.failures.iter().any(|rule| rule(&query)) {
            return Err(BackendError::Query(format!(
                "select on {} failed",
                query.table
            )));
        }

        let mut rows: Vec<Row> = state
            .tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();

        // Stable sort keeps insertion order for ties.
        rows.sort_by(|a, b| query.compare(a, b));

        for embed in &query.embeds {
            let related = state.tables.get(&embed.relation);
            for row in rows.iter_mut() {
                let nested = row
                    .get(&embed.local_key)
                    .and_then(|key| related?.iter().find(|r| same_id(r, key)))
                    .cloned()
                    .unwrap_or(Value::Null);
                if let Value::Object(map) = row {
                    map.insert(embed.relation.clone(), nested);
                }
            }
        }

        Ok(rows.into_iter().map(|r| query.project(r)).collect())
    }
}

#[async_trait]
impl ChangeFeed for InMemoryBackend {
    async fn subscribe(&self, channel: ChannelSpec) -> Result<Subscription> {
        let mut state = self.state();
        if state.fail_subscribe {
            return Err(BackendError::Subscription(format!(
                "cannot join {}",
                channel.name()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is held below, so this cannot fail.
        let _ = tx.send(FeedSignal::Status(SubscriptionStatus::Subscribed));

        state.next_subscriber += 1;
        let id = state.next_subscriber;
        state.subscribers.insert(id, (channel.clone(), tx));
        drop(state);

        tracing::debug!(channel = %channel.name(), subscriber = id, "joined change feed");

        let registry = Arc::downgrade(&self.state);
        Ok(Subscription::new(channel, rx, move || {
            if let Some(state) = registry.upgrade() {
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .subscribers
                    .remove(&id);
            }
        }))
    }
}
