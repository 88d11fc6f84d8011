//! Change-feed types shared by every backend.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::Row;

/// The kind of row mutation a change event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which change kinds a subscription wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    Only(ChangeKind),
}

/// Identifies the table whose changes a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub schema: String,
    pub table: String,
    pub events: EventFilter,
}

impl ChannelSpec {
    /// Subscribes to every change kind on `schema.table`.
    pub fn table(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            events: EventFilter::All,
        }
    }

    /// Narrows the subscription to one change kind.
    pub fn only(mut self, kind: ChangeKind) -> Self {
        self.events = EventFilter::Only(kind);
        self
    }

    /// Channel name used in logs, e.g. `public:orders`.
    pub fn name(&self) -> String {
        format!("{}:{}", self.schema, self.table)
    }

    /// Returns true if the event belongs on this channel.
    pub fn accepts(&self, event: &ChangeEvent) -> bool {
        if event.schema != self.schema || event.table != self.table {
            return false;
        }
        match self.events {
            EventFilter::All => true,
            EventFilter::Only(kind) => event.kind == kind,
        }
    }
}

/// A row-level change on a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub schema: String,
    pub table: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Id of the changed row.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    /// Row after the change; absent for deletes and for payloads that
    /// carry only the id.
    #[serde(default)]
    pub record: Option<Row>,
    /// Row before the change; absent for inserts and id-only payloads.
    #[serde(default)]
    pub old_record: Option<Row>,
}

/// Lifecycle status reported on a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// The channel is live.
    Subscribed,
    /// The channel reported an error. The subscription stays open.
    ChannelError(String),
    /// The backend closed the channel.
    Closed,
}

/// Something delivered on a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedSignal {
    Status(SubscriptionStatus),
    Change(ChangeEvent),
}

/// A live change-feed subscription.
///
/// Holds the receiving end of the signal channel plus whatever the backend
/// needs to tear the subscription down. Release happens on drop, so a
/// subscription is released on every path that lets go of it.
pub struct Subscription {
    channel: ChannelSpec,
    signals: mpsc::UnboundedReceiver<FeedSignal>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps a signal receiver and the hook that releases it.
    pub fn new(
        channel: ChannelSpec,
        signals: mpsc::UnboundedReceiver<FeedSignal>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            channel,
            signals,
            release: Some(Box::new(release)),
        }
    }

    /// Returns the channel this subscription listens on.
    pub fn channel(&self) -> &ChannelSpec {
        &self.channel
    }

    /// Waits for the next signal. Returns `None` once the backend side is gone.
    pub async fn next(&mut self) -> Option<FeedSignal> {
        self.signals.recv().await
    }

    /// Releases the subscription now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!(channel = %self.channel.name(), "releasing subscription");
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("released", &self.release.is_none())
            .finish()
    }
}
