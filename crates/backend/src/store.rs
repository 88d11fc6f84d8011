use async_trait::async_trait;

use crate::{ChannelSpec, Query, Result, Row, Subscription};

/// Request/response access to backend tables.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Backend: Send + Sync {
    /// Runs a select and returns the matching rows as JSON objects.
    ///
    /// Rows come back filtered by every filter in the query, sorted by its
    /// ordering if one is set, with embedded relations nested under their
    /// relation name and projected to the requested columns.
    async fn select(&self, query: Query) -> Result<Vec<Row>>;
}

/// Push notifications for row-level changes.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Joins the change feed for a table.
    ///
    /// The returned subscription yields a `Subscribed` status once the
    /// channel is live, followed by change events and any later status
    /// changes. Dropping the subscription releases it.
    async fn subscribe(&self, channel: ChannelSpec) -> Result<Subscription>;
}
