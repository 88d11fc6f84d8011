//! Backend access for the order feed.
//!
//! This crate provides the two interfaces the feed consumes:
//! - [`Backend`] for filtered, ordered selects described by a [`Query`]
//! - [`ChangeFeed`] for row-level change notifications delivered through a [`Subscription`]
//!
//! Two implementations are included: [`InMemoryBackend`] for tests and local
//! runs, and [`PostgresBackend`] backed by sqlx and `LISTEN`/`NOTIFY`.

pub mod change;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use change::{
    ChangeEvent, ChangeKind, ChannelSpec, EventFilter, FeedSignal, Subscription,
    SubscriptionStatus,
};
pub use error::{BackendError, Result};
pub use memory::InMemoryBackend;
pub use postgres::PostgresBackend;
pub use query::{Direction, Embed, Filter, Query, Row, SortOrder};
pub use store::{Backend, ChangeFeed};
