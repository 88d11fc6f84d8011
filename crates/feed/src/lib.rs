//! Live order feed.
//!
//! This crate keeps two enriched order collections current:
//! - [`OrderFeed`] runs the categorized queries, owns the observable
//!   collections and loading flags, and re-fetches on every change notification
//! - [`Enricher`] attaches line items and a display profile to each order
//! - [`Notifier`] receives the user-facing messages the feed raises
//! - [`FeedConfig`] names the tables, relations and status categories

pub mod aggregator;
pub mod config;
pub mod enrich;
pub mod error;
pub mod notify;

pub use aggregator::{Category, LoadingState, OrderFeed};
pub use config::FeedConfig;
pub use enrich::Enricher;
pub use error::{FeedError, Result};
pub use notify::{Notification, NotificationLog, Notifier, Severity};
