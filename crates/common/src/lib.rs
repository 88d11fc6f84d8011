//! Shared identifier types for the order feed workspace.

pub mod types;

pub use types::{OrderId, RecordId};
