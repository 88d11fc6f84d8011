//! Domain records for the order feed.
//!
//! This crate provides the typed shapes that raw backend rows are validated
//! into before anything downstream touches them:
//! - [`OrderRecord`] and [`OrderStatus`] for the orders table
//! - [`OrderItem`] and [`ClothingItem`] for line items and their catalogue entry
//! - [`StudentProfile`] for the synthetic display profile attached to each order
//! - [`Order`], the enriched shape exposed to consumers

pub mod error;
pub mod order;

pub use common::{OrderId, RecordId};
pub use error::{Result, RowError};
pub use order::{
    ClothingItem, Location, Money, Order, OrderItem, OrderRecord, OrderStatus, ProfileKind,
    StudentProfile,
};
