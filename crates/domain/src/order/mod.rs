//! Order records, line items and display profiles.

mod item;
mod profile;
mod record;
mod state;
mod value_objects;

pub use item::{ClothingItem, OrderItem};
pub use profile::{ProfileKind, StudentProfile};
pub use record::{Order, OrderRecord};
pub use state::OrderStatus;
pub use value_objects::{Location, Money};
