//! Synthetic student profiles attached to orders for display.
//!
//! No identity source is consulted: profiles are derived from the order row
//! alone, so they carry no real personal data.

use serde::{Deserialize, Serialize};

use crate::{Location, OrderRecord};

/// Which of the two profile shapes a [`StudentProfile`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Built from the order's own floor and block.
    Placeholder,
    /// Used when the order could not be processed.
    Fallback,
}

/// Display profile for the student who placed an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub kind: ProfileKind,
    pub name: String,
    pub gender: String,
    pub hostel: String,
    pub floor: Location,
    pub block: Location,
}

impl StudentProfile {
    pub const PLACEHOLDER_NAME: &'static str = "Unknown Student";
    pub const FALLBACK_NAME: &'static str = "Unknown";
    pub const UNKNOWN_GENDER: &'static str = "unknown";

    /// Builds the placeholder profile, copying floor and block.
    pub fn placeholder(floor: Option<&Location>, block: Option<&Location>) -> Self {
        Self {
            kind: ProfileKind::Placeholder,
            name: Self::PLACEHOLDER_NAME.to_string(),
            gender: Self::UNKNOWN_GENDER.to_string(),
            hostel: Location::NOT_AVAILABLE.to_string(),
            floor: Location::or_not_available(floor),
            block: Location::or_not_available(block),
        }
    }

    /// Builds the placeholder profile for an order.
    pub fn placeholder_for(record: &OrderRecord) -> Self {
        Self::placeholder(record.floor.as_ref(), record.block.as_ref())
    }

    /// Builds the fallback profile.
    pub fn fallback() -> Self {
        Self {
            kind: ProfileKind::Fallback,
            name: Self::FALLBACK_NAME.to_string(),
            gender: Self::UNKNOWN_GENDER.to_string(),
            hostel: Location::NOT_AVAILABLE.to_string(),
            floor: Location::not_available(),
            block: Location::not_available(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == ProfileKind::Placeholder
    }

    pub fn is_fallback(&self) -> bool {
        self.kind == ProfileKind::Fallback
    }
}
