//! Value objects shared by order records.

use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
///
/// Serialized as a bare integer, which is how prices are stored. Arithmetic
/// saturates at the `i64` bounds since amounts come from backend rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the whole-unit portion.
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents = self.cents.saturating_add(rhs.cents);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// A floor or block designation.
///
/// The backend stores these loosely: floors are usually numbers, blocks
/// usually letters, but either may appear. The original JSON shape is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Number(i64),
    Text(String),
}

impl Location {
    /// Literal used wherever a location is unknown.
    pub const NOT_AVAILABLE: &'static str = "N/A";

    /// Returns the `"N/A"` location.
    pub fn not_available() -> Self {
        Location::Text(Self::NOT_AVAILABLE.to_string())
    }

    /// Copies `value`, substituting `"N/A"` when it is absent.
    pub fn or_not_available(value: Option<&Location>) -> Self {
        value.cloned().unwrap_or_else(Self::not_available)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Number(n) => write!(f, "{n}"),
            Location::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Location {
    fn from(n: i64) -> Self {
        Location::Number(n)
    }
}

impl From<&str> for Location {
    fn from(s: &str) -> Self {
        Location::Text(s.to_string())
    }
}
