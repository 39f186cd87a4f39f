//! View Derivations
//!
//! Pure transforms that turn a list snapshot into what readers see:
//! filter by a text query, then sort by a [`SortSpec`]. Inputs are borrowed
//! and never mutated; every call returns a fresh sequence.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::ListItem;

// =============================================================================
// Sort Specification
// =============================================================================

/// Column the view is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Sort by display label.
    #[default]
    Currency,
    /// Sort by last price, unpriced rows counting as zero.
    Price,
}

impl SortKey {
    /// Name used on the wire and in URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Currency => "currency",
            Self::Price => "price",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a sort key name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort key: {0}")]
pub struct UnknownSortKey(pub String);

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "currency" => Ok(Self::Currency),
            "price" => Ok(Self::Price),
            _ => Err(UnknownSortKey(s.to_string())),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

impl SortOrder {
    /// The opposite direction.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Sort key paired with its direction.
///
/// The pair is a single `Copy` value so it is always replaced as a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Column to sort by.
    pub key: SortKey,
    /// Direction.
    pub order: SortOrder,
}

impl SortSpec {
    /// Create a sort spec.
    #[must_use]
    pub const fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// The spec after the user picks `criteria`.
    ///
    /// Picking the current key flips the order; picking another key switches
    /// to it in ascending order.
    #[must_use]
    pub fn toggled(self, criteria: SortKey) -> Self {
        if self.key == criteria {
            Self::new(self.key, self.order.flipped())
        } else {
            Self::new(criteria, SortOrder::Asc)
        }
    }
}

// =============================================================================
// Derivations
// =============================================================================

/// Keep rows whose label contains `query`, ignoring case.
///
/// An empty query returns the input unchanged.
#[must_use]
pub fn filter_rows(rows: &[ListItem], query: &str) -> Vec<ListItem> {
    if query.is_empty() {
        return rows.to_vec();
    }

    let needle = query.to_lowercase();
    rows.iter()
        .filter(|row| row.label.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Stable sort of `rows` by `spec`.
///
/// Descending order negates the comparator, so rows that compare equal keep
/// their input order in both directions.
#[must_use]
pub fn sort_rows(rows: &[ListItem], spec: SortSpec) -> Vec<ListItem> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| {
        let comparison = match spec.key {
            SortKey::Currency => compare_labels(&a.label, &b.label),
            SortKey::Price => compare_prices(a.price, b.price),
        };
        match spec.order {
            SortOrder::Asc => comparison,
            SortOrder::Desc => comparison.reverse(),
        }
    });
    sorted
}

/// Locale-style label comparison.
///
/// Labels are compared case-folded first, with punctuation and symbols
/// ranked below digits and digits below letters. On a case-only tie the
/// lowercase form sorts first.
#[must_use]
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    collation_keys(a)
        .cmp(collation_keys(b))
        .then_with(|| b.cmp(a))
}

fn collation_keys(label: &str) -> impl Iterator<Item = (u8, char)> + '_ {
    label.chars().flat_map(char::to_lowercase).map(|c| {
        let class = if c.is_alphabetic() {
            2
        } else if c.is_numeric() {
            1
        } else {
            0
        };
        (class, c)
    })
}

/// Price comparison with `None` treated as zero.
#[must_use]
pub fn compare_prices(a: Option<Decimal>, b: Option<Decimal>) -> Ordering {
    a.unwrap_or(Decimal::ZERO).cmp(&b.unwrap_or(Decimal::ZERO))
}
