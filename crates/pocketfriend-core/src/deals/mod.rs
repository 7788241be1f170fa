//! Deal filter/sort pipeline.
//!
//! Pure functions over deal-like records. Nothing here mutates its input:
//! every stage returns a fresh `Vec` so the base list can be re-filtered
//! later in its original order.

mod pipeline;
mod search;

use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::models::Deal;

pub use pipeline::{DealPipeline, DealView};
pub use search::{search_listings, Searchable};

/// The fields the pipeline filters and sorts on.
pub trait DealMetrics {
    fn category(&self) -> &str;
    /// How often the signed-in user redeemed this deal.
    fn personal_redemptions(&self) -> u32;
    /// How often anyone redeemed this deal.
    fn global_redemptions(&self) -> u32;
    /// `None` when the distance to the user is unknown.
    fn distance_km(&self) -> Option<f64>;
    fn discount_percentage(&self) -> u8;
}

/// Live deals carry no redemption counters or location yet.
impl DealMetrics for Deal {
    fn category(&self) -> &str {
        &self.category
    }

    fn personal_redemptions(&self) -> u32 {
        0
    }

    fn global_redemptions(&self) -> u32 {
        0
    }

    fn distance_km(&self) -> Option<f64> {
        None
    }

    fn discount_percentage(&self) -> u8 {
        self.discount_percentage
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Tag(String),
}

impl CategoryFilter {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Tag(value.to_string())
        }
    }

    #[must_use]
    pub fn matches(&self, category: &str) -> bool {
        match self {
            Self::All => true,
            Self::Tag(tag) => tag == category,
        }
    }
}

impl From<&str> for CategoryFilter {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Tag(tag) => f.write_str(tag),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortMode {
    /// Keep the filtered order.
    #[default]
    None,
    /// Most redeemed by the signed-in user first.
    PersonalAffinity,
    /// Most redeemed overall first.
    Popularity,
    /// Nearest first; unknown distances last.
    Distance,
    /// Largest discount first.
    Discount,
}

impl SortMode {
    pub const ALL: [Self; 5] = [
        Self::None,
        Self::PersonalAffinity,
        Self::Popularity,
        Self::Distance,
        Self::Discount,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PersonalAffinity => "affinity",
            Self::Popularity => "popularity",
            Self::Distance => "distance",
            Self::Discount => "discount",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "Default",
            Self::PersonalAffinity => "Your Go-To Deals",
            Self::Popularity => "Top Rated",
            Self::Distance => "Nearest",
            Self::Discount => "Best Discount",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown sort mode '{0}' (expected none, affinity, popularity, distance or discount)")]
pub struct ParseSortModeError(String);

impl FromStr for SortMode {
    type Err = ParseSortModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let mode = match normalized.as_str() {
            "" | "none" | "default" => Self::None,
            "affinity" | "goto" | "personal-affinity" | "by-personal-affinity" => {
                Self::PersonalAffinity
            }
            "popularity" | "rating" | "by-popularity" => Self::Popularity,
            "distance" | "nearest" | "by-distance" => Self::Distance,
            "discount" | "by-discount" => Self::Discount,
            _ => return Err(ParseSortModeError(value.to_string())),
        };
        Ok(mode)
    }
}

/// Records whose category matches, in their original relative order.
#[must_use]
pub fn filter_by_category<T: DealMetrics + Clone>(base: &[T], filter: &CategoryFilter) -> Vec<T> {
    base.iter()
        .filter(|record| filter.matches(record.category()))
        .cloned()
        .collect()
}

/// A sorted copy of `records`. All sorts are stable.
#[must_use]
pub fn sort_deals<T: DealMetrics + Clone>(records: &[T], mode: SortMode) -> Vec<T> {
    match mode {
        SortMode::None => records.to_vec(),
        SortMode::PersonalAffinity => sort_by_counter(records, T::personal_redemptions),
        SortMode::Popularity => sort_by_counter(records, T::global_redemptions),
        SortMode::Distance => {
            let mut sorted = records.to_vec();
            sorted.sort_by(|a, b| compare_distance(a.distance_km(), b.distance_km()));
            sorted
        }
        SortMode::Discount => {
            let mut sorted = records.to_vec();
            sorted.sort_by_key(|record| Reverse(record.discount_percentage()));
            sorted
        }
    }
}

/// Filter then sort, never touching `base`.
#[must_use]
pub fn apply<T: DealMetrics + Clone>(base: &[T], filter: &CategoryFilter, mode: SortMode) -> Vec<T> {
    sort_deals(&filter_by_category(base, filter), mode)
}

fn sort_by_counter<T: Clone>(records: &[T], counter: impl Fn(&T) -> u32) -> Vec<T> {
    let mut sorted = records.to_vec();
    // No counter data at all: keep the input order untouched.
    if records.iter().all(|record| counter(record) == 0) {
        return sorted;
    }
    sorted.sort_by_key(|record| Reverse(counter(record)));
    sorted
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
