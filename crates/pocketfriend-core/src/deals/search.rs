//! Free-text search over deal listings.
//!
//! A case-insensitive substring match against a record's display text and
//! keywords. A blank query matches everything.

use crate::catalog::DealListing;
use crate::models::Deal;

/// Text a search query is matched against.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;
}

impl Searchable for DealListing {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.name.as_str(),
            self.subtitle.as_str(),
            self.description.as_str(),
            self.location.as_str(),
            self.category.as_str(),
        ];
        fields.extend(self.keywords.iter().map(String::as_str));
        fields
    }
}

/// Live deals search their title, descriptions, category and restaurant.
impl Searchable for Deal {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str(), self.full_description.as_str()];
        fields.extend(self.short_description.as_deref());
        fields.push(self.category.as_str());
        if let Some(restaurant) = &self.restaurant {
            fields.push(restaurant.name.as_str());
            fields.extend(restaurant.subtitle.as_deref());
            fields.extend(restaurant.cuisine_types.iter().map(String::as_str));
        }
        fields
    }
}

/// Records matching `query`, in base order.
#[must_use]
pub fn search_listings<T: Searchable + Clone>(base: &[T], query: &str) -> Vec<T> {
    if query.trim().is_empty() {
        return base.to_vec();
    }

    let needle = query.to_lowercase();
    base.iter()
        .filter(|record| matches_query(*record, &needle))
        .cloned()
        .collect()
}

/// `needle` must already be lowercase.
fn matches_query(record: &impl Searchable, needle: &str) -> bool {
    record
        .search_fields()
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle))
}
