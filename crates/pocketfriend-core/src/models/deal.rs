//! Deal and restaurant models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::string_id;

string_id!(
    /// Identifier of a row in the `deals` table
    DealId
);

/// A restaurant that owns one or more deals (`restaurants` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub cuisine_types: Vec<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: i64,
    #[serde(default)]
    pub location_city: String,
    #[serde(default)]
    pub location_state: String,
    #[serde(default)]
    pub location_postcode: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website_label: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub maps_url: Option<String>,
    #[serde(default)]
    pub hours: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Restaurant {
    /// "City, STATE postcode" label, skipping blank parts.
    #[must_use]
    pub fn location_label(&self) -> String {
        let region = [self.location_state.trim(), self.location_postcode.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        [self.location_city.trim(), region.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A discount offer (`deals` table), optionally with its restaurant embedded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub restaurant_id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub full_description: String,
    /// Whole percent, 0 to 100
    pub discount_percentage: u8,
    #[serde(default)]
    pub image_url: String,
    pub category: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default)]
    pub terms_and_conditions: Vec<String>,
    #[serde(default)]
    pub redemption_time_limit_minutes: i64,
    #[serde(default)]
    pub cooldown_hours: i64,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant: Option<Restaurant>,
}

impl Deal {
    /// A deal is shown only while active and inside its validity window.
    #[must_use]
    pub fn is_eligible_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.valid_from <= now && now <= self.valid_until
    }

    #[must_use]
    pub fn is_eligible_now(&self) -> bool {
        self.is_eligible_at(Utc::now())
    }

    /// How long a started redemption stays valid.
    #[must_use]
    pub fn redemption_time_limit(&self) -> Duration {
        Duration::minutes(self.redemption_time_limit_minutes.max(0))
    }

    /// Minimum gap between two redemptions of this deal by one user.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::hours(self.cooldown_hours.max(0))
    }

    /// Name of the owning restaurant when it was embedded in the query.
    #[must_use]
    pub fn restaurant_name(&self) -> Option<&str> {
        self.restaurant.as_ref().map(|restaurant| restaurant.name.as_str())
    }
}

const fn default_true() -> bool {
    true
}


#[cfg(test)]
mod tests {
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    use super::fixtures::deal;
    use super::*;

    #[test]
    fn eligibility_requires_active_flag_and_window() {
        let now = Utc::now();
        let mut offer = deal("d1", "pizza", 30, now);
        assert!(offer.is_eligible_at(now));

        assert!(!offer.is_eligible_at(now + Duration::days(2)));
        assert!(!offer.is_eligible_at(now - Duration::days(2)));

        offer.is_active = false;
        assert!(!offer.is_eligible_at(now));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let now = Utc::now();
        let offer = deal("d1", "pizza", 30, now);
        assert!(offer.is_eligible_at(offer.valid_from));
        assert!(offer.is_eligible_at(offer.valid_until));
    }

    #[test]
    fn deserializes_postgrest_row_with_embedded_restaurant() {
        let raw = r#"{
            "id": "7c1f",
            "restaurant_id": "r1",
            "slug": "dough-30",
            "title": "30% OFF - Entire Menu",
            "full_description": "Authentic pizza",
            "discount_percentage": 30,
            "image_url": "https://img.example.com/a.jpg",
            "category": "pizza",
            "valid_from": "2025-01-01T00:00:00+00:00",
            "valid_until": "2030-01-01T00:00:00+00:00",
            "terms_and_conditions": ["Dine-in only"],
            "redemption_time_limit_minutes": 15,
            "cooldown_hours": 3,
            "is_active": true,
            "restaurant": {
                "id": "r1",
                "slug": "dough-pizzeria",
                "name": "Dough Pizzeria",
                "cuisine_types": ["pizza", "pasta"],
                "rating": 4.5,
                "review_count": 120,
                "location_city": "Ashwood",
                "location_state": "VIC",
                "location_postcode": "3147",
                "address": "1 High St",
                "is_active": true
            }
        }"#;

        let parsed: Deal = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.id, DealId::new("7c1f"));
        assert_eq!(parsed.restaurant_name(), Some("Dough Pizzeria"));
        assert_eq!(parsed.cooldown(), Duration::hours(3));
        assert_eq!(
            parsed.restaurant.unwrap().location_label(),
            "Ashwood, VIC 3147"
        );
    }

    #[test]
    fn negative_durations_clamp_to_zero() {
        let mut offer = deal("d1", "pizza", 30, Utc::now());
        offer.cooldown_hours = -4;
        assert_eq!(offer.cooldown(), Duration::zero());
    }
}
