//! Built-in demo catalog of restaurant deal listings.
//!
//! Used by listing screens before live deals are wired up and by the CLI's
//! `--demo` mode. Redemption counters start at zero.

use serde::{Deserialize, Serialize};

use crate::deals::DealMetrics;

/// A restaurant's headline deal as shown on category pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealListing {
    pub id: String,
    pub name: String,
    pub subtitle: String,
    pub description: String,
    pub discount: u8,
    pub rating: f64,
    pub distance_km: f64,
    pub location: String,
    pub category: String,
    #[serde(default)]
    pub personal_redemptions: u32,
    #[serde(default)]
    pub total_redemptions: u32,
    #[serde(default)]
    pub headline: Option<String>,
    /// Extra search terms beyond the display text.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl DealListing {
    /// Headline text, defaulting to "N% OFF".
    #[must_use]
    pub fn headline(&self) -> String {
        self.headline
            .clone()
            .unwrap_or_else(|| format!("{}% OFF", self.discount))
    }
}

impl DealMetrics for DealListing {
    fn category(&self) -> &str {
        &self.category
    }

    fn personal_redemptions(&self) -> u32 {
        self.personal_redemptions
    }

    fn global_redemptions(&self) -> u32 {
        self.total_redemptions
    }

    fn distance_km(&self) -> Option<f64> {
        Some(self.distance_km)
    }

    fn discount_percentage(&self) -> u8 {
        self.discount
    }
}

/// A browsable category tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub title: &'static str,
}

pub const CATEGORIES: [CategoryInfo; 8] = [
    CategoryInfo {
        id: "all",
        label: "All",
        title: "All Deals",
    },
    CategoryInfo {
        id: "pizza",
        label: "Pizza",
        title: "Pizza Deals",
    },
    CategoryInfo {
        id: "burgers",
        label: "Burgers",
        title: "Burger Deals",
    },
    CategoryInfo {
        id: "kebabs",
        label: "Kebabs",
        title: "Kebab Deals",
    },
    CategoryInfo {
        id: "continental",
        label: "Continental",
        title: "Continental Deals",
    },
    CategoryInfo {
        id: "pasta",
        label: "Pasta",
        title: "Pasta Deals",
    },
    CategoryInfo {
        id: "asian",
        label: "Asian",
        title: "Asian Deals",
    },
    CategoryInfo {
        id: "indian",
        label: "Indian",
        title: "Indian Deals",
    },
];

/// Category tab by id, falling back to "all" for unknown ids.
#[must_use]
pub fn category_info(id: &str) -> &'static CategoryInfo {
    CATEGORIES
        .iter()
        .find(|category| category.id.eq_ignore_ascii_case(id.trim()))
        .unwrap_or(&CATEGORIES[0])
}

struct Seed {
    id: &'static str,
    name: &'static str,
    subtitle: &'static str,
    description: &'static str,
    discount: u8,
    rating: f64,
    distance_km: f64,
    location: &'static str,
    category: &'static str,
    headline: Option<&'static str>,
    keywords: &'static [&'static str],
}

const SEEDS: [Seed; 9] = [
    Seed {
        id: "dough-pizzeria",
        name: "Dough Pizzeria & Pasta Ashwood",
        subtitle: "Pizza • Pasta • Italian Cuisine",
        description: "Authentic pizza & pasta classics with a juicy 30% OFF across the entire menu.",
        discount: 30,
        rating: 4.5,
        distance_km: 1.2,
        location: "Ashwood, VIC 3147",
        category: "pizza",
        headline: Some("30% OFF - Entire Menu"),
        keywords: &["pizza", "pasta", "italian", "dough", "pizzeria", "ashwood", "30%", "discount"],
    },
    Seed {
        id: "pizza-hut-clayton",
        name: "Pizza Hut Clayton",
        subtitle: "Pizza • Wings • Sides",
        description: "Classic pizzas and combos with 25% student discount.",
        discount: 25,
        rating: 4.2,
        distance_km: 2.5,
        location: "Clayton, VIC 3168",
        category: "pizza",
        headline: None,
        keywords: &["pizza", "hut", "wings", "clayton", "25%", "student", "discount"],
    },
    Seed {
        id: "dominos-burwood",
        name: "Domino's Burwood",
        subtitle: "Pizza • Garlic Bread • Desserts",
        description: "Fast delivery with 20% OFF on all orders.",
        discount: 20,
        rating: 4.0,
        distance_km: 0.8,
        location: "Burwood, VIC 3125",
        category: "pizza",
        headline: None,
        keywords: &["pizza", "dominos", "domino's", "burwood", "20%", "discount"],
    },
    Seed {
        id: "burger-lab",
        name: "Burger Lab Melbourne",
        subtitle: "Burgers • Fries • Shakes",
        description: "Gourmet burgers with 35% OFF for students.",
        discount: 35,
        rating: 4.7,
        distance_km: 3.1,
        location: "Melbourne CBD, VIC 3000",
        category: "burgers",
        headline: None,
        keywords: &[
            "burger",
            "burgers",
            "gourmet",
            "shakes",
            "melbourne",
            "35%",
            "student",
            "discount",
        ],
    },
    Seed {
        id: "grilld-chadstone",
        name: "Grill'd Chadstone",
        subtitle: "Burgers • Salads • Chips",
        description: "Healthy burgers with 15% student discount.",
        discount: 15,
        rating: 4.3,
        distance_km: 4.2,
        location: "Chadstone, VIC 3148",
        category: "burgers",
        headline: None,
        keywords: &[
            "burger",
            "burgers",
            "grilld",
            "grill'd",
            "chadstone",
            "15%",
            "healthy",
            "discount",
        ],
    },
    Seed {
        id: "kebab-station",
        name: "Kebab Station Box Hill",
        subtitle: "Kebabs • Wraps • Plates",
        description: "Fresh kebabs with 40% OFF on all wraps.",
        discount: 40,
        rating: 4.6,
        distance_km: 1.8,
        location: "Box Hill, VIC 3128",
        category: "kebabs",
        headline: None,
        keywords: &["kebab", "kebabs", "wraps", "box hill", "40%", "discount"],
    },
    Seed {
        id: "kebab-king",
        name: "Kebab King Glen Waverley",
        subtitle: "Kebabs • HSP • Falafels",
        description: "Best HSP in town with 30% student discount.",
        discount: 30,
        rating: 4.4,
        distance_km: 2.9,
        location: "Glen Waverley, VIC 3150",
        category: "kebabs",
        headline: None,
        keywords: &[
            "kebab",
            "kebabs",
            "hsp",
            "falafel",
            "glen waverley",
            "30%",
            "student",
            "discount",
        ],
    },
    Seed {
        id: "continental-cafe",
        name: "Continental Café",
        subtitle: "European • Fine Dining • Wine",
        description: "Elegant European cuisine with 25% OFF.",
        discount: 25,
        rating: 4.8,
        distance_km: 5.0,
        location: "South Yarra, VIC 3141",
        category: "continental",
        headline: None,
        keywords: &[
            "european",
            "cafe",
            "café",
            "fine dining",
            "wine",
            "south yarra",
            "25%",
            "discount",
        ],
    },
    Seed {
        id: "euro-bistro",
        name: "Euro Bistro Richmond",
        subtitle: "Continental • Steaks • Seafood",
        description: "Classic continental dishes with 20% student discount.",
        discount: 20,
        rating: 4.5,
        distance_km: 3.5,
        location: "Richmond, VIC 3121",
        category: "continental",
        headline: None,
        keywords: &[
            "continental",
            "bistro",
            "steak",
            "seafood",
            "richmond",
            "20%",
            "student",
            "discount",
        ],
    },
];

/// The demo listings in display order.
#[must_use]
pub fn demo_listings() -> Vec<DealListing> {
    SEEDS
        .iter()
        .map(|seed| DealListing {
            id: seed.id.to_string(),
            name: seed.name.to_string(),
            subtitle: seed.subtitle.to_string(),
            description: seed.description.to_string(),
            discount: seed.discount,
            rating: seed.rating,
            distance_km: seed.distance_km,
            location: seed.location.to_string(),
            category: seed.category.to_string(),
            personal_redemptions: 0,
            total_redemptions: 0,
            headline: seed.headline.map(str::to_string),
            keywords: seed.keywords.iter().map(|keyword| (*keyword).to_string()).collect(),
        })
        .collect()
}
