//! Favorite join rows (`user_favorites` table)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Deal, DealId, UserId};

/// A stored `(user, deal)` pair. Unique per pair on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: String,
    pub user_id: UserId,
    pub deal_id: DealId,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a favorite. The row id and timestamp are server-assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFavorite {
    pub user_id: UserId,
    pub deal_id: DealId,
}

/// One favorite as read back with its deal (and restaurant) embedded.
///
/// `deal` is `None` when the referenced deal is no longer visible to the
/// user, e.g. it was deleted or hidden by row-level security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteRow {
    pub deal_id: DealId,
    #[serde(default, rename = "deals")]
    pub deal: Option<Deal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favorite_row_tolerates_missing_deal() {
        let rows: Vec<FavoriteRow> =
            serde_json::from_str(r#"[{"deal_id": "d1", "deals": null}, {"deal_id": "d2"}]"#)
                .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.deal.is_none()));
        assert_eq!(rows[1].deal_id.as_str(), "d2");
    }

    #[test]
    fn new_favorite_serializes_pair_only() {
        let payload = NewFavorite {
            user_id: UserId::new("u1"),
            deal_id: DealId::new("d1"),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({"user_id": "u1", "deal_id": "d1"})
        );
    }
}
