//! User profile rows (`users` table)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::string_id;

string_id!(
    /// Auth user id, shared by the `users` profile row
    UserId
);

/// Profile row mirrored for the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// First word of the full name, falling back to the email local part.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name
            .split_whitespace()
            .next()
            .or_else(|| self.email.split('@').next())
            .unwrap_or_default()
    }
}

/// Insert payload written right after sign up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUserProfile {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
}
