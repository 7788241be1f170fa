//! Remote Data Gateway: table access on the hosted backend.
//!
//! The backend owns storage, uniqueness constraints and row-level security.
//! The client only issues queries through [`RemoteGateway`]; every
//! user-scoped call carries the caller's [`AuthSession`] so the backend can
//! authorize it.

#[cfg(any(test, feature = "testing"))]
mod memory;
mod rest;

use async_trait::async_trait;

use crate::auth::AuthSession;
use crate::models::{Deal, DealId, FavoriteRow, NewUserProfile, Notification, NotificationId, UserProfile};
use crate::Result;

#[cfg(any(test, feature = "testing"))]
pub use memory::{GatewayCall, MemoryGateway};
pub use rest::SupabaseGateway;

/// Filters for the live active-deals listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealQuery {
    /// Restrict to one category tag.
    pub category: Option<String>,
    /// Order by creation time, newest first. Otherwise backend order.
    pub newest_first: bool,
}

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Favorite rows for the session's user, joined with deal and restaurant.
    async fn fetch_favorites(&self, session: &AuthSession) -> Result<Vec<FavoriteRow>>;

    /// Insert the `(user, deal)` pair. Duplicates are rejected by the backend.
    async fn insert_favorite(&self, session: &AuthSession, deal_id: &DealId) -> Result<()>;

    /// Delete by the exact `(user, deal)` pair, never by row id.
    async fn delete_favorite(&self, session: &AuthSession, deal_id: &DealId) -> Result<()>;

    /// Active deals inside their validity window, restaurant embedded.
    async fn fetch_active_deals(
        &self,
        session: Option<&AuthSession>,
        query: &DealQuery,
    ) -> Result<Vec<Deal>>;

    async fn fetch_profile(&self, session: &AuthSession) -> Result<Option<UserProfile>>;

    /// Create the profile row after sign up. `session` is `None` while the
    /// account still awaits email confirmation.
    async fn insert_profile(
        &self,
        session: Option<&AuthSession>,
        profile: &NewUserProfile,
    ) -> Result<()>;

    /// The user's notifications, newest first.
    async fn fetch_notifications(&self, session: &AuthSession) -> Result<Vec<Notification>>;

    async fn mark_notification_read(
        &self,
        session: &AuthSession,
        notification_id: &NotificationId,
    ) -> Result<()>;
}
