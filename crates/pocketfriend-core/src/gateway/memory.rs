//! In-process gateway for test suites.
//!
//! Mirrors the backend rules the client relies on: `(user, deal)` favorites
//! are unique, deletes match the exact pair and reads join the deal rows.
//! Every call is recorded so callers can assert on remote traffic.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use super::{DealQuery, RemoteGateway};
use crate::auth::AuthSession;
use crate::models::{
    Deal, DealId, Favorite, FavoriteRow, NewUserProfile, Notification, NotificationId, UserId,
    UserProfile,
};
use crate::{Error, Result};

/// One recorded gateway invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    FetchFavorites(UserId),
    InsertFavorite(UserId, DealId),
    DeleteFavorite(UserId, DealId),
    FetchActiveDeals(DealQuery),
    FetchProfile(UserId),
    InsertProfile(UserId),
    FetchNotifications(UserId),
    MarkNotificationRead(NotificationId),
}

#[derive(Default)]
struct MemoryState {
    deals: Vec<Deal>,
    favorites: Vec<Favorite>,
    profiles: Vec<UserProfile>,
    notifications: Vec<Notification>,
    calls: Vec<GatewayCall>,
    fail_reads: bool,
    fail_writes: bool,
    next_row_id: u64,
}

#[derive(Default)]
struct ReadGates {
    favorites: Option<Arc<Semaphore>>,
    notifications: Option<Arc<Semaphore>>,
}

#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
    gates: Mutex<ReadGates>,
}

impl MemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_deals(deals: Vec<Deal>) -> Self {
        let gateway = Self::default();
        gateway.state().deals = deals;
        gateway
    }

    pub fn add_profile(&self, profile: UserProfile) {
        self.state().profiles.push(profile);
    }

    pub fn add_notification(&self, notification: Notification) {
        self.state().notifications.push(notification);
    }

    /// Seed a favorite row without recording a call.
    pub fn add_favorite(&self, user_id: &UserId, deal_id: &DealId) {
        let mut state = self.state();
        let row = state.new_favorite(user_id, deal_id);
        state.favorites.push(row);
    }

    /// Make every subsequent read fail with a backend error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    /// Make every subsequent write fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Park favorite reads until [`Self::release_favorite_reads`] lets them through.
    pub fn hold_favorite_reads(&self) {
        self.gates().favorites = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_favorite_reads(&self, count: usize) {
        if let Some(gate) = self.gates().favorites.as_ref() {
            gate.add_permits(count);
        }
    }

    /// Park notification reads until [`Self::release_notification_reads`].
    pub fn hold_notification_reads(&self) {
        self.gates().notifications = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_notification_reads(&self, count: usize) {
        if let Some(gate) = self.gates().notifications.as_ref() {
            gate.add_permits(count);
        }
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Stored `(user, deal)` pairs in insertion order.
    pub fn favorite_pairs(&self) -> Vec<(UserId, DealId)> {
        self.state()
            .favorites
            .iter()
            .map(|favorite| (favorite.user_id.clone(), favorite.deal_id.clone()))
            .collect()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state().notifications.clone()
    }

    pub fn profiles(&self) -> Vec<UserProfile> {
        self.state().profiles.clone()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gates(&self) -> MutexGuard<'_, ReadGates> {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_read(&self, call: GatewayCall) -> Result<MutexGuard<'_, MemoryState>> {
        let mut state = self.state();
        state.calls.push(call);
        if state.fail_reads {
            return Err(Error::Gateway("simulated read failure (503)".to_string()));
        }
        Ok(state)
    }

    fn record_write(&self, call: GatewayCall) -> Result<MutexGuard<'_, MemoryState>> {
        let mut state = self.state();
        state.calls.push(call);
        if state.fail_writes {
            return Err(Error::Gateway("simulated write failure (503)".to_string()));
        }
        Ok(state)
    }
}

async fn pass_gate(gate: Option<Arc<Semaphore>>) -> Result<()> {
    if let Some(gate) = gate {
        gate.acquire()
            .await
            .map_err(|error| Error::Gateway(error.to_string()))?
            .forget();
    }
    Ok(())
}

impl MemoryState {
    fn new_favorite(&mut self, user_id: &UserId, deal_id: &DealId) -> Favorite {
        self.next_row_id += 1;
        Favorite {
            id: format!("fav-{}", self.next_row_id),
            user_id: user_id.clone(),
            deal_id: deal_id.clone(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn fetch_favorites(&self, session: &AuthSession) -> Result<Vec<FavoriteRow>> {
        let user_id = session.user_id().clone();
        self.state()
            .calls
            .push(GatewayCall::FetchFavorites(user_id.clone()));

        let gate = self.gates().favorites.clone();
        pass_gate(gate).await?;

        let state = self.state();
        if state.fail_reads {
            return Err(Error::Gateway("simulated read failure (503)".to_string()));
        }
        Ok(state
            .favorites
            .iter()
            .filter(|favorite| favorite.user_id == user_id)
            .map(|favorite| FavoriteRow {
                deal_id: favorite.deal_id.clone(),
                deal: state
                    .deals
                    .iter()
                    .find(|deal| deal.id == favorite.deal_id)
                    .cloned(),
            })
            .collect())
    }

    async fn insert_favorite(&self, session: &AuthSession, deal_id: &DealId) -> Result<()> {
        let user_id = session.user_id();
        let mut state =
            self.record_write(GatewayCall::InsertFavorite(user_id.clone(), deal_id.clone()))?;
        let duplicate = state
            .favorites
            .iter()
            .any(|favorite| &favorite.user_id == user_id && &favorite.deal_id == deal_id);
        if duplicate {
            return Err(Error::Gateway(
                "duplicate key value violates unique constraint [23505]".to_string(),
            ));
        }
        let row = state.new_favorite(user_id, deal_id);
        state.favorites.push(row);
        Ok(())
    }

    async fn delete_favorite(&self, session: &AuthSession, deal_id: &DealId) -> Result<()> {
        let user_id = session.user_id();
        let mut state =
            self.record_write(GatewayCall::DeleteFavorite(user_id.clone(), deal_id.clone()))?;
        state
            .favorites
            .retain(|favorite| !(&favorite.user_id == user_id && &favorite.deal_id == deal_id));
        Ok(())
    }

    async fn fetch_active_deals(
        &self,
        _session: Option<&AuthSession>,
        query: &DealQuery,
    ) -> Result<Vec<Deal>> {
        let state = self.record_read(GatewayCall::FetchActiveDeals(query.clone()))?;
        let now = Utc::now();
        let mut deals = state
            .deals
            .iter()
            .filter(|deal| deal.is_eligible_at(now))
            .filter(|deal| {
                query
                    .category
                    .as_ref()
                    .is_none_or(|category| &deal.category == category)
            })
            .cloned()
            .collect::<Vec<_>>();
        if query.newest_first {
            deals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Ok(deals)
    }

    async fn fetch_profile(&self, session: &AuthSession) -> Result<Option<UserProfile>> {
        let user_id = session.user_id();
        let state = self.record_read(GatewayCall::FetchProfile(user_id.clone()))?;
        Ok(state
            .profiles
            .iter()
            .find(|profile| &profile.id == user_id)
            .cloned())
    }

    async fn insert_profile(
        &self,
        _session: Option<&AuthSession>,
        profile: &NewUserProfile,
    ) -> Result<()> {
        let mut state = self.record_write(GatewayCall::InsertProfile(profile.id.clone()))?;
        if state.profiles.iter().any(|existing| existing.id == profile.id) {
            return Err(Error::Gateway(
                "duplicate key value violates unique constraint [23505]".to_string(),
            ));
        }
        let now = Utc::now();
        state.profiles.push(UserProfile {
            id: profile.id.clone(),
            full_name: profile.full_name.clone(),
            email: profile.email.clone(),
            profile_image_url: None,
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    async fn fetch_notifications(&self, session: &AuthSession) -> Result<Vec<Notification>> {
        let user_id = session.user_id();
        self.state()
            .calls
            .push(GatewayCall::FetchNotifications(user_id.clone()));

        let gate = self.gates().notifications.clone();
        pass_gate(gate).await?;

        let state = self.state();
        if state.fail_reads {
            return Err(Error::Gateway("simulated read failure (503)".to_string()));
        }
        let mut rows = state
            .notifications
            .iter()
            .filter(|notification| &notification.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn mark_notification_read(
        &self,
        session: &AuthSession,
        notification_id: &NotificationId,
    ) -> Result<()> {
        let user_id = session.user_id();
        let mut state =
            self.record_write(GatewayCall::MarkNotificationRead(notification_id.clone()))?;
        for notification in &mut state.notifications {
            if &notification.id == notification_id && &notification.user_id == user_id {
                notification.is_read = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::fixtures::session_for;
    use crate::models::deal_fixtures::deal;

    #[tokio::test]
    async fn duplicate_favorite_is_rejected() {
        let gateway = MemoryGateway::new();
        let session = session_for("u1");
        let deal_id = DealId::new("d1");

        gateway.insert_favorite(&session, &deal_id).await.unwrap();
        let error = gateway.insert_favorite(&session, &deal_id).await.unwrap_err();
        assert!(error.to_string().contains("23505"));
        assert_eq!(gateway.favorite_pairs().len(), 1);
    }

    #[tokio::test]
    async fn delete_matches_exact_pair() {
        let gateway = MemoryGateway::new();
        let deal_id = DealId::new("d1");
        gateway.add_favorite(&UserId::new("u1"), &deal_id);
        gateway.add_favorite(&UserId::new("u2"), &deal_id);

        gateway
            .delete_favorite(&session_for("u1"), &deal_id)
            .await
            .unwrap();

        assert_eq!(
            gateway.favorite_pairs(),
            vec![(UserId::new("u2"), deal_id)]
        );
    }

    #[tokio::test]
    async fn favorites_join_deals_and_skip_other_users() {
        let now = Utc::now();
        let gateway = MemoryGateway::with_deals(vec![deal("d1", "pizza", 30, now)]);
        gateway.add_favorite(&UserId::new("u1"), &DealId::new("d1"));
        gateway.add_favorite(&UserId::new("u1"), &DealId::new("gone"));
        gateway.add_favorite(&UserId::new("u2"), &DealId::new("d1"));

        let rows = gateway.fetch_favorites(&session_for("u1")).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].deal.is_some());
        assert!(rows[1].deal.is_none());
    }

    #[tokio::test]
    async fn active_deals_respect_window_and_category() {
        let now = Utc::now();
        let mut expired = deal("old", "pizza", 50, now);
        expired.valid_until = now - Duration::hours(1);
        let gateway = MemoryGateway::with_deals(vec![
            deal("p1", "pizza", 30, now),
            deal("b1", "burgers", 20, now),
            expired,
        ]);

        let query = DealQuery {
            category: Some("pizza".to_string()),
            newest_first: false,
        };
        let deals = gateway.fetch_active_deals(None, &query).await.unwrap();
        assert_eq!(
            deals.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["p1"]
        );
        assert_eq!(gateway.calls(), vec![GatewayCall::FetchActiveDeals(query)]);
    }

    #[tokio::test]
    async fn failing_writes_leave_state_untouched() {
        let gateway = MemoryGateway::new();
        gateway.set_fail_writes(true);
        assert!(gateway
            .insert_favorite(&session_for("u1"), &DealId::new("d1"))
            .await
            .is_err());
        assert!(gateway.favorite_pairs().is_empty());
        assert_eq!(gateway.calls().len(), 1);
    }
}
