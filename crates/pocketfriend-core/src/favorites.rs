//! Favorites synchronizer.
//!
//! Keeps a client-local snapshot of the signed-in user's favorited deals in
//! step with the `user_favorites` table. Writes go to the backend first; the
//! membership flag flips only after the write succeeds, then the whole
//! snapshot is refetched. There is no incremental merge.
//!
//! Overlapping toggles of the same deal are not de-duplicated. The last
//! refetch to resolve wins.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::auth::AuthSession;
use crate::gateway::RemoteGateway;
use crate::models::{Deal, DealId, FavoriteRow, UserId};
use crate::notice::Notice;
use crate::session::SessionSnapshot;
use crate::Result;

const NOTICE_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FavoritesPhase {
    /// Nothing loaded: signed out or never fetched.
    #[default]
    Empty,
    /// A refetch is in flight; the previous data is still visible.
    Loading,
    Populated,
}

/// Point-in-time copy of the user's favorites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FavoritesSnapshot {
    ids: HashSet<DealId>,
    deals: Vec<Deal>,
    phase: FavoritesPhase,
}

impl FavoritesSnapshot {
    fn from_rows(rows: Vec<FavoriteRow>) -> Self {
        let mut ids = HashSet::with_capacity(rows.len());
        let mut deals = Vec::with_capacity(rows.len());
        for row in rows {
            ids.insert(row.deal_id);
            // A favorite whose deal row is gone still counts for membership.
            if let Some(deal) = row.deal {
                deals.push(deal);
            }
        }
        Self {
            ids,
            deals,
            phase: FavoritesPhase::Populated,
        }
    }

    #[must_use]
    pub fn contains(&self, deal_id: &DealId) -> bool {
        self.ids.contains(deal_id)
    }

    #[must_use]
    pub const fn ids(&self) -> &HashSet<DealId> {
        &self.ids
    }

    /// Hydrated favorite deals in backend order.
    #[must_use]
    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    #[must_use]
    pub const fn phase(&self) -> FavoritesPhase {
        self.phase
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub struct FavoritesSynchronizer {
    gateway: Arc<dyn RemoteGateway>,
    session: watch::Receiver<SessionSnapshot>,
    snapshot: watch::Sender<FavoritesSnapshot>,
    notices: broadcast::Sender<Notice>,
}

impl FavoritesSynchronizer {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        session: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        let (snapshot, _) = watch::channel(FavoritesSnapshot::default());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            gateway,
            session,
            snapshot,
            notices,
        }
    }

    #[must_use]
    pub fn is_favorite(&self, deal_id: &DealId) -> bool {
        self.snapshot.borrow().contains(deal_id)
    }

    #[must_use]
    pub fn snapshot(&self) -> FavoritesSnapshot {
        self.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn favorites(&self) -> Vec<Deal> {
        self.snapshot.borrow().deals.clone()
    }

    /// Receiver notified on every snapshot replacement.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FavoritesSnapshot> {
        self.snapshot.subscribe()
    }

    /// Every notice produced by [`Self::toggle_favorite`], in order.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Insert the favorite if absent, delete it if present.
    ///
    /// Returns exactly one notice per call. A failed write leaves the
    /// snapshot untouched.
    pub async fn toggle_favorite(&self, deal_id: &DealId) -> Notice {
        let Some(session) = self.current_session() else {
            tracing::info!("Favorite toggle for deal {} needs a signed-in user", deal_id);
            return self.emit(Notice::SignInRequired);
        };

        let was_favorite = self.is_favorite(deal_id);
        let write = if was_favorite {
            self.gateway.delete_favorite(&session, deal_id).await
        } else {
            self.gateway.insert_favorite(&session, deal_id).await
        };
        if let Err(error) = write {
            tracing::error!("Failed to toggle favorite for deal {}: {}", deal_id, error);
            return self.emit(Notice::Failed(deal_id.clone()));
        }

        self.snapshot.send_modify(|snapshot| {
            if was_favorite {
                snapshot.ids.remove(deal_id);
            } else {
                snapshot.ids.insert(deal_id.clone());
            }
        });
        let notice = self.emit(if was_favorite {
            Notice::Removed(deal_id.clone())
        } else {
            Notice::Added(deal_id.clone())
        });

        if let Err(error) = self.refetch().await {
            tracing::warn!("Favorites refetch after toggle failed: {}", error);
        }
        notice
    }

    /// Replace the snapshot with the backend's current favorites.
    ///
    /// Without a signed-in user the snapshot resets to empty and nothing is
    /// fetched.
    pub async fn refetch(&self) -> Result<()> {
        let Some(session) = self.current_session() else {
            self.clear();
            return Ok(());
        };

        let previous_phase = self.snapshot.borrow().phase;
        self.snapshot
            .send_modify(|snapshot| snapshot.phase = FavoritesPhase::Loading);

        match self.gateway.fetch_favorites(&session).await {
            Ok(rows) => {
                let current_user = self.current_user();
                if current_user.as_ref() != Some(session.user_id()) {
                    tracing::debug!(
                        "Discarding favorites fetched for user {} after a session change",
                        session.user_id()
                    );
                    if current_user.is_none() {
                        self.clear();
                    } else {
                        self.restore_phase(previous_phase);
                    }
                    return Ok(());
                }
                let snapshot = FavoritesSnapshot::from_rows(rows);
                tracing::debug!("Loaded {} favorites", snapshot.ids.len());
                self.snapshot.send_replace(snapshot);
                Ok(())
            }
            Err(error) => {
                tracing::error!("Failed to fetch favorites: {}", error);
                self.restore_phase(previous_phase);
                Err(error)
            }
        }
    }

    /// Drop all local favorites.
    pub fn clear(&self) {
        self.snapshot.send_replace(FavoritesSnapshot::default());
    }

    /// Track session changes until the session holder goes away.
    ///
    /// A new user triggers a refetch and signing out clears the snapshot.
    /// Profile-only updates for the same user are ignored.
    pub async fn follow_session(&self) {
        let mut session = self.session.clone();
        let mut current_user = session.borrow_and_update().user_id().cloned();
        self.on_user_changed(current_user.as_ref()).await;

        while session.changed().await.is_ok() {
            let user = session.borrow_and_update().user_id().cloned();
            if user == current_user {
                continue;
            }
            current_user = user;
            self.on_user_changed(current_user.as_ref()).await;
        }
    }

    /// Run [`Self::follow_session`] on the current runtime.
    pub fn spawn_session_follower(self: &Arc<Self>) -> JoinHandle<()> {
        let synchronizer = Arc::clone(self);
        tokio::spawn(async move { synchronizer.follow_session().await })
    }

    async fn on_user_changed(&self, user: Option<&UserId>) {
        match user {
            Some(user) => {
                tracing::debug!("Loading favorites for user {}", user);
                if let Err(error) = self.refetch().await {
                    tracing::warn!("Initial favorites load failed: {}", error);
                }
            }
            None => self.clear(),
        }
    }

    fn restore_phase(&self, previous_phase: FavoritesPhase) {
        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.phase != FavoritesPhase::Loading {
                return false;
            }
            snapshot.phase = previous_phase;
            true
        });
    }

    fn current_session(&self) -> Option<AuthSession> {
        self.session.borrow().session.clone()
    }

    fn current_user(&self) -> Option<UserId> {
        self.session.borrow().user_id().cloned()
    }

    fn emit(&self, notice: Notice) -> Notice {
        // No receivers is fine; the notice is also returned to the caller.
        let _ = self.notices.send(notice.clone());
        notice
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::fixtures::session_for;
    use crate::gateway::{GatewayCall, MemoryGateway};
    use crate::models::deal_fixtures::deal;

    fn deals() -> Vec<Deal> {
        let now = Utc::now();
        vec![
            deal("d1", "pizza", 30, now),
            deal("d2", "burgers", 35, now),
            deal("d3", "kebabs", 40, now),
        ]
    }

    fn signed_in(
        gateway: &Arc<MemoryGateway>,
        user_id: &str,
    ) -> (watch::Sender<SessionSnapshot>, FavoritesSynchronizer) {
        let (sender, receiver) = watch::channel(SessionSnapshot::signed_in(session_for(user_id)));
        let synchronizer = FavoritesSynchronizer::new(gateway.clone(), receiver);
        (sender, synchronizer)
    }

    async fn wait_for_phase(
        receiver: &mut watch::Receiver<FavoritesSnapshot>,
        phase: FavoritesPhase,
    ) {
        tokio::time::timeout(
            StdDuration::from_secs(5),
            receiver.wait_for(|snapshot| snapshot.phase() == phase),
        )
        .await
        .expect("timed out waiting for favorites phase")
        .expect("favorites sender dropped");
    }

    async fn wait_for_calls(gateway: &MemoryGateway, count: usize) {
        tokio::time::timeout(StdDuration::from_secs(5), async {
            while gateway.calls().len() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("timed out waiting for gateway calls");
    }

    #[tokio::test]
    async fn toggle_adds_then_removes() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        let (_session, favorites) = signed_in(&gateway, "u1");
        let id = DealId::new("d1");

        assert_eq!(favorites.toggle_favorite(&id).await, Notice::Added(id.clone()));
        assert!(favorites.is_favorite(&id));
        assert_eq!(favorites.favorites().len(), 1);
        assert_eq!(favorites.snapshot().phase(), FavoritesPhase::Populated);

        assert_eq!(
            favorites.toggle_favorite(&id).await,
            Notice::Removed(id.clone())
        );
        assert!(!favorites.is_favorite(&id));
        assert!(favorites.favorites().is_empty());
        assert!(gateway.favorite_pairs().is_empty());
    }

    #[tokio::test]
    async fn membership_parity_after_settled_toggles() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        let (_session, favorites) = signed_in(&gateway, "u1");
        let id = DealId::new("d2");

        for n in 1..=7 {
            favorites.toggle_favorite(&id).await;
            assert_eq!(favorites.is_favorite(&id), n % 2 == 1, "after {n} toggles");
        }
    }

    #[tokio::test]
    async fn toggle_writes_then_refetches() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        let (_session, favorites) = signed_in(&gateway, "u1");
        let user = UserId::new("u1");
        let id = DealId::new("d3");

        favorites.toggle_favorite(&id).await;
        favorites.toggle_favorite(&id).await;

        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::InsertFavorite(user.clone(), id.clone()),
                GatewayCall::FetchFavorites(user.clone()),
                GatewayCall::DeleteFavorite(user.clone(), id),
                GatewayCall::FetchFavorites(user),
            ]
        );
    }

    #[tokio::test]
    async fn toggle_without_session_makes_no_calls() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        let (_sender, receiver) = watch::channel(SessionSnapshot::default());
        let favorites = FavoritesSynchronizer::new(gateway.clone(), receiver);
        let mut notices = favorites.notices();
        let before = favorites.snapshot();

        let notice = favorites.toggle_favorite(&DealId::new("d1")).await;

        assert_eq!(notice, Notice::SignInRequired);
        assert_eq!(notices.try_recv().unwrap(), Notice::SignInRequired);
        assert!(gateway.calls().is_empty());
        assert_eq!(favorites.snapshot(), before);
    }

    #[tokio::test]
    async fn failed_write_leaves_membership_unchanged() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        gateway.add_favorite(&UserId::new("u1"), &DealId::new("d1"));
        let (_session, favorites) = signed_in(&gateway, "u1");
        favorites.refetch().await.unwrap();
        let before = favorites.snapshot();
        gateway.set_fail_writes(true);

        let added = favorites.toggle_favorite(&DealId::new("d2")).await;
        let removed = favorites.toggle_favorite(&DealId::new("d1")).await;

        assert_eq!(added, Notice::Failed(DealId::new("d2")));
        assert_eq!(removed, Notice::Failed(DealId::new("d1")));
        assert_eq!(favorites.snapshot(), before);
        assert!(favorites.is_favorite(&DealId::new("d1")));
    }

    #[tokio::test]
    async fn emits_exactly_one_notice_per_toggle() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        let (_session, favorites) = signed_in(&gateway, "u1");
        let mut notices = favorites.notices();
        let id = DealId::new("d1");

        favorites.toggle_favorite(&id).await;
        gateway.set_fail_writes(true);
        favorites.toggle_favorite(&id).await;

        assert_eq!(notices.try_recv().unwrap(), Notice::Added(id.clone()));
        assert_eq!(notices.try_recv().unwrap(), Notice::Failed(id));
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn refetch_failure_after_write_keeps_success_notice() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        let (_session, favorites) = signed_in(&gateway, "u1");
        gateway.set_fail_reads(true);
        let id = DealId::new("d1");

        let notice = favorites.toggle_favorite(&id).await;

        assert_eq!(notice, Notice::Added(id.clone()));
        assert!(favorites.is_favorite(&id));
        // The hydrated list is stale until a refetch succeeds.
        assert!(favorites.favorites().is_empty());
        assert_eq!(favorites.snapshot().phase(), FavoritesPhase::Empty);
    }

    #[tokio::test]
    async fn refetch_hydrates_ids_and_deals() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        let user = UserId::new("u1");
        gateway.add_favorite(&user, &DealId::new("d1"));
        gateway.add_favorite(&user, &DealId::new("d3"));
        gateway.add_favorite(&user, &DealId::new("gone"));
        gateway.add_favorite(&UserId::new("u2"), &DealId::new("d2"));
        let (_session, favorites) = signed_in(&gateway, "u1");

        favorites.refetch().await.unwrap();

        let snapshot = favorites.snapshot();
        assert_eq!(snapshot.phase(), FavoritesPhase::Populated);
        assert_eq!(snapshot.ids().len(), 3);
        assert!(snapshot.contains(&DealId::new("gone")));
        assert!(!snapshot.contains(&DealId::new("d2")));
        let ids = snapshot
            .deals()
            .iter()
            .map(|deal| deal.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["d1", "d3"]);
    }

    #[tokio::test]
    async fn refetch_without_session_resets_without_calls() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        let (sender, favorites) = signed_in(&gateway, "u1");
        favorites.toggle_favorite(&DealId::new("d1")).await;
        gateway.clear_calls();
        sender.send_replace(SessionSnapshot::default());

        favorites.refetch().await.unwrap();

        assert_eq!(favorites.snapshot(), FavoritesSnapshot::default());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_refetch_restores_previous_phase() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        let (_session, favorites) = signed_in(&gateway, "u1");
        favorites.refetch().await.unwrap();
        gateway.set_fail_reads(true);

        let result = favorites.refetch().await;

        assert!(result.is_err());
        assert_eq!(favorites.snapshot().phase(), FavoritesPhase::Populated);
    }

    #[tokio::test]
    async fn flag_flips_before_refetch_lands() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        let (_session, favorites) = signed_in(&gateway, "u1");
        let favorites = Arc::new(favorites);
        let mut updates = favorites.subscribe();
        gateway.hold_favorite_reads();
        let id = DealId::new("d1");

        let toggle = {
            let favorites = Arc::clone(&favorites);
            let id = id.clone();
            tokio::spawn(async move { favorites.toggle_favorite(&id).await })
        };
        wait_for_phase(&mut updates, FavoritesPhase::Loading).await;

        let pending = favorites.snapshot();
        assert!(pending.contains(&id));
        assert!(pending.deals().is_empty());

        gateway.release_favorite_reads(1);
        assert_eq!(toggle.await.unwrap(), Notice::Added(id.clone()));
        let settled = favorites.snapshot();
        assert_eq!(settled.phase(), FavoritesPhase::Populated);
        assert_eq!(settled.deals().len(), 1);
    }

    #[tokio::test]
    async fn refetch_for_signed_out_user_is_discarded() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        gateway.add_favorite(&UserId::new("u1"), &DealId::new("d1"));
        let (sender, favorites) = signed_in(&gateway, "u1");
        let favorites = Arc::new(favorites);
        let mut updates = favorites.subscribe();
        gateway.hold_favorite_reads();

        let refetch = {
            let favorites = Arc::clone(&favorites);
            tokio::spawn(async move { favorites.refetch().await })
        };
        wait_for_phase(&mut updates, FavoritesPhase::Loading).await;

        sender.send_replace(SessionSnapshot::default());
        gateway.release_favorite_reads(1);
        refetch.await.unwrap().unwrap();

        let snapshot = favorites.snapshot();
        assert_eq!(snapshot.phase(), FavoritesPhase::Empty);
        assert!(!favorites.is_favorite(&DealId::new("d1")));
        assert_eq!(snapshot, FavoritesSnapshot::default());
    }

    #[tokio::test]
    async fn refetch_for_replaced_user_keeps_previous_phase() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        gateway.add_favorite(&UserId::new("u1"), &DealId::new("d1"));
        gateway.add_favorite(&UserId::new("u2"), &DealId::new("d2"));
        let (sender, favorites) = signed_in(&gateway, "u1");
        let favorites = Arc::new(favorites);
        let mut updates = favorites.subscribe();
        gateway.hold_favorite_reads();

        let refetch = {
            let favorites = Arc::clone(&favorites);
            tokio::spawn(async move { favorites.refetch().await })
        };
        wait_for_phase(&mut updates, FavoritesPhase::Loading).await;

        sender.send_replace(SessionSnapshot::signed_in(session_for("u2")));
        gateway.release_favorite_reads(1);
        refetch.await.unwrap().unwrap();

        assert_eq!(favorites.snapshot().phase(), FavoritesPhase::Empty);
        assert!(!favorites.is_favorite(&DealId::new("d1")));
    }

    #[tokio::test]
    async fn overlapping_toggles_keep_last_refetch() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        let (_session, favorites) = signed_in(&gateway, "u1");
        let favorites = Arc::new(favorites);
        let mut updates = favorites.subscribe();
        gateway.hold_favorite_reads();
        let user = UserId::new("u1");
        let id = DealId::new("d1");

        let spawn_toggle = || {
            let favorites = Arc::clone(&favorites);
            let id = id.clone();
            tokio::spawn(async move { favorites.toggle_favorite(&id).await })
        };

        let first = spawn_toggle();
        wait_for_phase(&mut updates, FavoritesPhase::Loading).await;
        wait_for_calls(&gateway, 2).await;
        // The first write already flipped the flag, so this one deletes.
        let second = spawn_toggle();
        wait_for_calls(&gateway, 4).await;

        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::InsertFavorite(user.clone(), id.clone()),
                GatewayCall::FetchFavorites(user.clone()),
                GatewayCall::DeleteFavorite(user.clone(), id.clone()),
                GatewayCall::FetchFavorites(user),
            ]
        );

        gateway.release_favorite_reads(1);
        assert_eq!(first.await.unwrap(), Notice::Added(id.clone()));
        // The first refetch already saw the second write.
        assert!(!favorites.is_favorite(&id));

        gateway.release_favorite_reads(1);
        assert_eq!(second.await.unwrap(), Notice::Removed(id.clone()));

        let settled = favorites.snapshot();
        assert_eq!(settled.phase(), FavoritesPhase::Populated);
        assert!(settled.is_empty());
        assert!(gateway.favorite_pairs().is_empty());
    }

    #[tokio::test]
    async fn follower_loads_on_sign_in_and_clears_on_sign_out() {
        let gateway = Arc::new(MemoryGateway::with_deals(deals()));
        gateway.add_favorite(&UserId::new("u1"), &DealId::new("d2"));
        let (sender, receiver) = watch::channel(SessionSnapshot::default());
        let favorites = Arc::new(FavoritesSynchronizer::new(gateway.clone(), receiver));
        let mut updates = favorites.subscribe();
        let follower = favorites.spawn_session_follower();

        sender.send_replace(SessionSnapshot::signed_in(session_for("u1")));
        wait_for_phase(&mut updates, FavoritesPhase::Populated).await;
        assert!(favorites.is_favorite(&DealId::new("d2")));

        sender.send_replace(SessionSnapshot::default());
        wait_for_phase(&mut updates, FavoritesPhase::Empty).await;
        assert!(favorites.snapshot().is_empty());

        drop(sender);
        follower.await.unwrap();
    }
}
