//! In-process change feed for test suites.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{subscription_channel, ChangeFeed, ChangeFilter, FeedGuard, RowChange, Subscription};
use crate::auth::AuthSession;
use crate::models::UserId;
use crate::{Error, Result};

struct Subscriber {
    id: u64,
    user_id: UserId,
    filter: ChangeFilter,
    sender: mpsc::Sender<RowChange>,
}

#[derive(Default)]
struct FeedState {
    subscribers: Vec<Subscriber>,
    next_id: u64,
    fail_subscribe: bool,
}

/// Delivers changes pushed with [`MemoryChangeFeed::push`] to every live
/// subscription whose filter matches.
#[derive(Clone, Default)]
pub struct MemoryChangeFeed {
    state: Arc<Mutex<FeedState>>,
}

impl MemoryChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a change; returns how many subscriptions received it.
    pub fn push(&self, change: &RowChange) -> usize {
        let state = self.state();
        state
            .subscribers
            .iter()
            .filter(|subscriber| subscriber.filter.matches(change))
            .filter(|subscriber| subscriber.sender.try_send(change.clone()).is_ok())
            .count()
    }

    /// Subscriptions that have not been released yet.
    pub fn active_subscriptions(&self) -> usize {
        self.state().subscribers.len()
    }

    /// Users with a live subscription, in subscription order.
    pub fn subscribed_users(&self) -> Vec<UserId> {
        self.state()
            .subscribers
            .iter()
            .map(|subscriber| subscriber.user_id.clone())
            .collect()
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.state().fail_subscribe = fail;
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<FeedState>) -> MutexGuard<'_, FeedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ChangeFeed for MemoryChangeFeed {
    async fn subscribe(&self, session: &AuthSession, filter: ChangeFilter) -> Result<Subscription> {
        let mut state = self.state();
        if state.fail_subscribe {
            return Err(Error::Realtime("simulated subscribe failure".to_string()));
        }

        state.next_id += 1;
        let id = state.next_id;
        let (sender, receiver) = subscription_channel();
        state.subscribers.push(Subscriber {
            id,
            user_id: session.user_id().clone(),
            filter,
            sender,
        });

        let shared = Arc::clone(&self.state);
        let guard = FeedGuard::new(move || {
            lock(&shared)
                .subscribers
                .retain(|subscriber| subscriber.id != id);
        });
        Ok(Subscription::new(receiver, guard))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::auth::fixtures::session_for;

    #[tokio::test]
    async fn delivers_matching_changes_until_released() {
        let feed = MemoryChangeFeed::new();
        let filter = ChangeFilter::inserts("notifications").with_filter("user_id=eq.u1");
        let mut subscription = feed.subscribe(&session_for("u1"), filter).await.unwrap();
        assert_eq!(feed.subscribed_users(), vec![UserId::new("u1")]);

        let change = RowChange::insert("notifications", json!({ "id": "n1", "user_id": "u1" }));
        assert_eq!(feed.push(&change), 1);
        assert_eq!(subscription.next().await, Some(change.clone()));

        let other = RowChange::insert("notifications", json!({ "id": "n2", "user_id": "u2" }));
        assert_eq!(feed.push(&other), 0);

        drop(subscription);
        assert_eq!(feed.active_subscriptions(), 0);
        assert_eq!(feed.push(&change), 0);
    }

    #[tokio::test]
    async fn closes_stream_when_guard_is_released() {
        let feed = MemoryChangeFeed::new();
        let subscription = feed
            .subscribe(&session_for("u1"), ChangeFilter::inserts("notifications"))
            .await
            .unwrap();
        let (mut receiver, guard) = subscription.into_parts();

        guard.unsubscribe();

        assert_eq!(receiver.recv().await, None);
    }

    #[tokio::test]
    async fn subscribe_failure_is_reported() {
        let feed = MemoryChangeFeed::new();
        feed.set_fail_subscribe(true);
        let result = feed
            .subscribe(&session_for("u1"), ChangeFilter::inserts("notifications"))
            .await;
        assert!(matches!(result, Err(Error::Realtime(_))));
    }
}
