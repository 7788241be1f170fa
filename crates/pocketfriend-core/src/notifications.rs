//! Notification feed for the signed-in user.
//!
//! Loads the user's notifications newest first, keeps an unread count and
//! prepends rows pushed by the realtime feed.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::AuthSession;
use crate::gateway::RemoteGateway;
use crate::models::{Notification, NotificationId, UserId};
use crate::realtime::{ChangeFeed, ChangeFilter, FeedGuard};
use crate::session::SessionSnapshot;
use crate::{Error, Result};

const NOTIFICATIONS_TABLE: &str = "notifications";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationState {
    /// Newest first.
    pub notifications: Vec<Notification>,
    pub unread: usize,
    pub loading: bool,
}

pub struct NotificationCenter {
    gateway: Arc<dyn RemoteGateway>,
    feed: Arc<dyn ChangeFeed>,
    session: watch::Receiver<SessionSnapshot>,
    state: Arc<watch::Sender<NotificationState>>,
}

impl NotificationCenter {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        feed: Arc<dyn ChangeFeed>,
        session: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        let (state, _) = watch::channel(NotificationState::default());
        Self {
            gateway,
            feed,
            session,
            state: Arc::new(state),
        }
    }

    #[must_use]
    pub fn state(&self) -> NotificationState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.state.borrow().unread
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.state.subscribe()
    }

    /// Reload every notification for the signed-in user.
    pub async fn refetch(&self) -> Result<()> {
        let Some(session) = self.current_session() else {
            self.clear();
            return Ok(());
        };

        self.state.send_modify(|state| state.loading = true);
        match self.gateway.fetch_notifications(&session).await {
            Ok(notifications) => {
                let current_user = self.current_user();
                if current_user.as_ref() != Some(session.user_id()) {
                    tracing::debug!(
                        "Discarding notifications fetched for user {} after a session change",
                        session.user_id()
                    );
                    if current_user.is_none() {
                        self.clear();
                    } else {
                        self.state.send_modify(|state| state.loading = false);
                    }
                    return Ok(());
                }
                let unread = notifications.iter().filter(|row| !row.is_read).count();
                self.state.send_replace(NotificationState {
                    notifications,
                    unread,
                    loading: false,
                });
                Ok(())
            }
            Err(error) => {
                tracing::error!("Error fetching notifications: {}", error);
                self.state.send_modify(|state| state.loading = false);
                Err(error)
            }
        }
    }

    /// Mark one notification read remotely, then locally.
    pub async fn mark_as_read(&self, notification_id: &NotificationId) -> Result<()> {
        let session = self.current_session().ok_or(Error::NotAuthenticated)?;
        if let Err(error) = self
            .gateway
            .mark_notification_read(&session, notification_id)
            .await
        {
            tracing::error!(
                "Error marking notification {} as read: {}",
                notification_id,
                error
            );
            return Err(error);
        }

        self.state.send_modify(|state| {
            for row in &mut state.notifications {
                if &row.id == notification_id {
                    row.is_read = true;
                }
            }
            state.unread = state.unread.saturating_sub(1);
        });
        Ok(())
    }

    /// Prepend notifications inserted for the signed-in user while the
    /// returned guard is alive.
    pub async fn listen(&self) -> Result<FeedGuard> {
        let session = self.current_session().ok_or(Error::NotAuthenticated)?;
        let filter = ChangeFilter::inserts(NOTIFICATIONS_TABLE)
            .with_filter(format!("user_id=eq.{}", session.user_id()));
        let (mut receiver, guard) = self.feed.subscribe(&session, filter).await?.into_parts();

        let state = Arc::clone(&self.state);
        let pump = tokio::spawn(async move {
            while let Some(change) = receiver.recv().await {
                match change.decode::<Notification>() {
                    Ok(notification) => {
                        tracing::debug!("New notification {}", notification.id);
                        state.send_modify(|state| {
                            state.notifications.insert(0, notification);
                            state.unread += 1;
                        });
                    }
                    Err(error) => tracing::warn!("Ignoring malformed notification row: {}", error),
                }
            }
        });
        Ok(guard.also(move || pump.abort()))
    }

    pub fn clear(&self) {
        self.state.send_replace(NotificationState::default());
    }

    /// Refetch and listen for each signed-in user; clear on sign-out.
    ///
    /// The realtime subscription of the previous user is released before the
    /// next one starts.
    pub async fn follow_session(&self) {
        let mut session = self.session.clone();
        let mut current: Option<Option<UserId>> = None;
        let mut guard: Option<FeedGuard> = None;

        loop {
            let user = session.borrow_and_update().user_id().cloned();
            if current.as_ref() != Some(&user) {
                drop(guard.take());
                if user.is_some() {
                    if let Err(error) = self.refetch().await {
                        tracing::warn!("Initial notifications load failed: {}", error);
                    }
                    match self.listen().await {
                        Ok(listening) => guard = Some(listening),
                        Err(error) => tracing::warn!("Realtime notifications unavailable: {}", error),
                    }
                } else {
                    self.clear();
                }
                current = Some(user);
            }

            if session.changed().await.is_err() {
                break;
            }
        }
    }

    fn current_session(&self) -> Option<AuthSession> {
        self.session.borrow().session.clone()
    }

    fn current_user(&self) -> Option<UserId> {
        self.session.borrow().user_id().cloned()
    }
}
