//! Session/identity holder.
//!
//! Owns the current [`AuthSession`] and the mirrored `users` profile row and
//! publishes every change through a [`watch`] channel. Consumers such as the
//! favorites synchronizer take a receiver instead of reaching for global
//! state.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::{AuthProvider, AuthSession, SignUpOutcome};
use crate::gateway::RemoteGateway;
use crate::models::{NewUserProfile, UserId, UserProfile};
use crate::{Error, Result};

/// What subscribers see after every session change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session: Option<AuthSession>,
    pub profile: Option<UserProfile>,
    /// True until the first bootstrap has finished.
    pub loading: bool,
}

impl SessionSnapshot {
    #[must_use]
    pub const fn signed_in(session: AuthSession) -> Self {
        Self {
            session: Some(session),
            profile: None,
            loading: false,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        self.session.as_ref().map(AuthSession::user_id)
    }

    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }
}

pub struct SessionHolder {
    auth: Arc<dyn AuthProvider>,
    gateway: Arc<dyn RemoteGateway>,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionHolder {
    pub fn new(auth: Arc<dyn AuthProvider>, gateway: Arc<dyn RemoteGateway>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot {
            loading: true,
            ..SessionSnapshot::default()
        });
        Self {
            auth,
            gateway,
            state,
        }
    }

    /// Receiver notified on every sign in, sign out and profile load.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn session(&self) -> Option<AuthSession> {
        self.state.borrow().session.clone()
    }

    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.state.borrow().profile.clone()
    }

    /// The current session, or [`Error::NotAuthenticated`].
    pub fn require_session(&self) -> Result<AuthSession> {
        self.session().ok_or(Error::NotAuthenticated)
    }

    /// Restore the persisted session and load its profile row.
    pub async fn bootstrap(&self) -> Result<Option<AuthSession>> {
        let restored = match self.auth.restore_session().await {
            Ok(restored) => restored,
            Err(error) => {
                self.state.send_modify(|snapshot| snapshot.loading = false);
                return Err(error.into());
            }
        };

        match &restored {
            Some(session) => {
                tracing::info!("Restored session for user {}", session.user_id());
                self.publish_session(Some(session.clone()));
                self.refresh_profile().await;
            }
            None => self.publish_session(None),
        }
        Ok(restored)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let session = self.auth.sign_in(email, password).await?;
        tracing::info!("Signed in as user {}", session.user_id());
        self.publish_session(Some(session.clone()));
        self.refresh_profile().await;
        Ok(session)
    }

    /// Create the account and its `users` row.
    ///
    /// The profile row is written even while email confirmation is pending;
    /// the session is only published when the provider signed the user in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<SignUpOutcome> {
        let outcome = self.auth.sign_up(email, password).await?;
        let (user_id, session) = match &outcome {
            SignUpOutcome::SignedIn(session) => (session.user_id().clone(), Some(session)),
            SignUpOutcome::ConfirmationRequired(user) => (user.id.clone(), None),
        };

        let profile = NewUserProfile {
            id: user_id,
            full_name: full_name.trim().to_string(),
            email: email.trim().to_string(),
        };
        self.gateway.insert_profile(session, &profile).await?;

        if let Some(session) = session {
            tracing::info!("Signed up and signed in as user {}", session.user_id());
            self.publish_session(Some(session.clone()));
            self.refresh_profile().await;
        } else {
            tracing::info!("Signed up user {}; email confirmation pending", profile.id);
        }
        Ok(outcome)
    }

    /// Clear the local session first, then revoke it with the provider.
    pub async fn sign_out(&self) -> Result<()> {
        let current = self.session();
        self.publish_session(None);
        if let Some(session) = current {
            self.auth.sign_out(&session).await?;
            tracing::info!("Signed out user {}", session.user_id());
        }
        Ok(())
    }

    /// Reload the profile row for the current user.
    ///
    /// Failures are logged and leave the previous profile in place.
    pub async fn refresh_profile(&self) -> Option<UserProfile> {
        let session = self.session()?;
        let profile = match self.gateway.fetch_profile(&session).await {
            Ok(profile) => profile,
            Err(error) => {
                tracing::warn!(
                    "Failed to fetch profile for user {}: {}",
                    session.user_id(),
                    error
                );
                return self.profile();
            }
        };

        self.state.send_if_modified(|snapshot| {
            if snapshot.user_id() != Some(session.user_id()) {
                return false;
            }
            snapshot.profile.clone_from(&profile);
            true
        });
        profile
    }

    fn publish_session(&self, session: Option<AuthSession>) {
        self.state.send_replace(SessionSnapshot {
            session,
            profile: None,
            loading: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::fixtures::session_for;
    use crate::auth::{AuthError, AuthResult};
    use crate::gateway::{GatewayCall, MemoryGateway};

    struct StubAuth {
        stored: Option<AuthSession>,
        account: AuthSession,
        confirm_email: bool,
        sign_outs: AtomicUsize,
    }

    impl StubAuth {
        fn new(user_id: &str) -> Self {
            Self {
                stored: None,
                account: session_for(user_id),
                confirm_email: false,
                sign_outs: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AuthProvider for StubAuth {
        async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
            Ok(self.stored.clone())
        }

        async fn sign_up(&self, _email: &str, _password: &str) -> AuthResult<SignUpOutcome> {
            if self.confirm_email {
                Ok(SignUpOutcome::ConfirmationRequired(self.account.user.clone()))
            } else {
                Ok(SignUpOutcome::SignedIn(self.account.clone()))
            }
        }

        async fn sign_in(&self, _email: &str, password: &str) -> AuthResult<AuthSession> {
            if password == "secret" {
                Ok(self.account.clone())
            } else {
                Err(AuthError::Api("Invalid login credentials".to_string()))
            }
        }

        async fn sign_out(&self, _session: &AuthSession) -> AuthResult<()> {
            self.sign_outs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn profile_row(user_id: &str, full_name: &str) -> UserProfile {
        let now = Utc::now();
        UserProfile {
            id: UserId::new(user_id),
            full_name: full_name.to_string(),
            email: format!("{user_id}@example.com"),
            profile_image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn starts_loading_until_bootstrap() {
        let holder = SessionHolder::new(
            Arc::new(StubAuth::new("u1")),
            Arc::new(MemoryGateway::new()),
        );
        assert!(holder.snapshot().loading);

        let restored = holder.bootstrap().await.unwrap();
        assert_eq!(restored, None);
        assert_eq!(holder.snapshot(), SessionSnapshot::default());
    }

    #[tokio::test]
    async fn bootstrap_restores_session_and_profile() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.add_profile(profile_row("u1", "Ada Lovelace"));
        let mut auth = StubAuth::new("u1");
        auth.stored = Some(session_for("u1"));
        let holder = SessionHolder::new(Arc::new(auth), gateway);

        holder.bootstrap().await.unwrap();

        let snapshot = holder.snapshot();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.user_id(), Some(&UserId::new("u1")));
        assert_eq!(snapshot.profile.unwrap().full_name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn sign_in_notifies_subscribers() {
        let holder = SessionHolder::new(
            Arc::new(StubAuth::new("u1")),
            Arc::new(MemoryGateway::new()),
        );
        let mut receiver = holder.subscribe();

        holder.sign_in("u1@example.com", "secret").await.unwrap();

        assert!(receiver.has_changed().unwrap());
        assert_eq!(
            receiver.borrow_and_update().user_id(),
            Some(&UserId::new("u1"))
        );
    }

    #[tokio::test]
    async fn failed_sign_in_stays_signed_out() {
        let holder = SessionHolder::new(
            Arc::new(StubAuth::new("u1")),
            Arc::new(MemoryGateway::new()),
        );

        let error = holder.sign_in("u1@example.com", "wrong").await.unwrap_err();

        assert!(matches!(error, Error::Auth(AuthError::Api(_))));
        assert!(!holder.snapshot().is_signed_in());
        assert!(matches!(
            holder.require_session(),
            Err(Error::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn sign_up_writes_profile_row_and_signs_in() {
        let gateway = Arc::new(MemoryGateway::new());
        let holder = SessionHolder::new(Arc::new(StubAuth::new("u1")), gateway.clone());

        let outcome = holder
            .sign_up(" u1@example.com ", "secret", " Ada Lovelace ")
            .await
            .unwrap();

        assert!(matches!(outcome, SignUpOutcome::SignedIn(_)));
        let profiles = gateway.profiles();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].full_name, "Ada Lovelace");
        assert_eq!(profiles[0].email, "u1@example.com");
        assert_eq!(holder.profile().unwrap().id, UserId::new("u1"));
    }

    #[tokio::test]
    async fn sign_up_pending_confirmation_keeps_user_signed_out() {
        let gateway = Arc::new(MemoryGateway::new());
        let mut auth = StubAuth::new("u1");
        auth.confirm_email = true;
        let holder = SessionHolder::new(Arc::new(auth), gateway.clone());

        let outcome = holder
            .sign_up("u1@example.com", "secret", "Ada")
            .await
            .unwrap();

        assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired(_)));
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::InsertProfile(UserId::new("u1"))]
        );
        assert!(!holder.snapshot().is_signed_in());
    }

    #[tokio::test]
    async fn sign_up_surfaces_profile_write_failure() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.set_fail_writes(true);
        let holder = SessionHolder::new(Arc::new(StubAuth::new("u1")), gateway);

        let result = holder.sign_up("u1@example.com", "secret", "Ada").await;

        assert!(matches!(result, Err(Error::Gateway(_))));
        assert!(!holder.snapshot().is_signed_in());
    }

    #[tokio::test]
    async fn sign_out_clears_state_and_revokes() {
        let auth = Arc::new(StubAuth::new("u1"));
        let gateway = Arc::new(MemoryGateway::new());
        gateway.add_profile(profile_row("u1", "Ada"));
        let holder = SessionHolder::new(auth.clone(), gateway);
        holder.sign_in("u1@example.com", "secret").await.unwrap();
        assert!(holder.profile().is_some());

        holder.sign_out().await.unwrap();

        assert_eq!(holder.snapshot(), SessionSnapshot::default());
        assert_eq!(auth.sign_outs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn profile_fetch_failure_keeps_session() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.set_fail_reads(true);
        let holder = SessionHolder::new(Arc::new(StubAuth::new("u1")), gateway);

        holder.sign_in("u1@example.com", "secret").await.unwrap();

        assert!(holder.snapshot().is_signed_in());
        assert_eq!(holder.profile(), None);
    }
}
