//! Supabase (GoTrue) auth client and session persistence.

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::models::UserId;
use crate::util::{compact_text, unix_timestamp_now};

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user.id
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    /// The account exists but email confirmation is pending.
    ConfirmationRequired(AuthUser),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth request: {0}")]
    InvalidRequest(&'static str),
    #[error("Auth HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse auth payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Session storage error: {0}")]
    Storage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where the current session survives between process runs.
pub trait SessionPersistence: Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Process-local session storage; nothing outlives the process.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Option<AuthSession>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn with_session(session: AuthSession) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(session))),
        }
    }
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let guard = self
            .slot
            .lock()
            .map_err(|error| AuthError::Storage(error.to_string()))?;
        Ok(guard.clone())
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|error| AuthError::Storage(error.to_string()))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|error| AuthError::Storage(error.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// The identity operations the session holder depends on.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Load the persisted session, refreshing it when it has expired.
    async fn restore_session(&self) -> AuthResult<Option<AuthSession>>;
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome>;
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession>;
    async fn sign_out(&self, session: &AuthSession) -> AuthResult<()>;
}

pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(config: &GatewayConfig, store: S) -> AuthResult<Self> {
        Ok(Self {
            auth_url: config.auth_url(),
            anon_key: config.anon_key().to_string(),
            client: Client::builder().build()?,
            store,
        })
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidRequest("Refresh token must not be empty"));
        }

        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&serde_json::json!({ "refresh_token": refresh_token })),
        );
        let session = self
            .send_auth_request(request)
            .await?
            .into_session()?
            .ok_or_else(|| {
                AuthError::Api("Refresh response did not include an active session".to_string())
            })?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn send_auth_request(&self, request: RequestBuilder) -> AuthResult<GoTrueResponse> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<GoTrueResponse>().await?)
    }
}

#[async_trait]
impl<S: SessionPersistence> AuthProvider for SupabaseAuthClient<S> {
    async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored.is_expired() {
            return Ok(Some(stored));
        }

        match self.refresh_session(&stored.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;

        let request = self.public_request(
            self.client
                .post(format!("{}/signup", self.auth_url))
                .json(&serde_json::json!({ "email": email, "password": password })),
        );
        let response = self.send_auth_request(request).await?;
        let user = response.user_hint();
        match response.into_session()? {
            Some(session) => {
                self.store.save_session(&session)?;
                Ok(SignUpOutcome::SignedIn(session))
            }
            None => user.map(SignUpOutcome::ConfirmationRequired).ok_or_else(|| {
                AuthError::Api("Sign-up response did not include a user".to_string())
            }),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "password")])
                .json(&serde_json::json!({ "email": email, "password": password })),
        );
        let session = self
            .send_auth_request(request)
            .await?
            .into_session()?
            .ok_or_else(|| {
                AuthError::Api("Sign-in response did not include an active session".to_string())
            })?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    async fn sign_out(&self, session: &AuthSession) -> AuthResult<()> {
        let response = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        // An already-revoked token still counts as signed out locally.
        let status = response.status();
        if !(status.is_success() || status == StatusCode::UNAUTHORIZED) {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        self.store.clear_session()?;
        Ok(())
    }
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::InvalidRequest("Email is required"));
    }
    if password.trim().is_empty() {
        return Err(AuthError::InvalidRequest("Password is required"));
    }
    Ok(())
}

/// GoTrue answers either with session fields at the top level or nested
/// under `session`, depending on endpoint and confirmation settings.
#[derive(Debug, Deserialize)]
struct GoTrueResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<GoTrueUser>,
    session: Option<GoTrueSession>,
    // Sign up with confirmation pending returns the bare user object.
    id: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<GoTrueUser>,
}

#[derive(Debug, Clone, Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
}

impl From<GoTrueUser> for AuthUser {
    fn from(value: GoTrueUser) -> Self {
        Self {
            id: UserId::new(value.id),
            email: value.email,
        }
    }
}

impl GoTrueResponse {
    fn user_hint(&self) -> Option<AuthUser> {
        self.user
            .clone()
            .or_else(|| self.session.as_ref().and_then(|session| session.user.clone()))
            .map(Into::into)
            .or_else(|| {
                self.id.clone().map(|id| AuthUser {
                    id: UserId::new(id),
                    email: self.email.clone(),
                })
            })
    }

    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let user = self.user_hint();
        let nested = self.session;
        let access_token = self
            .access_token
            .or_else(|| nested.as_ref().and_then(|s| s.access_token.clone()));
        let refresh_token = self
            .refresh_token
            .or_else(|| nested.as_ref().and_then(|s| s.refresh_token.clone()));
        let expires_at = self
            .expires_at
            .or_else(|| nested.as_ref().and_then(|s| s.expires_at))
            .or_else(|| {
                self.expires_in
                    .or_else(|| nested.as_ref().and_then(|s| s.expires_in))
                    .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
            });

        match (access_token, refresh_token, expires_at, user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<GoTrueErrorBody>(body) {
        if let Some(message) = payload
            .msg
            .or(payload.message)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
