//! PostgREST-backed gateway for a Supabase project.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{DealQuery, RemoteGateway};
use crate::auth::AuthSession;
use crate::config::GatewayConfig;
use crate::models::{
    Deal, DealId, FavoriteRow, NewFavorite, NewUserProfile, Notification, NotificationId,
    UserProfile,
};
use crate::util::{compact_text, eq_filter};
use crate::{Error, Result};

const FAVORITES_TABLE: &str = "user_favorites";
const DEALS_TABLE: &str = "deals";
const USERS_TABLE: &str = "users";
const NOTIFICATIONS_TABLE: &str = "notifications";

const FAVORITES_SELECT: &str = "deal_id,deals:deal_id(*,restaurant:restaurants(*))";
const DEALS_SELECT: &str = "*,restaurant:restaurants(*)";

type Query = Vec<(&'static str, String)>;

#[derive(Clone)]
pub struct SupabaseGateway {
    rest_url: String,
    anon_key: String,
    client: Client,
}

impl SupabaseGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        Ok(Self {
            rest_url: config.rest_url(),
            anon_key: config.anon_key().to_string(),
            client: Client::builder().build()?,
        })
    }

    /// Request against a table, authorized as the session user or as anon.
    fn request(&self, method: Method, table: &str, session: Option<&AuthSession>) -> RequestBuilder {
        let bearer = session.map_or(self.anon_key.as_str(), |session| {
            session.access_token.as_str()
        });
        self.client
            .request(method, format!("{}/{table}", self.rest_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Gateway(parse_api_error(status, &body)));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<()> {
        let response = request.header("Prefer", "return=minimal").send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Gateway(parse_api_error(status, &body)));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteGateway for SupabaseGateway {
    async fn fetch_favorites(&self, session: &AuthSession) -> Result<Vec<FavoriteRow>> {
        let query: Query = vec![
            ("select", FAVORITES_SELECT.to_string()),
            ("user_id", eq_filter(session.user_id())),
        ];
        let rows = self
            .fetch_rows(
                self.request(Method::GET, FAVORITES_TABLE, Some(session))
                    .query(&query),
            )
            .await?;
        tracing::debug!("Fetched favorites for user {}", session.user_id());
        Ok(rows)
    }

    async fn insert_favorite(&self, session: &AuthSession, deal_id: &DealId) -> Result<()> {
        let payload = NewFavorite {
            user_id: session.user_id().clone(),
            deal_id: deal_id.clone(),
        };
        self.execute(
            self.request(Method::POST, FAVORITES_TABLE, Some(session))
                .json(&payload),
        )
        .await
    }

    async fn delete_favorite(&self, session: &AuthSession, deal_id: &DealId) -> Result<()> {
        let query: Query = vec![
            ("user_id", eq_filter(session.user_id())),
            ("deal_id", eq_filter(deal_id)),
        ];
        self.execute(
            self.request(Method::DELETE, FAVORITES_TABLE, Some(session))
                .query(&query),
        )
        .await
    }

    async fn fetch_active_deals(
        &self,
        session: Option<&AuthSession>,
        query: &DealQuery,
    ) -> Result<Vec<Deal>> {
        self.fetch_rows(
            self.request(Method::GET, DEALS_TABLE, session)
                .query(&active_deals_query(query)),
        )
        .await
    }

    async fn fetch_profile(&self, session: &AuthSession) -> Result<Option<UserProfile>> {
        let query: Query = vec![
            ("select", "*".to_string()),
            ("id", eq_filter(session.user_id())),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<UserProfile> = self
            .fetch_rows(self.request(Method::GET, USERS_TABLE, Some(session)).query(&query))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(
        &self,
        session: Option<&AuthSession>,
        profile: &NewUserProfile,
    ) -> Result<()> {
        self.execute(
            self.request(Method::POST, USERS_TABLE, session)
                .json(profile),
        )
        .await
    }

    async fn fetch_notifications(&self, session: &AuthSession) -> Result<Vec<Notification>> {
        let query: Query = vec![
            ("select", "*".to_string()),
            ("user_id", eq_filter(session.user_id())),
            ("order", "created_at.desc".to_string()),
        ];
        self.fetch_rows(
            self.request(Method::GET, NOTIFICATIONS_TABLE, Some(session))
                .query(&query),
        )
        .await
    }

    async fn mark_notification_read(
        &self,
        session: &AuthSession,
        notification_id: &NotificationId,
    ) -> Result<()> {
        let query: Query = vec![("id", eq_filter(notification_id))];
        self.execute(
            self.request(Method::PATCH, NOTIFICATIONS_TABLE, Some(session))
                .query(&query)
                .json(&serde_json::json!({ "is_read": true })),
        )
        .await
    }
}

fn active_deals_query(query: &DealQuery) -> Query {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut params: Query = vec![
        ("select", DEALS_SELECT.to_string()),
        ("is_active", eq_filter(true)),
        ("valid_from", format!("lte.{now}")),
        ("valid_until", format!("gte.{now}")),
    ];
    if let Some(category) = &query.category {
        params.push(("category", eq_filter(category)));
    }
    if query.newest_first {
        params.push(("order", "created_at.desc".to_string()));
    }
    params
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
    code: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        if let Some(message) = payload.message {
            let mut rendered = message.trim().to_string();
            if let Some(details) = payload.details.filter(|d| !d.trim().is_empty()) {
                rendered.push_str(": ");
                rendered.push_str(details.trim());
            }
            if let Some(hint) = payload.hint.filter(|h| !h.trim().is_empty()) {
                rendered.push_str(" (hint: ");
                rendered.push_str(hint.trim());
                rendered.push(')');
            }
            let code = payload.code.unwrap_or_else(|| status.as_u16().to_string());
            return format!("{rendered} [{code}]");
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
