//! Backend endpoint configuration.
//!
//! A single Supabase project URL and its public anon key are enough to derive
//! every endpoint the client talks to: PostgREST for table access, GoTrue for
//! auth and the Realtime websocket for change feeds.

use std::env;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";

/// Public Supabase project configuration.
///
/// The anon key is safe to ship with the client; row-level security on the
/// backend decides what each session may read or write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    supabase_url: String,
    anon_key: String,
}

impl GatewayConfig {
    pub fn new(supabase_url: impl AsRef<str>, anon_key: impl Into<String>) -> Result<Self> {
        let supabase_url = normalize_project_url(supabase_url.as_ref())?;
        let anon_key = normalize_text_option(Some(anon_key.into())).ok_or_else(|| {
            Error::InvalidConfiguration("Supabase anon key must not be empty".to_string())
        })?;
        Ok(Self {
            supabase_url,
            anon_key,
        })
    }

    /// Load configuration from `SUPABASE_URL` / `SUPABASE_ANON_KEY`.
    ///
    /// Returns `Ok(None)` when neither variable is set and an error when only
    /// one of them is.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    /// Build a configuration from two optional values, as read from a profile.
    pub fn from_parts(url: Option<String>, anon_key: Option<String>) -> Result<Option<Self>> {
        match (normalize_text_option(url), normalize_text_option(anon_key)) {
            (None, None) => Ok(None),
            (Some(url), Some(anon_key)) => Self::new(url, anon_key).map(Some),
            (Some(_), None) => Err(Error::InvalidConfiguration(format!(
                "{ENV_SUPABASE_ANON_KEY} is required when {ENV_SUPABASE_URL} is set"
            ))),
            (None, Some(_)) => Err(Error::InvalidConfiguration(format!(
                "{ENV_SUPABASE_URL} is required when {ENV_SUPABASE_ANON_KEY} is set"
            ))),
        }
    }

    pub fn supabase_url(&self) -> &str {
        &self.supabase_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// PostgREST base, e.g. `https://x.supabase.co/rest/v1`.
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.supabase_url)
    }

    /// GoTrue base, e.g. `https://x.supabase.co/auth/v1`.
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.supabase_url)
    }

    /// Realtime websocket endpoint with the anon key attached.
    pub fn realtime_url(&self) -> String {
        let ws_base = self
            .supabase_url
            .strip_prefix("https://")
            .map_or_else(
                || {
                    self.supabase_url
                        .strip_prefix("http://")
                        .map_or_else(|| self.supabase_url.clone(), |rest| format!("ws://{rest}"))
                },
                |rest| format!("wss://{rest}"),
            );
        format!(
            "{ws_base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            urlencoding::encode(&self.anon_key)
        )
    }
}

fn parse_config(read: impl Fn(&str) -> Option<String>) -> Result<Option<GatewayConfig>> {
    GatewayConfig::from_parts(read(ENV_SUPABASE_URL), read(ENV_SUPABASE_ANON_KEY))
}

/// Strip trailing slashes and known service suffixes from a project URL.
fn normalize_project_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidConfiguration(
            "Supabase URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(trimmed) {
        return Err(Error::InvalidConfiguration(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }

    let project = ["/auth/v1", "/rest/v1"]
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .unwrap_or(trimmed);
    Ok(project.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_config_returns_none_when_unset() {
        assert_eq!(parse_config(env_of(&[])).unwrap(), None);
    }

    #[test]
    fn parse_config_rejects_partial_configuration() {
        let error = parse_config(env_of(&[(ENV_SUPABASE_URL, "https://demo.supabase.co")]))
            .unwrap_err();
        assert!(error.to_string().contains(ENV_SUPABASE_ANON_KEY));
    }

    #[test]
    fn derives_service_endpoints() {
        let config = GatewayConfig::new("https://demo.supabase.co/", "anon").unwrap();
        assert_eq!(config.rest_url(), "https://demo.supabase.co/rest/v1");
        assert_eq!(config.auth_url(), "https://demo.supabase.co/auth/v1");
        assert_eq!(
            config.realtime_url(),
            "wss://demo.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn local_http_project_uses_plain_websocket() {
        let config = GatewayConfig::new("http://127.0.0.1:54321", "anon key").unwrap();
        assert_eq!(
            config.realtime_url(),
            "ws://127.0.0.1:54321/realtime/v1/websocket?apikey=anon%20key&vsn=1.0.0"
        );
    }

    #[test]
    fn strips_service_suffix_from_project_url() {
        let config = GatewayConfig::new("https://demo.supabase.co/auth/v1", "anon").unwrap();
        assert_eq!(config.supabase_url(), "https://demo.supabase.co");
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(GatewayConfig::new("demo.supabase.co", "anon").is_err());
        assert!(GatewayConfig::new("https://demo.supabase.co", "  ").is_err());
    }
}
