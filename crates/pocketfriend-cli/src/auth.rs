//! CLI Supabase auth/session helpers with secure keychain persistence.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use pocketfriend_core::auth::{
    AuthError, AuthResult, AuthSession, SessionPersistence, SupabaseAuthClient,
};
use pocketfriend_core::config::GatewayConfig;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "pocketfriend-cli";

/// Keychain slot holding one profile's serialized session.
#[derive(Clone)]
pub struct SessionStore {
    username: String,
}

impl SessionStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            username: format!("supabase_session:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::Storage(error.to_string()))
    }
}

impl SessionPersistence for SessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::Storage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let store = Self::test_store();
        let guard = store
            .lock()
            .map_err(|error| AuthError::Storage(error.to_string()))?;
        guard
            .get(&self.username)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(AuthError::from)
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::Storage(error.to_string()))?;
        Ok(())
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        let store = Self::test_store();
        let mut guard = store
            .lock()
            .map_err(|error| AuthError::Storage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::Storage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        let store = Self::test_store();
        let mut guard = store
            .lock()
            .map_err(|error| AuthError::Storage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

/// GoTrue client whose session lives in the profile's keychain slot.
pub fn auth_client_for_profile(
    profile_name: &str,
    config: &GatewayConfig,
) -> AuthResult<SupabaseAuthClient<SessionStore>> {
    SupabaseAuthClient::new(config, SessionStore::new(profile_name))
}

pub fn clear_stored_session(profile_name: &str) -> AuthResult<()> {
    SessionStore::new(profile_name).clear_session()
}

#[cfg(test)]
mod tests {
    use pocketfriend_core::auth::AuthUser;
    use pocketfriend_core::UserId;
    use pretty_assertions::assert_eq;

    use super::*;

    fn session(user: &str) -> AuthSession {
        AuthSession {
            access_token: "secret-access-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            expires_at: 1_700_000_000,
            user: AuthUser {
                id: UserId::new(user),
                email: Some(format!("{user}@example.com")),
            },
        }
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let rendered = format!("{:?}", session("user"));
        assert!(!rendered.contains("secret-access-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn sessions_are_scoped_per_profile() {
        let work = SessionStore::new("auth-test-work");
        let home = SessionStore::new("auth-test-home");

        work.save_session(&session("worker")).unwrap();

        assert_eq!(work.load_session().unwrap(), Some(session("worker")));
        assert_eq!(home.load_session().unwrap(), None);

        clear_stored_session("auth-test-work").unwrap();
        assert_eq!(work.load_session().unwrap(), None);
    }

    #[test]
    fn clearing_missing_session_is_ok() {
        clear_stored_session("auth-test-never-saved").unwrap();
    }
}
