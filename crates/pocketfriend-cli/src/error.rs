use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] pocketfriend_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{0} cannot be empty")]
    EmptyIdentifier(&'static str),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "Profile '{0}' has no backend config. Run `pocketfriend config init --profile {0}` or set SUPABASE_URL and SUPABASE_ANON_KEY."
    )]
    NotConfigured(String),
    #[error("Profile '{0}' is not signed in. Run `pocketfriend auth login` first.")]
    NotSignedIn(String),
    #[error("{0}")]
    Favorite(&'static str),
}

impl CliError {
    /// Extra guidance printed under the error, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Core(error) if error.is_remote() => {
                Some("Check your network connection and the profile's Supabase URL/key.")
            }
            Self::Core(pocketfriend_core::Error::NotAuthenticated) => {
                Some("Run `pocketfriend auth login --email <email> --password <password>`.")
            }
            _ => None,
        }
    }
}
