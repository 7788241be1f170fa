//! Error types for pocketfriend-core

use thiserror::Error;

use crate::auth::AuthError;

/// Result type alias using pocketfriend-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pocketfriend-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A mutating operation was attempted without a signed-in user
    #[error("You must be signed in to do that")]
    NotAuthenticated,

    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("Backend error: {0}")]
    Gateway(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Realtime channel error
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// Auth provider error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Invalid endpoint or key configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// Whether this error came from the remote side rather than local state.
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Gateway(_) | Self::Realtime(_) | Self::Auth(_)
        )
    }
}
