//! Transient user-facing messages emitted by favorites operations

use std::fmt;

use crate::models::DealId;

/// How a notice should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// Outcome of a single favorites toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The deal was saved to the user's favorites.
    Added(DealId),
    /// The deal was removed from the user's favorites.
    Removed(DealId),
    /// The remote write failed; local membership is unchanged.
    Failed(DealId),
    /// Nobody is signed in, so nothing was written.
    SignInRequired,
}

impl Notice {
    #[must_use]
    pub const fn level(&self) -> NoticeLevel {
        match self {
            Self::Added(_) => NoticeLevel::Success,
            Self::Removed(_) => NoticeLevel::Info,
            Self::Failed(_) | Self::SignInRequired => NoticeLevel::Error,
        }
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Added(_) => "Deal saved to Favorites ❤️",
            Self::Removed(_) => "Deal removed from Favorites",
            Self::Failed(_) => "Failed to update favorites",
            Self::SignInRequired => "Please log in to save favorites",
        }
    }

    /// The deal the notice is about, if any.
    #[must_use]
    pub const fn deal_id(&self) -> Option<&DealId> {
        match self {
            Self::Added(id) | Self::Removed(id) | Self::Failed(id) => Some(id),
            Self::SignInRequired => None,
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.level(), NoticeLevel::Error)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
