//! Data models mirrored from the backend tables

/// Declares a string-backed identifier that serializes as a bare string.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

pub(crate) use string_id;

mod deal;
mod favorite;
mod notification;
mod profile;

pub use deal::{Deal, DealId, Restaurant};
pub use favorite::{Favorite, FavoriteRow, NewFavorite};
pub use notification::{Notification, NotificationId};
pub use profile::{NewUserProfile, UserId, UserProfile};

#[cfg(test)]
pub(crate) use deal::fixtures as deal_fixtures;
