//! pocketfriend-core - Core library for PocketFriend
//!
//! This crate contains the models, the hosted-backend gateway, the session
//! holder, the favorites synchronizer, the deal filter/sort pipeline and the
//! notification feed used by every PocketFriend interface.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod deals;
pub mod error;
pub mod favorites;
pub mod gateway;
pub mod models;
pub mod notice;
pub mod notifications;
pub mod realtime;
pub mod session;
pub mod util;

pub use error::{Error, Result};
pub use favorites::{FavoritesPhase, FavoritesSnapshot, FavoritesSynchronizer};
pub use models::{Deal, DealId, NotificationId, UserId};
pub use notice::Notice;
pub use session::{SessionHolder, SessionSnapshot};
