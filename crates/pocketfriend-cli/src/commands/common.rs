use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pocketfriend_core::catalog::DealListing;
use pocketfriend_core::config::GatewayConfig;
use pocketfriend_core::gateway::{RemoteGateway, SupabaseGateway};
use pocketfriend_core::models::Notification;
use pocketfriend_core::realtime::{ChangeFeed, SupabaseRealtime};
use pocketfriend_core::{Deal, DealId, SessionHolder};
use serde::Serialize;

use crate::auth::auth_client_for_profile;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

/// Everything a command needs to talk to one profile's backend.
pub struct ProfileContext {
    pub profile_name: String,
    pub config: GatewayConfig,
    pub gateway: Arc<dyn RemoteGateway>,
    pub session: SessionHolder,
}

impl ProfileContext {
    pub fn require_signed_in(&self) -> Result<(), CliError> {
        if self.session.snapshot().is_signed_in() {
            Ok(())
        } else {
            Err(CliError::NotSignedIn(self.profile_name.clone()))
        }
    }

    pub fn change_feed(&self) -> Arc<dyn ChangeFeed> {
        Arc::new(SupabaseRealtime::new(&self.config))
    }
}

#[derive(Debug, Serialize)]
pub struct DealListItem {
    pub id: String,
    pub title: String,
    pub restaurant: Option<String>,
    pub category: String,
    pub discount_percentage: u8,
    pub valid_until: String,
    pub favorite: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationListItem {
    pub id: String,
    pub notification_type: String,
    pub title: String,
    pub description: String,
    pub is_read: bool,
    pub expired: bool,
    pub created_at: String,
    pub relative_time: String,
}

/// Profile name plus backend config: the profile's own values, else the
/// `SUPABASE_URL` / `SUPABASE_ANON_KEY` environment.
pub fn resolve_backend(global_profile: Option<&str>) -> Result<(String, GatewayConfig), CliError> {
    let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = profiles.resolve_profile_name(global_profile);
    let from_profile = match profiles.profile(&profile_name) {
        Some(profile) => profile.gateway_config()?,
        None => None,
    };

    let config = match from_profile {
        Some(config) => config,
        None => GatewayConfig::from_env()?
            .ok_or_else(|| CliError::NotConfigured(profile_name.clone()))?,
    };
    Ok((profile_name, config))
}

/// Build the gateway and session holder for a profile and restore its
/// stored session.
pub async fn open_profile(global_profile: Option<&str>) -> Result<ProfileContext, CliError> {
    let (profile_name, config) = resolve_backend(global_profile)?;
    let gateway: Arc<dyn RemoteGateway> = Arc::new(SupabaseGateway::new(&config)?);
    let auth = auth_client_for_profile(&profile_name, &config)
        .map_err(|error| CliError::Auth(error.to_string()))?;
    let session = SessionHolder::new(Arc::new(auth), Arc::clone(&gateway));

    if let Err(error) = session.bootstrap().await {
        tracing::warn!("Failed to restore session for profile '{profile_name}': {error}");
    }

    Ok(ProfileContext {
        profile_name,
        config,
        gateway,
        session,
    })
}

pub fn normalize_identifier(value: &str, label: &'static str) -> Result<String, CliError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyIdentifier(label))
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_deal_lines(deals: &[Deal], favorites: &HashSet<DealId>) -> Vec<String> {
    deals
        .iter()
        .map(|deal| {
            let marker = if favorites.contains(&deal.id) { '*' } else { ' ' };
            let short_id = deal.id.as_str().chars().take(13).collect::<String>();
            let title = truncate(&deal.title, 36);
            let restaurant = deal.restaurant_name().unwrap_or("-");
            format!(
                "{marker} {short_id:<13}  {:>3}%  {title:<36}  {restaurant}  [{}]",
                deal.discount_percentage, deal.category
            )
        })
        .collect()
}

pub fn deal_to_list_item(deal: &Deal, favorites: &HashSet<DealId>) -> DealListItem {
    DealListItem {
        id: deal.id.to_string(),
        title: deal.title.clone(),
        restaurant: deal.restaurant_name().map(str::to_string),
        category: deal.category.clone(),
        discount_percentage: deal.discount_percentage,
        valid_until: deal.valid_until.to_rfc3339(),
        favorite: favorites.contains(&deal.id),
    }
}

pub fn format_listing_lines(listings: &[DealListing]) -> Vec<String> {
    listings
        .iter()
        .map(|listing| {
            format!(
                "{:<3} {:<28} {:<10} {:.1}  {:>5.1} km  {}",
                listing.id,
                truncate(&listing.name, 28),
                listing.headline(),
                listing.rating,
                listing.distance_km,
                listing.location
            )
        })
        .collect()
}

pub fn format_notification_lines(notifications: &[Notification], now: DateTime<Utc>) -> Vec<String> {
    let now_ms = now.timestamp_millis();
    notifications
        .iter()
        .map(|notification| {
            let marker = if notification.is_read { ' ' } else { '*' };
            let short_id = notification.id.as_str().chars().take(13).collect::<String>();
            let title = truncate(&notification.title, 36);
            let relative_time =
                format_relative_time(notification.created_at.timestamp_millis(), now_ms);
            if notification.is_expired_at(now) {
                format!("{marker} {short_id:<13}  {title:<36}  {relative_time:<10}  (expired)")
            } else {
                format!("{marker} {short_id:<13}  {title:<36}  {relative_time}")
            }
        })
        .collect()
}

pub fn notification_to_list_item(
    notification: &Notification,
    now: DateTime<Utc>,
) -> NotificationListItem {
    NotificationListItem {
        id: notification.id.to_string(),
        notification_type: notification.notification_type.clone(),
        title: notification.title.clone(),
        description: notification.description.clone(),
        is_read: notification.is_read,
        expired: notification.is_expired_at(now),
        created_at: notification.created_at.to_rfc3339(),
        relative_time: format_relative_time(
            notification.created_at.timestamp_millis(),
            now.timestamp_millis(),
        ),
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
