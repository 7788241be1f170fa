use std::env;

use pocketfriend_core::config::{ENV_SUPABASE_ANON_KEY, ENV_SUPABASE_URL};
use pocketfriend_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            supabase_url,
            supabase_anon_key,
            no_activate,
        ),
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(
        &existing_profile,
        supabase_url,
        supabase_anon_key,
        |key| env::var(key).ok(),
    );
    validate_profile(&merged)?;
    *config.profile_mut_or_default(&profile_name) = merged;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profile(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let missing_fields = missing_fields(profile);
    if missing_fields.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `pocketfriend auth login --email <email> --password <password>`."
        );
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let active = config.active_profile.as_deref() == Some(profile_name.as_str());

    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    println!(
        "Profile '{}'{}",
        profile_name,
        if active { " (active)" } else { "" }
    );
    println!(
        "  supabase_url:      {}",
        profile.supabase_url().as_deref().unwrap_or("(unset)")
    );
    println!(
        "  supabase_anon_key: {}",
        profile
            .supabase_anon_key()
            .map_or_else(|| "(unset)".to_string(), |key| mask_secret(&key))
    );
    Ok(())
}

/// Explicit flags win, then the environment, then what the profile had.
pub fn merge_profile(
    existing: &CliProfile,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    read_env: impl Fn(&str) -> Option<String>,
) -> CliProfile {
    CliProfile {
        supabase_url: normalize_text_option(supabase_url)
            .or_else(|| normalize_text_option(read_env(ENV_SUPABASE_URL)))
            .or_else(|| existing.supabase_url()),
        supabase_anon_key: normalize_text_option(supabase_anon_key)
            .or_else(|| normalize_text_option(read_env(ENV_SUPABASE_ANON_KEY)))
            .or_else(|| existing.supabase_anon_key()),
    }
}

pub fn validate_profile(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.supabase_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}

pub fn missing_fields(profile: &CliProfile) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if profile.supabase_url().is_none() {
        missing.push("supabase_url");
    }
    if profile.supabase_anon_key().is_none() {
        missing.push("supabase_anon_key");
    }
    missing
}

pub fn mask_secret(secret: &str) -> String {
    let visible = secret.chars().take(6).collect::<String>();
    if secret.chars().count() <= 6 {
        "*".repeat(secret.chars().count())
    } else {
        format!("{visible}...")
    }
}
