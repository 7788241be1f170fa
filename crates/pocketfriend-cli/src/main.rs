//! PocketFriend CLI - Command-line client for restaurant deals
//!
//! Browse and filter deals, manage favorites and follow notifications for a
//! configured Supabase profile.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::deals::run_deals;
use crate::commands::favorites::run_favorites;
use crate::commands::notifications::run_notifications;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        if let Some(hint) = error.hint() {
            eprintln!("{hint}");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pocketfriend=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Some(Commands::Deals {
            category,
            sort,
            query,
            demo,
            json,
        }) => run_deals(profile, &category, sort.into(), query.as_deref(), demo, json).await?,
        Some(Commands::Favorites { command }) => run_favorites(command, profile).await?,
        Some(Commands::Notifications { command }) => run_notifications(command, profile).await?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        Some(Commands::Config { command }) => run_config(command, profile)?,
        Some(Commands::Auth { command }) => run_auth(command, profile).await?,
        None => {
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
