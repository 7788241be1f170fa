use pocketfriend_core::{DealId, FavoritesSynchronizer, Notice};

use crate::cli::FavoritesCommands;
use crate::commands::common::{
    deal_to_list_item, format_deal_lines, normalize_identifier, open_profile, DealListItem,
};
use crate::error::CliError;

pub async fn run_favorites(
    command: FavoritesCommands,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let context = open_profile(global_profile).await?;
    context.require_signed_in()?;

    let synchronizer =
        FavoritesSynchronizer::new(context.gateway.clone(), context.session.subscribe());
    synchronizer.refetch().await?;

    match command {
        FavoritesCommands::List { json } => {
            let snapshot = synchronizer.snapshot();
            if json {
                let items = snapshot
                    .deals()
                    .iter()
                    .map(|deal| deal_to_list_item(deal, snapshot.ids()))
                    .collect::<Vec<DealListItem>>();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if snapshot.is_empty() {
                println!("No saved deals yet.");
            } else {
                for line in format_deal_lines(snapshot.deals(), snapshot.ids()) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        FavoritesCommands::Toggle { deal_id } => {
            let deal_id = DealId::new(normalize_identifier(&deal_id, "Deal ID")?);
            let notice = synchronizer.toggle_favorite(&deal_id).await;
            report_notice(&notice, &context.profile_name)
        }
    }
}

/// Print a toggle outcome; error notices become command failures.
pub fn report_notice(notice: &Notice, profile_name: &str) -> Result<(), CliError> {
    match notice {
        Notice::Added(deal_id) | Notice::Removed(deal_id) => {
            println!("{notice} ({deal_id})");
            Ok(())
        }
        Notice::Failed(_) => Err(CliError::Favorite(notice.message())),
        Notice::SignInRequired => Err(CliError::NotSignedIn(profile_name.to_string())),
    }
}
