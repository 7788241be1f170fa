use chrono::Utc;
use pocketfriend_core::notifications::NotificationCenter;
use pocketfriend_core::NotificationId;

use crate::cli::NotificationsCommands;
use crate::commands::common::{
    format_notification_lines, normalize_identifier, notification_to_list_item, open_profile,
    NotificationListItem,
};
use crate::error::CliError;

pub async fn run_notifications(
    command: NotificationsCommands,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let context = open_profile(global_profile).await?;
    context.require_signed_in()?;

    let center = NotificationCenter::new(
        context.gateway.clone(),
        context.change_feed(),
        context.session.subscribe(),
    );
    center.refetch().await?;

    match command {
        NotificationsCommands::List { json } => {
            let state = center.state();
            let now = Utc::now();
            if json {
                let items = state
                    .notifications
                    .iter()
                    .map(|notification| notification_to_list_item(notification, now))
                    .collect::<Vec<NotificationListItem>>();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if state.notifications.is_empty() {
                println!("No notifications.");
            } else {
                println!("{} unread", state.unread);
                for line in format_notification_lines(&state.notifications, now) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        NotificationsCommands::Read { id } => {
            let id = NotificationId::new(normalize_identifier(&id, "Notification ID")?);
            center.mark_as_read(&id).await?;
            println!("Marked {id} as read ({} unread)", center.unread_count());
            Ok(())
        }
        NotificationsCommands::Watch => watch_notifications(&center).await,
    }
}

async fn watch_notifications(center: &NotificationCenter) -> Result<(), CliError> {
    let mut updates = center.subscribe();
    let mut seen = updates.borrow_and_update().notifications.len();
    let _guard = center.listen().await?;
    println!("Watching for notifications ({seen} loaded). Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                let fresh = state.notifications.len().saturating_sub(seen);
                seen = state.notifications.len();
                for line in format_notification_lines(&state.notifications[..fresh], Utc::now()) {
                    println!("{line}");
                }
            }
        }
    }

    tracing::info!("Stopped watching notifications");
    Ok(())
}
