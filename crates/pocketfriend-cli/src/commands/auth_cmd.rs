use pocketfriend_core::auth::SignUpOutcome;
use pocketfriend_core::SessionSnapshot;

use crate::auth::clear_stored_session;
use crate::cli::AuthCommands;
use crate::commands::common::open_profile;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            profile,
            email,
            password,
        } => {
            let context = open_profile(profile.as_deref().or(global_profile)).await?;
            let session = context.session.sign_in(&email, &password).await?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!(
                "Signed in profile '{}' as {email_label}",
                context.profile_name
            );
            Ok(())
        }
        AuthCommands::Signup {
            profile,
            email,
            password,
            name,
        } => {
            let context = open_profile(profile.as_deref().or(global_profile)).await?;
            match context.session.sign_up(&email, &password, &name).await? {
                SignUpOutcome::SignedIn(_) => {
                    println!(
                        "Created account {} and signed in profile '{}'",
                        email.trim(),
                        context.profile_name
                    );
                }
                SignUpOutcome::ConfirmationRequired(_) => {
                    println!(
                        "Created account {}. Confirm your email, then run `pocketfriend auth login`.",
                        email.trim()
                    );
                }
            }
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let context = match open_profile(profile.as_deref().or(global_profile)).await {
                Ok(context) => context,
                Err(CliError::NotConfigured(profile_name)) => {
                    println!("Profile '{profile_name}' is not configured.");
                    return Ok(());
                }
                Err(error) => return Err(error),
            };

            println!(
                "{}",
                describe_status(&context.profile_name, &context.session.snapshot())
            );
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let explicit = profile.as_deref().or(global_profile);
            let profile_name = match open_profile(explicit).await {
                Ok(context) => {
                    if let Err(error) = context.session.sign_out().await {
                        tracing::warn!("Failed to revoke session remotely: {error}");
                    }
                    context.profile_name
                }
                Err(CliError::NotConfigured(profile_name)) => profile_name,
                Err(error) => return Err(error),
            };

            clear_stored_session(&profile_name)
                .map_err(|error| CliError::Auth(error.to_string()))?;
            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}

pub fn describe_status(profile_name: &str, snapshot: &SessionSnapshot) -> String {
    let Some(session) = &snapshot.session else {
        return format!("Profile '{profile_name}' is not signed in.");
    };

    let email_label = session.user.email.as_deref().unwrap_or("(no email)");
    match &snapshot.profile {
        Some(profile) if !profile.full_name.is_empty() => format!(
            "Profile '{}' is signed in as {} <{}> (expires_at={})",
            profile_name, profile.full_name, email_label, session.expires_at
        ),
        _ => format!(
            "Profile '{}' is signed in as {} (expires_at={})",
            profile_name, email_label, session.expires_at
        ),
    }
}
