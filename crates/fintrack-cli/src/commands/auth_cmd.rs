use fintrack_core::auth::SignUpOutcome;

use crate::auth::{clear_stored_session, load_stored_session, SupabaseAuthService};
use crate::cli::AuthCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

/// Auth service for a configured profile, or a configuration error.
pub fn auth_service_for(profile_name: &str) -> Result<SupabaseAuthService, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile = config.profile(profile_name).cloned().unwrap_or_default();
    let endpoints = profile.client_config().endpoints().map_err(|error| {
        CliError::Config(format!(
            "Profile '{profile_name}' missing Supabase config ({error}). Run `fintrack config init --profile {profile_name}` or set SUPABASE_URL and SUPABASE_ANON_KEY."
        ))
    })?;
    SupabaseAuthService::new(profile_name, &endpoints).map_err(|error| CliError::Auth(error.to_string()))
}

fn resolve_profile_name(profile: Option<&str>) -> Result<String, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    Ok(config.resolve_profile_name(profile))
}

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            profile,
            email,
            password,
        } => {
            let profile_name = resolve_profile_name(profile.as_deref().or(global_profile))?;
            let session = auth_service_for(&profile_name)?
                .sign_in(&email, &password)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
            Ok(())
        }
        AuthCommands::Signup {
            profile,
            email,
            password,
        } => {
            let profile_name = resolve_profile_name(profile.as_deref().or(global_profile))?;
            let outcome = auth_service_for(&profile_name)?
                .sign_up(&email, &password)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            match outcome {
                SignUpOutcome::SignedIn(_) => {
                    println!("Created account and signed in profile '{profile_name}' as {email}");
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!("Check {email} for a confirmation link, then run `fintrack auth login`.");
                }
            }
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let profile_name = resolve_profile_name(profile.as_deref().or(global_profile))?;
            let session = match auth_service_for(&profile_name) {
                Ok(service) => service
                    .restore_session()
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?,
                Err(_) => load_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?,
            };

            if let Some(session) = session {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} (user_id={}, expires_at={})",
                    profile_name, email_label, session.user.id, session.expires_at
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let profile_name = resolve_profile_name(profile.as_deref().or(global_profile))?;
            let stored_session = load_stored_session(&profile_name)
                .map_err(|error| CliError::Auth(error.to_string()))?;

            match (auth_service_for(&profile_name), stored_session) {
                (Ok(service), Some(session)) => {
                    if let Err(error) = service.sign_out(&session.access_token).await {
                        tracing::warn!("Remote sign-out failed: {}", error);
                        clear_stored_session(&profile_name)
                            .map_err(|error| CliError::Auth(error.to_string()))?;
                    }
                }
                _ => clear_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?,
            }

            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}
