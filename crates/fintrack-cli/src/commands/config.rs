use std::env;

use fintrack_core::config::{ClientConfig, SUPABASE_ANON_KEY_ENV, SUPABASE_URL_ENV};

use crate::cli::ConfigCommands;
use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
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

/// Merge explicit values, then environment, then what the profile already had.
pub fn merge_profile_values(
    explicit: ClientConfig,
    environment: ClientConfig,
    existing: ClientConfig,
) -> ClientConfig {
    explicit.or(environment).or(existing)
}

#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    profile_name: Option<&str>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile_values(
        ClientConfig {
            supabase_url: normalize_text_option(supabase_url),
            supabase_anon_key: normalize_text_option(supabase_anon_key),
        },
        ClientConfig {
            supabase_url: normalize_text_option(env::var(SUPABASE_URL_ENV).ok()),
            supabase_anon_key: normalize_text_option(env::var(SUPABASE_ANON_KEY_ENV).ok()),
        },
        ClientConfig {
            supabase_url: existing_profile.supabase_url.clone(),
            supabase_anon_key: existing_profile.supabase_anon_key,
        },
    );

    // Validates presence and URL shape before anything is written.
    merged.endpoints()?;

    let profile = config.profile_mut_or_default(&profile_name);
    profile.supabase_url = merged.supabase_url;
    profile.supabase_anon_key = merged.supabase_anon_key;

    if !no_activate || config.active_profile.is_none() {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!("Saved profile '{profile_name}' to {}", path.display());
    if config.active_profile.as_deref() == Some(profile_name.as_str()) {
        println!("Active profile: {profile_name}");
    }
    Ok(())
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    let resolved = profile.client_config();
    println!("Profile:  {profile_name}");
    println!(
        "URL:      {}",
        resolved.supabase_url.as_deref().unwrap_or("(unset)")
    );
    println!(
        "Anon key: {}",
        if resolved.supabase_anon_key.is_some() {
            "(set)"
        } else {
            "(unset)"
        }
    );
    if let Ok(endpoints) = resolved.endpoints() {
        println!("REST:     {}", endpoints.rest_url());
        println!("Auth:     {}", endpoints.auth_url());
    }
    Ok(())
}
