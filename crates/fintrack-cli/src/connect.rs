//! Resolve the backend and signed-in identity a command runs against.

use std::time::Duration;

use fintrack_core::auth::{AuthSession, AuthUser};
use fintrack_core::session::StaticSession;
use fintrack_core::{
    Budget, Category, GateOutcome, Identity, MemoryBackend, Mutation, RemoteTable, Resource,
    SessionGate, SupabaseBackend, Transaction, UserId,
};

use crate::commands::auth_cmd::auth_service_for;
use crate::commands::records::CliRecord;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub const DEMO_USER_ID: &str = "demo-user";
const DEMO_ACTIVITY_INTERVAL: Duration = Duration::from_secs(2);

/// Gate on the profile's stored session and build a Supabase backend for it.
pub async fn connect_supabase(
    profile: Option<&str>,
) -> Result<(SupabaseBackend, Identity), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let auth = auth_service_for(&profile_name)?;
    let endpoints = config
        .profile(&profile_name)
        .cloned()
        .unwrap_or_default()
        .client_config()
        .endpoints()?;

    match SessionGate::new(auth.into_client()).resolve().await {
        GateOutcome::Authenticated(identity, session) => {
            tracing::debug!("Using profile '{}' as {}", profile_name, identity.user_id);
            Ok((SupabaseBackend::new(&endpoints, &session)?, identity))
        }
        GateOutcome::SignInRequired => Err(CliError::SignInRequired(profile_name)),
    }
}

/// An in-process backend holding sample data for a fixed demo user.
pub async fn connect_demo() -> Result<(MemoryBackend, Identity), CliError> {
    let gate = SessionGate::new(StaticSession(Some(demo_session())));
    let GateOutcome::Authenticated(identity, _) = gate.resolve().await else {
        return Err(CliError::SignInRequired("demo".to_string()));
    };

    let backend = MemoryBackend::new();
    let today = fintrack_core::util::today();
    seed::<Transaction>(&backend, &identity.user_id, today).await?;
    seed::<Category>(&backend, &identity.user_id, today).await?;
    seed::<Budget>(&backend, &identity.user_id, today).await?;
    Ok((backend, identity))
}

fn demo_session() -> AuthSession {
    AuthSession {
        access_token: "demo".to_string(),
        refresh_token: "demo".to_string(),
        expires_at: i64::MAX,
        user: AuthUser {
            id: UserId::new(DEMO_USER_ID),
            email: Some("demo@fintrack.local".to_string()),
        },
    }
}

async fn seed<R: CliRecord>(
    backend: &MemoryBackend,
    owner: &UserId,
    today: chrono::NaiveDate,
) -> Result<(), CliError> {
    for draft in R::samples(today) {
        backend.write::<R>(owner, Mutation::Create(draft)).await?;
    }
    Ok(())
}

/// Play another session's edits into the demo backend so `watch` has
/// something to show: create a record, edit it, then delete it.
pub async fn simulate_activity<R: CliRecord>(backend: MemoryBackend, owner: UserId) {
    let mut samples = R::samples(fintrack_core::util::today()).into_iter();
    let (Some(first), Some(second)) = (samples.next(), samples.next()) else {
        return;
    };

    tokio::time::sleep(DEMO_ACTIVITY_INTERVAL).await;
    let created = match backend.write::<R>(&owner, Mutation::Create(first)).await {
        Ok(created) => created,
        Err(error) => {
            tracing::warn!("Demo activity stopped: {}", error);
            return;
        }
    };

    tokio::time::sleep(DEMO_ACTIVITY_INTERVAL).await;
    let id = created.id().clone();
    if let Err(error) = backend
        .write::<R>(&owner, Mutation::Update(id.clone(), second))
        .await
    {
        tracing::warn!("Demo activity stopped: {}", error);
        return;
    }

    tokio::time::sleep(DEMO_ACTIVITY_INTERVAL).await;
    if let Err(error) = backend.write::<R>(&owner, Mutation::Delete(id)).await {
        tracing::warn!("Demo activity stopped: {}", error);
    }
}
