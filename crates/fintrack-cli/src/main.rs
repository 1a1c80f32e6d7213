//! fintrack CLI - personal finance tracking from the terminal
//!
//! Lists and edits transactions, categories and budgets in a Supabase
//! project, and watches them change live.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod connect;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use fintrack_core::{
    Budget, Category, ChangeFeed, MemoryBackend, RemoteTable, Transaction, UserId,
};

use crate::cli::{Cli, Commands, ResourceKind};
use crate::commands::auth_cmd::run_auth;
use crate::commands::config::run_config;
use crate::commands::dashboard::run_dashboard;
use crate::commands::records::{run_records, CliRecord};
use crate::commands::watch::run_watch;
use crate::connect::{connect_demo, connect_supabase, simulate_activity};
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "fintrack=info,fintrack_core=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter())
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Config { command } => run_config(command, profile),
        Commands::Auth { command } => run_auth(command, profile).await,
        data_command if cli.demo => {
            let (backend, identity) = connect_demo().await?;
            match &data_command {
                Commands::Watch { resource, .. } => {
                    spawn_demo_activity(*resource, &backend, &identity.user_id);
                }
                Commands::Dashboard { watch: true, .. } => {
                    spawn_demo_activity(ResourceKind::Transactions, &backend, &identity.user_id);
                }
                _ => {}
            }
            run_data_command(data_command, backend, identity.user_id).await
        }
        data_command => {
            let (backend, identity) = connect_supabase(profile).await?;
            run_data_command(data_command, backend, identity.user_id).await
        }
    }
}

/// `RUST_LOG` when set, otherwise info-level output for fintrack crates only.
fn log_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
}

async fn run_data_command<B>(command: Commands, backend: B, owner: UserId) -> Result<(), CliError>
where
    B: RemoteTable + ChangeFeed + Clone,
{
    match command {
        Commands::Transactions { command } => {
            run_records::<Transaction, B>(command.into(), backend, owner).await
        }
        Commands::Categories { command } => {
            run_records::<Category, B>(command.into(), backend, owner).await
        }
        Commands::Budgets { command } => {
            run_records::<Budget, B>(command.into(), backend, owner).await
        }
        Commands::Dashboard { watch, json } => run_dashboard(backend, owner, watch, json).await,
        Commands::Watch { resource, json } => match resource {
            ResourceKind::Transactions => run_watch::<Transaction, B>(backend, owner, json).await,
            ResourceKind::Categories => run_watch::<Category, B>(backend, owner, json).await,
            ResourceKind::Budgets => run_watch::<Budget, B>(backend, owner, json).await,
        },
        Commands::Config { .. } | Commands::Auth { .. } => Ok(()),
    }
}

fn spawn_demo_activity(resource: ResourceKind, backend: &MemoryBackend, owner: &UserId) {
    fn spawn<R: CliRecord>(backend: &MemoryBackend, owner: &UserId) {
        tokio::spawn(simulate_activity::<R>(backend.clone(), owner.clone()));
    }
    match resource {
        ResourceKind::Transactions => spawn::<Transaction>(backend, owner),
        ResourceKind::Categories => spawn::<Category>(backend, owner),
        ResourceKind::Budgets => spawn::<Budget>(backend, owner),
    }
}
