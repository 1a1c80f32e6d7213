use std::io;

use fintrack_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fintrack_core::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("No {0} found for id/prefix: {1}")]
    RecordNotFound(&'static str, String),
    #[error("{0}")]
    AmbiguousRecordId(String),
    #[error("Missing required option --{0}")]
    MissingField(&'static str),
    #[error("Refusing to delete without confirmation; pass --yes to skip the prompt")]
    ConfirmationRequired,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "Profile '{0}' is not signed in. Run `fintrack auth login --email <EMAIL> --password <PASSWORD>` first, or use --demo."
    )]
    SignInRequired(String),
}
