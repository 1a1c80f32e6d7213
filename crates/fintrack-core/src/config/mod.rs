//! Client configuration for the hosted Supabase project.
//!
//! Provides a `ClientConfig` struct used by the CLI (and any other front end)
//! to discover the auth, REST and Realtime endpoints of one project.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";

/// Public project configuration.
///
/// Both values are safe-to-ship public identifiers. Row access is enforced by
/// the project's row-level security policies, never by this client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
}

/// A validated configuration with every field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEndpoints {
    base_url: String,
    anon_key: String,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            supabase_url: Some(url.into()),
            supabase_anon_key: Some(anon_key.into()),
        }
    }

    /// Read `SUPABASE_URL` / `SUPABASE_ANON_KEY` from the process environment.
    pub fn from_env() -> Self {
        Self {
            supabase_url: normalize_text_option(std::env::var(SUPABASE_URL_ENV).ok()),
            supabase_anon_key: normalize_text_option(std::env::var(SUPABASE_ANON_KEY_ENV).ok()),
        }
    }

    /// Fill missing fields from `fallback`.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            supabase_url: normalize_text_option(self.supabase_url)
                .or_else(|| normalize_text_option(fallback.supabase_url)),
            supabase_anon_key: normalize_text_option(self.supabase_anon_key)
                .or_else(|| normalize_text_option(fallback.supabase_anon_key)),
        }
    }

    pub fn is_configured(&self) -> bool {
        normalize_text_option(self.supabase_url.clone()).is_some()
            && normalize_text_option(self.supabase_anon_key.clone()).is_some()
    }

    /// Validate and resolve the project endpoints.
    pub fn endpoints(&self) -> Result<ProjectEndpoints> {
        let url = normalize_text_option(self.supabase_url.clone()).ok_or_else(|| {
            Error::InvalidConfiguration("Supabase URL must not be empty".to_string())
        })?;
        let anon_key = normalize_text_option(self.supabase_anon_key.clone()).ok_or_else(|| {
            Error::InvalidConfiguration("Supabase anon key must not be empty".to_string())
        })?;
        ProjectEndpoints::new(&url, anon_key)
    }
}

impl ProjectEndpoints {
    pub fn new(url: &str, anon_key: impl Into<String>) -> Result<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        if !is_http_url(trimmed) {
            return Err(Error::InvalidConfiguration(
                "Supabase URL must include http:// or https://".to_string(),
            ));
        }
        // Accept URLs copied with a service suffix.
        let base_url = ["/auth/v1", "/rest/v1", "/realtime/v1"]
            .iter()
            .find_map(|suffix| trimmed.strip_suffix(suffix))
            .unwrap_or(trimmed)
            .to_string();

        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(Error::InvalidConfiguration(
                "Supabase anon key must not be empty".to_string(),
            ));
        }

        Ok(Self { base_url, anon_key })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.base_url)
    }

    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.base_url)
    }

    /// Realtime websocket endpoint, including the api key and protocol version.
    pub fn realtime_url(&self) -> String {
        let socket_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!(
            "{socket_base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            urlencoding::encode(&self.anon_key)
        )
    }
}
