//! Sync configuration.
//!
//! Settings come from an optional JSON file and are then overridden by
//! `QUIRE_*` environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::editor::EditorSettings;
use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_REMOTE_URL: &str = "QUIRE_REMOTE_URL";
pub const ENV_AUTH_TOKEN: &str = "QUIRE_AUTH_TOKEN";
pub const ENV_OFFLINE: &str = "QUIRE_OFFLINE";

const DEFAULT_DEBOUNCE_MS: u64 = 2500;
const DEFAULT_DRAIN_INTERVAL_SECS: u64 = 30;
const DEFAULT_TITLE_MAX_CHARS: usize = 50;
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Runtime settings for the sync core.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Base URL of the remote document service; `None` runs local-only
    pub remote_url: Option<String>,
    pub auth_token: Option<String>,
    /// Force offline mode even when a remote is configured
    pub offline: bool,
    pub debounce_ms: u64,
    pub drain_interval_secs: u64,
    pub title_max_chars: usize,
    pub remote_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            remote_url: None,
            auth_token: None,
            offline: false,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            drain_interval_secs: DEFAULT_DRAIN_INTERVAL_SECS,
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSettings")
            .field("remote_url", &self.remote_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("offline", &self.offline)
            .field("debounce_ms", &self.debounce_ms)
            .field("drain_interval_secs", &self.drain_interval_secs)
            .field("title_max_chars", &self.title_max_chars)
            .field("remote_timeout_secs", &self.remote_timeout_secs)
            .finish()
    }
}

impl SyncSettings {
    /// Parse settings from a JSON document; absent fields take defaults.
    pub fn from_json(payload: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid settings JSON: {error}")))?;
        settings.validated()
    }

    /// Load settings from `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings file at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let payload = std::fs::read_to_string(path)?;
        Self::from_json(&payload)
    }

    /// Apply `QUIRE_*` overrides from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `QUIRE_*` overrides from an arbitrary lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = normalize_text_option(lookup(ENV_REMOTE_URL)) {
            self.remote_url = Some(url);
        }
        if let Some(token) = normalize_text_option(lookup(ENV_AUTH_TOKEN)) {
            self.auth_token = Some(token);
        }
        if let Some(flag) = normalize_text_option(lookup(ENV_OFFLINE)) {
            self.offline = parse_flag(&flag).ok_or_else(|| {
                Error::Config(format!("{ENV_OFFLINE} must be a boolean, got '{flag}'"))
            })?;
        }
        self.validated()
    }

    fn validated(mut self) -> Result<Self> {
        self.remote_url = match normalize_text_option(self.remote_url.take()) {
            Some(url) if is_http_url(&url) => Some(url.trim_end_matches('/').to_string()),
            Some(url) => {
                return Err(Error::Config(format!(
                    "remote_url must include http:// or https://, got '{url}'"
                )))
            }
            None => None,
        };
        self.auth_token = normalize_text_option(self.auth_token.take());

        if self.debounce_ms == 0 {
            return Err(Error::Config("debounce_ms must be positive".to_string()));
        }
        if self.drain_interval_secs == 0 {
            return Err(Error::Config(
                "drain_interval_secs must be positive".to_string(),
            ));
        }
        if self.title_max_chars == 0 {
            return Err(Error::Config("title_max_chars must be positive".to_string()));
        }
        Ok(self)
    }

    /// Whether remote calls should be attempted at startup.
    pub const fn starts_online(&self) -> bool {
        self.remote_url.is_some() && !self.offline
    }

    pub const fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    pub const fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub const fn editor(&self) -> EditorSettings {
        EditorSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            title_max_chars: self.title_max_chars,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
