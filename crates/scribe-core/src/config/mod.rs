//! Client configuration.
//!
//! Values are layered: built-in defaults, then the JSON config file, then
//! `SCRIBE_*` environment variables. Command-line flags are applied on top by
//! the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const APP_DIR_NAME: &str = "scribe";
pub const CONFIG_FILE_NAME: &str = "config.json";

pub const ENV_API_URL: &str = "SCRIBE_API_URL";
pub const ENV_API_TOKEN: &str = "SCRIBE_API_TOKEN";
pub const ENV_DB_PATH: &str = "SCRIBE_DB_PATH";
pub const ENV_AUTOSAVE_MS: &str = "SCRIBE_AUTOSAVE_MS";

const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Settings shared by every Scribe client
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the notes API; without it the client works offline only
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    /// Local store file; callers pick a platform default when unset
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

const fn default_autosave_delay_ms() -> u64 {
    DEFAULT_AUTOSAVE_DELAY_MS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            db_path: None,
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("db_path", &self.db_path)
            .field("autosave_delay_ms", &self.autosave_delay_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Location of the config file under a platform config directory
    pub fn file_path(config_dir: &Path) -> PathBuf {
        config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// Parse a config file body
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|error| Error::Config(format!("invalid config file: {error}")))?;
        config.normalized()
    }

    /// Read the config file at `path`; a missing file yields the defaults
    pub fn load_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(error.into()),
        }
    }

    /// Load the file (if any) and apply environment overrides
    pub fn load(config_dir: Option<&Path>) -> Result<Self> {
        let config = match config_dir {
            Some(dir) => Self::load_file(&Self::file_path(dir))?,
            None => Self::default(),
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    /// Apply `SCRIBE_*` overrides read through `lookup`
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.api_base_url = Some(url);
        }
        if let Some(token) = normalize_text_option(lookup(ENV_API_TOKEN)) {
            self.api_token = Some(token);
        }
        if let Some(path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(delay) = normalize_text_option(lookup(ENV_AUTOSAVE_MS)) {
            self.autosave_delay_ms = delay.parse().map_err(|_| {
                Error::Config(format!("{ENV_AUTOSAVE_MS} must be a whole number of milliseconds"))
            })?;
        }
        self.normalized()
    }

    /// Trim values, drop empties and check the API URL
    pub fn normalized(mut self) -> Result<Self> {
        self.api_token = normalize_text_option(self.api_token);
        self.api_base_url = match normalize_text_option(self.api_base_url) {
            Some(url) if is_http_url(&url) => Some(url.trim_end_matches('/').to_string()),
            Some(_) => {
                return Err(Error::Config(
                    "api_base_url must include http:// or https://".to_string(),
                ))
            }
            None => None,
        };
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }

    pub const fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether a notes API is configured
    pub const fn has_server(&self) -> bool {
        self.api_base_url.is_some()
    }
}
