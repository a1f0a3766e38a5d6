//! Configuration management

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Development backend used when no base URL is configured
pub const DEV_API_URL: &str = "http://localhost:5000";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before extraction.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Backend API settings
    pub api: ApiConfig,
    /// Code exchange and redirect settings
    pub auth: AuthConfig,
    /// Credential storage settings
    pub storage: StorageConfig,
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Explicit backend base URL
    pub base_url: Option<String>,
    /// Fall back to the local development backend instead of the page origin
    pub dev_mode: bool,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Maximum redirects followed per request
    pub redirect_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            dev_mode: false,
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
        }
    }
}

impl ApiConfig {
    /// Resolve the backend base URL: explicit value, then the development
    /// backend in dev mode, then the page's own origin.
    pub fn resolve_base_url(&self, page: &Url) -> Result<Url> {
        if let Some(base) = self.base_url.as_deref().filter(|s| !s.is_empty()) {
            return Url::parse(base)
                .map_err(|e| Error::Config(format!("Invalid api.base_url '{base}': {e}")));
        }

        if self.dev_mode {
            return Ok(Url::parse(DEV_API_URL)?);
        }

        let origin = page.origin();
        if !origin.is_tuple() {
            return Err(Error::Config(format!(
                "Page URL {page} has no usable origin; set api.base_url"
            )));
        }
        Ok(Url::parse(&origin.ascii_serialization())?)
    }
}

/// Code exchange and redirect settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Upper bound for the code exchange call
    #[serde(with = "humantime_serde")]
    pub exchange_timeout: Duration,
    /// Pause before redirecting after a failed exchange
    #[serde(with = "humantime_serde")]
    pub failure_redirect_delay: Duration,
    /// Unauthenticated entry point path
    pub entry_point: String,
    /// Query parameter carrying the authorization code
    pub code_param: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            exchange_timeout: Duration::from_secs(10),
            failure_redirect_delay: Duration::from_millis(500),
            entry_point: "/".to_string(),
            code_param: "code".to_string(),
        }
    }
}

/// Credential storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for credential files (default: `~/.guardian-client`)
    pub directory: Option<String>,
    /// Slot name for the credential
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: None,
            key: "authToken".to_string(),
        }
    }
}

impl StorageConfig {
    /// Storage directory with ~ expanded
    pub fn resolve_directory(&self) -> Result<PathBuf> {
        match self.directory.as_deref() {
            Some(dir) => Ok(PathBuf::from(expand_home(dir))),
            None => dirs::home_dir()
                .map(|home| home.join(".guardian-client"))
                .ok_or_else(|| Error::Config("Cannot determine home directory".to_string())),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or holds invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Env files may feed the GUARDIAN_ variables merged below
        let preliminary: Self = figment
            .clone()
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        preliminary.load_env_files();

        figment = figment.merge(Env::prefixed("GUARDIAN_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Reject values the client cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.auth.entry_point.starts_with('/') {
            return Err(Error::Config(format!(
                "auth.entry_point must be an absolute path, got '{}'",
                self.auth.entry_point
            )));
        }
        if self.auth.code_param.is_empty() {
            return Err(Error::Config("auth.code_param must not be empty".to_string()));
        }
        if self.auth.exchange_timeout.is_zero() {
            return Err(Error::Config("auth.exchange_timeout must be positive".to_string()));
        }
        if self.storage.key.is_empty() {
            return Err(Error::Config("storage.key must not be empty".to_string()));
        }
        Ok(())
    }

    /// Load environment files into the process environment.
    /// Files that don't exist are skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = expand_home(path_str);
            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                    Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }
}

fn expand_home(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.display().to_string(), 1);
        }
    }
    path.to_string()
}

/// Humantime-style serde for Duration ("30s", "5m", "500ms")
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize as whole seconds, or milliseconds when sub-second precision matters
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize "30s", "5m", "100ms", or bare seconds
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();

        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            let mins = mins.parse::<u64>().map_err(serde::de::Error::custom)?;
            mins.checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| serde::de::Error::custom(format!("duration too large: {s}")))
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
