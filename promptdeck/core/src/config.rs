//! Client Configuration
//!
//! Where the batching server lives and how long to wait for it, loaded from a
//! TOML file at `~/.config/promptdeck/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Environment Variables
//!
//! - `PROMPTDECK_API_URL` - server base URL
//! - `PROMPTDECK_CONNECT_TIMEOUT_MS` - TCP connect timeout
//! - `PROMPTDECK_REQUEST_TIMEOUT_SECS` - whole-request timeout (0 = none)
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8000"
//! connect_timeout_ms = 5000
//! request_timeout_secs = 120
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server address used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

const ENV_API_URL: &str = "PROMPTDECK_API_URL";
const ENV_CONNECT_TIMEOUT_MS: &str = "PROMPTDECK_CONNECT_TIMEOUT_MS";
const ENV_REQUEST_TIMEOUT_SECS: &str = "PROMPTDECK_REQUEST_TIMEOUT_SECS";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Where the effective configuration last came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Command-line argument
    Cli,
    /// Environment variable
    Env,
    /// TOML configuration file
    File,
    /// Built-in default
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Structures
// =============================================================================

/// `[api]` section of the TOML file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Server base URL
    pub base_url: Option<String>,

    /// Connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Whole-request timeout in seconds (0 = no timeout)
    pub request_timeout_secs: Option<u64>,
}

/// Root of the TOML file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Server connection settings
    pub api: ApiToml,
}

// =============================================================================
// Effective Configuration
// =============================================================================

/// Resolved client configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server base URL, without a trailing slash
    pub base_url: String,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Whole-request timeout; `None` lets long streams run indefinitely
    pub request_timeout: Option<Duration>,

    /// File the configuration was read from, if any
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Defaults pointed at `base_url`
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Where the configuration last came from
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check the base URL and normalise it
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the base URL is not an
    /// absolute `http` or `https` URL.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let trimmed = self.base_url.trim().trim_end_matches('/').to_string();
        let url = reqwest::Url::parse(&trimmed).map_err(|e| {
            ConfigError::ValidationError(format!("base_url '{}': {e}", self.base_url))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "base_url '{}' must use http or https",
                self.base_url
            )));
        }

        self.base_url = trimmed;
        Ok(())
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Default configuration file path (`$XDG_CONFIG_HOME/promptdeck/config.toml`)
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("promptdeck").join("config.toml"))
}

/// Load configuration from the default path and the process environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// resulting base URL is invalid. A missing file is not an error.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path and the process environment
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the resulting
/// base URL is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration, reading environment variables through `env`
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    if let Some(ref url) = toml.api.base_url {
        config.base_url.clone_from(url);
    }
    if let Some(ms) = toml.api.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(secs) = toml.api.request_timeout_secs {
        config.request_timeout = request_timeout_from_secs(secs);
    }
}

fn apply_env_config(config: &mut ClientConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(url) = env(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
        config.base_url = url;
        config.source = ConfigSource::Env;
    }

    if let Some(raw) = env(ENV_CONNECT_TIMEOUT_MS) {
        match raw.parse::<u64>() {
            Ok(ms) => {
                config.connect_timeout = Duration::from_millis(ms);
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(var = ENV_CONNECT_TIMEOUT_MS, value = %raw, "Ignoring unparsable value"),
        }
    }

    if let Some(raw) = env(ENV_REQUEST_TIMEOUT_SECS) {
        match raw.parse::<u64>() {
            Ok(secs) => {
                config.request_timeout = request_timeout_from_secs(secs);
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(var = ENV_REQUEST_TIMEOUT_SECS, value = %raw, "Ignoring unparsable value"),
        }
    }
}

fn request_timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line overrides, applied after [`load_config`]
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,

    /// Request timeout override (seconds, 0 = none)
    pub request_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Create an empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set request timeout override
    #[must_use]
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    /// Apply overrides and re-validate
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the overridden base URL is
    /// invalid.
    pub fn apply(&self, config: &mut ClientConfig) -> Result<(), ConfigError> {
        if self.base_url.is_some() || self.request_timeout_secs.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.base_url.clone_from(url);
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = request_timeout_from_secs(secs);
        }

        config.validate()
    }
}
