//! Configuration management for Userscript Fetcher
//!
//! Provides unified configuration with zero-config defaults: a TOML file
//! under the platform config directory, overridable per-run from the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::ClientConfig;
use crate::constants::files;
use crate::errors::{ConfigError, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Registry storage settings
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfigToml {
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Maximum connections per host
    pub pool_max_per_host: usize,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        let defaults = ClientConfig::default();
        Self {
            request_timeout_secs: defaults.request_timeout.as_secs(),
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            pool_max_per_host: defaults.pool_max_per_host,
        }
    }
}

impl ClientConfigToml {
    /// Convert to the runtime client configuration
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            pool_max_per_host: self.pool_max_per_host,
            ..Default::default()
        }
    }
}

/// Registry storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Registry root directory; platform data dir when unset
    pub root: Option<PathBuf>,
}

impl StorageConfig {
    /// The effective registry root
    pub fn effective_root(&self) -> PathBuf {
        if let Some(root) = &self.root {
            return root.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(files::APP_DIR_NAME)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(files::APP_DIR_NAME)
            .join(files::CONFIG_FILE_NAME)
    }

    /// Load configuration from a file, or defaults when it does not exist
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unreadable or malformed file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);

        if !path.exists() {
            debug!("No configuration file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
        let config: AppConfig = toml::from_str(&raw).map_err(ConfigError::InvalidFormat)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration to a file, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| crate::errors::AppError::generic(format!("config serialize: {e}")))?;
        std::fs::write(path, raw).map_err(ConfigError::Io)?;
        Ok(())
    }
}
