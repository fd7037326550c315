//! Registry configuration.
//!
//! Resolution order: built-in defaults, then `ppn-registry.toml` (or an
//! explicit file), then the `PPN_REGISTRY_STORE` environment variable.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::OutcomePolicy;
use crate::query::RecordFilter;
use crate::store::RecordStore;

/// Application-level constants
pub const APP_NAME: &str = "PPN Registry";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "ppn-registry.toml";
/// Backing store used when nothing else is configured
pub const DEFAULT_STORE_FILE: &str = "seed_data.csv";
/// Environment variable overriding the store path
pub const STORE_ENV_VAR: &str = "PPN_REGISTRY_STORE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// CSV backing store; relative paths resolve against the config file's directory
    pub store_path: PathBuf,
    /// Default minimum outcome rating for queries
    pub min_rating: i64,
    /// Treatment of unrated (0) outcomes in averages
    pub outcome_policy: OutcomePolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            min_rating: 1,
            outcome_policy: OutcomePolicy::default(),
        }
    }
}

impl RegistryConfig {
    /// Read a config file. Missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: RegistryConfig =
            toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if config.store_path.is_relative() {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                config.store_path = dir.join(&config.store_path);
            }
        }
        Ok(config)
    }

    /// Resolve the effective config.
    ///
    /// An explicit path must exist; otherwise [`DEFAULT_CONFIG_FILE`] is used
    /// if present. The environment override is applied last.
    pub fn discover(explicit: Option<&Path>) -> ConfigResult<Self> {
        let config = match explicit {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::load(DEFAULT_CONFIG_FILE)?,
            None => Self::default(),
        };
        Ok(config.with_store_override(std::env::var_os(STORE_ENV_VAR)))
    }

    /// Replace the store path when `value` is set and non-empty.
    pub fn with_store_override(mut self, value: Option<OsString>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.store_path = PathBuf::from(value);
        }
        self
    }

    /// Filter with no category restriction and the configured minimum rating.
    pub fn default_filter(&self) -> RecordFilter {
        RecordFilter::new().min_rating(self.min_rating)
    }

    pub fn open_store(&self) -> RecordStore {
        RecordStore::open(&self.store_path)
    }
}
