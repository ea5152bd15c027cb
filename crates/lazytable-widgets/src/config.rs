#![forbid(unsafe_code)]

//! Host-facing caching configuration.
//!
//! [`TableConfig`] gathers every tunable of a caching table so it can come
//! from code, the environment, or (with the `config` feature) a TOML or JSON
//! file.
//!
//! ```toml
//! # lazytable.toml
//! cache_threshold = 1.5
//! loading_delay_ms = 250
//! load_workers = 2
//! ```
//!
//! ```rust,ignore
//! let config = TableConfig::from_toml_file("lazytable.toml")?;
//! let table = CachingTable::with_config(source, IdentityMap, &config)?;
//! ```
//!
//! Parsing never validates; call [`TableConfig::validate`] (or let
//! `CachingTable::with_config` do it) before use.

use std::fmt;
#[cfg(feature = "config")]
use std::path::Path;
use std::time::Duration;

use lazytable_core::ConfigError;
#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::cache_range::{CacheThreshold, DEFAULT_CACHE_THRESHOLD};
use crate::defer_loading::DEFAULT_LOADING_DELAY_MS;

/// Default number of loader threads.
pub const DEFAULT_LOAD_WORKERS: usize = 4;

/// Tunables of a caching table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct TableConfig {
    /// Margin multiplier around the visible rows; `inf` caches every row.
    pub cache_threshold: f32,

    /// Settle delay for deferred loading in milliseconds; `0` disables it.
    pub loading_delay_ms: i64,

    /// Loader threads.
    pub load_workers: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            cache_threshold: DEFAULT_CACHE_THRESHOLD,
            loading_delay_ms: DEFAULT_LOADING_DELAY_MS as i64,
            load_workers: DEFAULT_LOAD_WORKERS,
        }
    }
}

impl TableConfig {
    /// Set the cache threshold.
    #[must_use]
    pub fn with_cache_threshold(mut self, threshold: f32) -> Self {
        self.cache_threshold = threshold;
        self
    }

    /// Set the loading delay in milliseconds.
    #[must_use]
    pub fn with_loading_delay_ms(mut self, ms: i64) -> Self {
        self.loading_delay_ms = ms;
        self
    }

    /// Set the loader thread count.
    #[must_use]
    pub fn with_load_workers(mut self, workers: usize) -> Self {
        self.load_workers = workers;
        self
    }

    /// Read overrides from the environment.
    ///
    /// Reads:
    /// - `LAZYTABLE_CACHE_THRESHOLD`: float, `inf` allowed
    /// - `LAZYTABLE_LOADING_DELAY_MS`: signed milliseconds
    /// - `LAZYTABLE_LOAD_WORKERS`: thread count
    ///
    /// Unparsable values are ignored. Out-of-range values are kept and
    /// reported by [`validate`](Self::validate).
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("LAZYTABLE_CACHE_THRESHOLD")
            && let Ok(threshold) = val.trim().parse::<f32>()
        {
            config.cache_threshold = threshold;
        }

        if let Some(val) = lookup("LAZYTABLE_LOADING_DELAY_MS")
            && let Ok(ms) = val.trim().parse::<i64>()
        {
            config.loading_delay_ms = ms;
        }

        if let Some(val) = lookup("LAZYTABLE_LOAD_WORKERS")
            && let Ok(workers) = val.trim().parse::<usize>()
        {
            config.load_workers = workers;
        }

        config
    }

    /// Check every field; the first problem found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.threshold()?;
        self.loading_delay()?;
        if self.load_workers == 0 {
            return Err(ConfigError::ZeroLoadWorkers);
        }
        Ok(())
    }

    /// Validated cache threshold.
    pub fn threshold(&self) -> Result<CacheThreshold, ConfigError> {
        CacheThreshold::new(self.cache_threshold)
    }

    /// Validated loading delay.
    pub fn loading_delay(&self) -> Result<Duration, ConfigError> {
        loading_delay_from_ms(self.loading_delay_ms)
    }

    /// Load from a TOML string and validate it.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigLoadError> {
        let config: Self = toml::from_str(s).map_err(ConfigLoadError::Toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigLoadError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string and validate it.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigLoadError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigLoadError::Json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigLoadError::Io)?;
        Self::from_json_str(&content)
    }
}

/// Convert signed milliseconds into a delay, rejecting negatives.
pub fn loading_delay_from_ms(ms: i64) -> Result<Duration, ConfigError> {
    u64::try_from(ms)
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::NegativeLoadingDelay(ms))
}

/// Errors that can occur when loading a [`TableConfig`].
#[derive(Debug)]
pub enum ConfigLoadError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    Json(serde_json::Error),
    /// Parsed, but out of range.
    Invalid(ConfigError),
}

impl fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Invalid(e) => write!(f, "invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Json(e) => Some(e),
            Self::Invalid(e) => Some(e),
        }
    }
}

impl From<ConfigError> for ConfigLoadError {
    fn from(err: ConfigError) -> Self {
        Self::Invalid(err)
    }
}

impl From<std::io::Error> for ConfigLoadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
