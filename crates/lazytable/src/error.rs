#![forbid(unsafe_code)]

//! Top-level error type.
//!
//! Each crate keeps its own typed error; this enum lets an application
//! propagate any of them with `?`.

use std::fmt;

use lazytable_core::{ConfigError, LoadError};
use lazytable_widgets::ConfigLoadError;

/// Any error a lazytable API can return.
#[derive(Debug)]
pub enum Error {
    /// A setting was out of range.
    Config(ConfigError),
    /// A configuration file could not be read or parsed.
    ConfigLoad(ConfigLoadError),
    /// A row load failed outside the cache (e.g. a host calling a loader directly).
    Load(LoadError),
    /// I/O failure.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::ConfigLoad(err) => write!(f, "{err}"),
            Self::Load(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::ConfigLoad(err) => Some(err),
            Self::Load(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<ConfigLoadError> for Error {
    fn from(err: ConfigLoadError) -> Self {
        match err {
            ConfigLoadError::Invalid(err) => Self::Config(err),
            other => Self::ConfigLoad(other),
        }
    }
}

impl From<LoadError> for Error {
    fn from(err: LoadError) -> Self {
        Self::Load(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Standard result type for lazytable APIs.
pub type Result<T> = std::result::Result<T, Error>;
