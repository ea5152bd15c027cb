#![forbid(unsafe_code)]

//! Error types shared across lazytable crates.
//!
//! Configuration errors are raised synchronously by setters and leave the
//! previous state untouched. Load errors never reach the caller: the cache
//! store converts them into error rows built from the source's fallback
//! values.

use std::fmt;

/// Invalid caching configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Cache threshold below zero.
    NegativeThreshold(f32),
    /// Cache threshold is NaN.
    NanThreshold,
    /// Loading delay below zero (milliseconds).
    NegativeLoadingDelay(i64),
    /// A worker pool needs at least one thread.
    ZeroLoadWorkers,
}

/// Failure of an asynchronous row load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The loader returned an error.
    Failed { row: usize, message: String },
    /// The loader panicked; the panic was contained on the worker.
    Panicked { row: usize, message: String },
}

impl LoadError {
    /// Convenience constructor for loaders.
    pub fn failed(row: usize, message: impl Into<String>) -> Self {
        Self::Failed {
            row,
            message: message.into(),
        }
    }

    /// Row the failed load was issued for.
    pub fn row(&self) -> usize {
        match self {
            Self::Failed { row, .. } | Self::Panicked { row, .. } => *row,
        }
    }

    /// Error type label for tracing fields.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "failed",
            Self::Panicked { .. } => "panicked",
        }
    }
}

// ── Display ─────────────────────────────────────────────────────────────

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeThreshold(value) => {
                write!(f, "cache threshold must be >= 0, got {value}")
            }
            Self::NanThreshold => write!(f, "cache threshold must not be NaN"),
            Self::NegativeLoadingDelay(ms) => {
                write!(f, "loading delay must be >= 0 ms, got {ms}")
            }
            Self::ZeroLoadWorkers => write!(f, "load worker count must be at least 1"),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { row, message } => write!(f, "load of row {row} failed: {message}"),
            Self::Panicked { row, message } => {
                write!(f, "loader for row {row} panicked: {message}")
            }
        }
    }
}

// ── std::error::Error ───────────────────────────────────────────────────

impl std::error::Error for ConfigError {}
impl std::error::Error for LoadError {}

// ── Tests ───────────────────────────────────────────────────────────────
