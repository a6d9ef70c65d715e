//! # Core Error Module
//!
//! This module defines the central `LogError` type used throughout the library.
//! Only construction-time failures surface through it; a logging call itself
//! never returns an error.

use std::io;
use thiserror::Error;

/// Central error type for the `rs_log_ng` library.
#[derive(Debug, Error)]
pub enum LogError {
    /// Error related to configuration loading or parsing.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The log root directory could not be created.
    #[error("failed to create log directory {path}: {source}")]
    DirectoryError {
        /// The effective log root (`path` + `directory`).
        path: String,
        /// The underlying filesystem failure.
        #[source]
        source: io::Error,
    },

    /// A log file could not be opened while assembling the sinks.
    #[error("failed to open log file {path}: {source}")]
    FileError {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl LogError {
    /// True for errors caused by the configuration document itself.
    pub fn is_config(&self) -> bool {
        matches!(self, LogError::ConfigError(_))
    }
}
