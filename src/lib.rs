//! # rs_log_ng
//!
//! Configurable structured logging: a declarative config selects the
//! encoder, the log files, the rotation policy, and how levels are routed
//! to files. Use the free functions for the process-wide logger, or build
//! independent `Logger` instances.

pub mod core;
pub mod configs;
pub mod loggers;

pub use crate::configs::LogConfig;
pub use crate::core::error::LogError;
pub use crate::loggers::global::{
    debug, debugf, error, errorf, info, infof, log, panic, panicf, printf, warn, warnf,
};
pub use crate::loggers::{LogLevel, Logger, LoggerBuilder, current, init, install_panic_hook, replace, sync};

/// Builds an independent logger without touching the process-wide one.
pub fn create(config_path: &str, directory: &str) -> Result<Logger, LogError> {
    Logger::create(config_path, directory)
}
