//! # Process-wide logger
//!
//! Holds the current `Logger` behind an `ArcSwap`. It starts out as
//! `Logger::development()`, so the free functions below always have
//! somewhere to write, and `init`/`replace` swap it atomically: a call in
//! flight finishes against whichever logger it loaded.

use arc_swap::ArcSwap;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, LazyLock, Once};

use crate::core::error::LogError;
use crate::loggers::builder::Logger;
use crate::loggers::core::LogLevel;

static CURRENT: LazyLock<ArcSwap<Logger>> = LazyLock::new(|| ArcSwap::from_pointee(Logger::development()));

/// Builds a logger from `config_path` and makes it the current one.
/// On error the current logger is left untouched.
pub fn init(config_path: &str, directory: &str) -> Result<(), LogError> {
    let logger = Logger::create(config_path, directory)?;
    replace(logger);
    Ok(())
}

/// Installs `logger` as the current one and returns the previous logger,
/// already flushed.
pub fn replace(logger: Logger) -> Logger {
    let previous = CURRENT.swap(Arc::new(logger));
    previous.sync();
    Arc::unwrap_or_clone(previous)
}

/// A handle to the current logger.
pub fn current() -> Logger {
    CURRENT.load().as_ref().clone()
}

/// Flushes the current logger.
///
/// The current logger lives in a static and is never dropped, so in
/// high-performance mode buffered debug, info and warn records are lost
/// unless this runs before the process exits. Error-level and above are
/// flushed as they are written.
pub fn sync() {
    CURRENT.load().sync();
}

/// Routes process panics into the current logger at panic level, then
/// hands over to the hook that was installed before. Idempotent.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let mut fields = Map::new();
            if let Some(loc) = info.location() {
                fields.insert("panic_location".into(), Value::String(format!("{}:{}", loc.file(), loc.line())));
            }
            let payload = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            let logger = CURRENT.load();
            logger.log(LogLevel::Panic, format!("panic: {}", payload), fields);
            logger.sync();
            previous(info);
        }));
    });
}

#[track_caller]
pub fn log(level: LogLevel, msg: impl Into<String>, fields: Map<String, Value>) {
    CURRENT.load().log(level, msg, fields);
}

#[track_caller]
pub fn debug(msg: impl fmt::Display) {
    CURRENT.load().debug(msg);
}

#[track_caller]
pub fn info(msg: impl fmt::Display) {
    CURRENT.load().info(msg);
}

#[track_caller]
pub fn warn(msg: impl fmt::Display) {
    CURRENT.load().warn(msg);
}

#[track_caller]
pub fn error(msg: impl fmt::Display) {
    CURRENT.load().error(msg);
}

#[track_caller]
pub fn panic(msg: impl fmt::Display) {
    CURRENT.load().panic(msg);
}

#[track_caller]
pub fn debugf(args: fmt::Arguments<'_>) {
    CURRENT.load().debugf(args);
}

#[track_caller]
pub fn infof(args: fmt::Arguments<'_>) {
    CURRENT.load().infof(args);
}

#[track_caller]
pub fn warnf(args: fmt::Arguments<'_>) {
    CURRENT.load().warnf(args);
}

#[track_caller]
pub fn errorf(args: fmt::Arguments<'_>) {
    CURRENT.load().errorf(args);
}

#[track_caller]
pub fn panicf(args: fmt::Arguments<'_>) {
    CURRENT.load().panicf(args);
}

#[track_caller]
pub fn printf(args: fmt::Arguments<'_>) {
    CURRENT.load().printf(args);
}
