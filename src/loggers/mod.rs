// src/loggers/mod.rs

pub mod builder;
pub mod core;
pub mod encoder;
pub mod global;
pub mod identity;
pub mod rotation;
pub mod sink;
pub mod worker;

pub use builder::{Logger, LoggerBuilder};
pub use self::core::{LevelFilter, LogLevel, LogRecord};
pub use global::{current, init, install_panic_hook, replace, sync};

use std::io::Write;

/// Side channel for failures inside the logging path itself. Best effort:
/// if stderr is gone too, the message is dropped.
pub(crate) fn report_internal(msg: &str) {
    let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let _ = writeln!(std::io::stderr().lock(), "[{}] rs_log_ng: {}", ts, msg);
}

#[macro_export]
macro_rules! log_base {
    // No kv pairs
    ($logger:expr, $level:expr, $msg:expr) => {
        $crate::log_base!($logger, $level, $msg, );
    };
    // With kv pairs (zero or more)
    ($logger:expr, $level:expr, $msg:expr, $( $k:expr => $v:expr ),* $(,)? ) => {
        {
            let logger = &$logger;
            if logger.enabled($level) {
                #[allow(unused_mut)]
                let mut ctx = serde_json::Map::new();
                $(
                    // Unserializable values are logged as null
                    ctx.insert($k.to_string(), serde_json::to_value($v).unwrap_or(serde_json::Value::Null));
                )*
                logger.log($level, $msg.to_string(), ctx);
            }
        }
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $msg:expr $(, $k:expr => $v:expr )* $(,)? ) => {
        $crate::log_base!($logger, $crate::loggers::core::LogLevel::Debug, $msg $(, $k => $v )* )
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $msg:expr $(, $k:expr => $v:expr )* $(,)? ) => {
        $crate::log_base!($logger, $crate::loggers::core::LogLevel::Info, $msg $(, $k => $v )* )
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $msg:expr $(, $k:expr => $v:expr )* $(,)? ) => {
        $crate::log_base!($logger, $crate::loggers::core::LogLevel::Warn, $msg $(, $k => $v )* )
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $msg:expr $(, $k:expr => $v:expr )* $(,)? ) => {
        $crate::log_base!($logger, $crate::loggers::core::LogLevel::Error, $msg $(, $k => $v )* )
    };
}

#[macro_export]
macro_rules! panic_log {
    ($logger:expr, $msg:expr $(, $k:expr => $v:expr )* $(,)? ) => {
        $crate::log_base!($logger, $crate::loggers::core::LogLevel::Panic, $msg $(, $k => $v )* )
    };
}
