use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity of a record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Panic,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Panic,
    ];

    /// Case-insensitive parse. Anything unrecognized maps to `Info`.
    pub fn parse(name: &str) -> LogLevel {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "panic" | "dpanic" | "fatal" => LogLevel::Panic,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Panic => "panic",
        }
    }

    pub fn as_capital_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Panic => "PANIC",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level-enable predicate attached to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    /// Only records of exactly this level.
    Exact(LogLevel),
    /// Records at or above this level.
    AtLeast(LogLevel),
}

impl LevelFilter {
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        match *self {
            LevelFilter::Exact(l) => level == l,
            LevelFilter::AtLeast(min) => level >= min,
        }
    }

    /// The five predicates of separated mode. Panic is the open-ended top bucket.
    pub fn separated() -> [LevelFilter; 5] {
        [
            LevelFilter::Exact(LogLevel::Debug),
            LevelFilter::Exact(LogLevel::Info),
            LevelFilter::Exact(LogLevel::Warn),
            LevelFilter::Exact(LogLevel::Error),
            LevelFilter::AtLeast(LogLevel::Panic),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub ts: DateTime<Local>,
    pub level: LogLevel,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    pub ctx: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, msg: impl Into<String>) -> Self {
        Self {
            ts: Local::now(),
            level,
            msg: msg.into(),
            logger: None,
            caller: None,
            ctx: Map::new(),
            stacktrace: None,
        }
    }
}

/// Shortens a source path to its last two components, e.g. `src/main.rs:12`.
pub fn short_caller(file: &str, line: u32) -> String {
    let normalized = file.replace('\\', "/");
    let mut parts = normalized.rsplitn(3, '/');
    let name = parts.next().unwrap_or_default();
    match parts.next() {
        Some(dir) => format!("{}/{}:{}", dir, name, line),
        None => format!("{}:{}", name, line),
    }
}
