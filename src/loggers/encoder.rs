//! # Record Encoder
//!
//! Turns a `LogRecord` into one newline-terminated line, either as a JSON
//! object or as a human-readable console line.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::loggers::core::{LogLevel, LogRecord};

pub const MESSAGE_KEY: &str = "message";
pub const LEVEL_KEY: &str = "level";
pub const TIME_KEY: &str = "time";
pub const NAME_KEY: &str = "logger";
pub const CALLER_KEY: &str = "caller";
pub const DEFAULT_STACKTRACE_KEY: &str = "stacktrace";
/// Prepended to a structured field whose name clashes with a fixed key.
pub const FIELD_PREFIX: &str = "fields.";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    Json,
    Console,
}

impl EncoderKind {
    /// Unrecognized names fall back to `Console`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => EncoderKind::Json,
            _ => EncoderKind::Console,
        }
    }
}

/// How the level is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelStyle {
    Lowercase,
    LowercaseColor,
    Capital,
    CapitalColor,
}

impl LevelStyle {
    /// Unrecognized names fall back to `Lowercase`.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "LowercaseColor" => LevelStyle::LowercaseColor,
            "Capital" => LevelStyle::Capital,
            "CapitalColor" => LevelStyle::CapitalColor,
            _ => LevelStyle::Lowercase,
        }
    }

    pub fn render(&self, level: LogLevel) -> String {
        match self {
            LevelStyle::Lowercase => level.as_str().to_string(),
            LevelStyle::Capital => level.as_capital_str().to_string(),
            LevelStyle::LowercaseColor => colorize(level, level.as_str()),
            LevelStyle::CapitalColor => colorize(level, level.as_capital_str()),
        }
    }
}

fn colorize(level: LogLevel, text: &str) -> String {
    let code = match level {
        LogLevel::Debug => 35,
        LogLevel::Info => 34,
        LogLevel::Warn => 33,
        LogLevel::Error | LogLevel::Panic => 31,
    };
    format!("\x1b[{}m{}\x1b[0m", code, text)
}

#[derive(Debug, Clone)]
pub struct Encoder {
    kind: EncoderKind,
    style: LevelStyle,
    stacktrace_key: String,
}

impl Encoder {
    pub fn new(kind: EncoderKind, style: LevelStyle, stacktrace_key: &str) -> Self {
        let stacktrace_key = if stacktrace_key.is_empty() {
            DEFAULT_STACKTRACE_KEY.to_string()
        } else {
            stacktrace_key.to_string()
        };
        Self { kind, style, stacktrace_key }
    }

    pub fn kind(&self) -> EncoderKind {
        self.kind
    }

    pub fn encode(&self, record: &LogRecord) -> Vec<u8> {
        let mut line = match self.kind {
            EncoderKind::Json => self.encode_json(record),
            EncoderKind::Console => self.encode_console(record),
        };
        line.push('\n');
        line.into_bytes()
    }

    fn is_reserved(&self, key: &str) -> bool {
        [LEVEL_KEY, TIME_KEY, NAME_KEY, CALLER_KEY, MESSAGE_KEY].contains(&key) || key == self.stacktrace_key
    }

    fn timestamp(record: &LogRecord) -> String {
        format!("[{}]", record.ts.format(TIME_FORMAT))
    }

    fn encode_json(&self, record: &LogRecord) -> String {
        let mut obj = Map::new();
        obj.insert(LEVEL_KEY.into(), Value::String(self.style.render(record.level)));
        obj.insert(TIME_KEY.into(), Value::String(Self::timestamp(record)));
        if let Some(name) = &record.logger {
            obj.insert(NAME_KEY.into(), Value::String(name.clone()));
        }
        if let Some(caller) = &record.caller {
            obj.insert(CALLER_KEY.into(), Value::String(caller.clone()));
        }
        obj.insert(MESSAGE_KEY.into(), Value::String(record.msg.clone()));
        for (k, v) in &record.ctx {
            let key = if self.is_reserved(k) { format!("{}{}", FIELD_PREFIX, k) } else { k.clone() };
            obj.insert(key, v.clone());
        }
        if let Some(trace) = &record.stacktrace {
            obj.insert(self.stacktrace_key.clone(), Value::String(trace.clone()));
        }
        Value::Object(obj).to_string()
    }

    fn encode_console(&self, record: &LogRecord) -> String {
        let mut parts = vec![Self::timestamp(record), self.style.render(record.level)];
        if let Some(name) = &record.logger {
            parts.push(name.clone());
        }
        if let Some(caller) = &record.caller {
            parts.push(caller.clone());
        }
        parts.push(record.msg.clone());
        if !record.ctx.is_empty() {
            parts.push(Value::Object(record.ctx.clone()).to_string());
        }

        let mut line = parts.join(" ");
        if let Some(trace) = &record.stacktrace {
            line.push('\n');
            line.push_str(trace.trim_end());
        }
        line
    }
}
