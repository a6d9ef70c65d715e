use figment::{Figment, providers::{Env, Format, Json, Toml, Yaml}};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::LogError;
use crate::loggers::core::LogLevel;
use crate::loggers::encoder::{DEFAULT_STACKTRACE_KEY, EncoderKind, LevelStyle};
use crate::loggers::rotation::RotationPolicy;

/// Environment overrides, e.g. `RSLOG_LOG_LEVEL=debug` or `RSLOG_SEGMENT__MAX_SIZE=50`.
pub const ENV_PREFIX: &str = "RSLOG_";

/// Declarative logger configuration.
///
/// Every key is optional. A document written before an option existed
/// still loads and keeps its old behaviour; unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `json` or `console`; anything else is treated as `console`.
    pub encoder: String,
    pub path: String,
    pub directory: String,
    pub show_line: bool,
    #[serde(alias = "show_context_id")]
    pub show_goroutine: bool,
    /// `Lowercase`, `LowercaseColor`, `Capital` or `CapitalColor`.
    pub encode_level: String,
    pub stacktrace_key: String,
    pub log_stdout: bool,
    pub high_performance: bool,
    /// Unset means `true`; only an explicit `false` selects unified mode.
    pub separate_levels: Option<bool>,
    pub log_level: String,
    pub segment: Segment,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            encoder: "console".into(),
            path: String::new(),
            directory: String::new(),
            show_line: false,
            show_goroutine: false,
            encode_level: "Lowercase".into(),
            stacktrace_key: DEFAULT_STACKTRACE_KEY.into(),
            log_stdout: false,
            high_performance: false,
            separate_levels: None,
            log_level: "info".into(),
            segment: Segment::default(),
        }
    }
}

/// Rotation parameters as they appear in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Segment {
    /// Megabytes before rollover.
    pub max_size: u64,
    /// Days to keep backups.
    pub max_age: u64,
    pub max_backups: usize,
    pub compress: bool,
}

impl Segment {
    pub fn policy(&self) -> RotationPolicy {
        RotationPolicy {
            max_size_mb: self.max_size,
            max_age_days: self.max_age,
            max_backups: self.max_backups,
            compress: self.compress,
        }
    }
}

impl LogConfig {
    /// Reads the file at `config_path` (format picked from its extension),
    /// applies `RSLOG_` environment overrides, then replaces `directory`
    /// with the caller's value.
    pub fn load(config_path: &str, directory: &str) -> Result<Self, LogError> {
        let mut cfg = Self::from_file(config_path)?;
        cfg.directory = directory.to_string();
        Ok(cfg)
    }

    /// Like `load` but keeps the `directory` written in the document.
    pub fn from_file(config_path: &str) -> Result<Self, LogError> {
        let path = Path::new(config_path);
        if !path.is_file() {
            return Err(LogError::ConfigError(format!("config file not found: {}", config_path)));
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let figment = match ext.as_str() {
            "json" => Figment::new().merge(Json::file(path)),
            "toml" => Figment::new().merge(Toml::file(path)),
            _ => Figment::new().merge(Yaml::file(path)),
        };

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| LogError::ConfigError(format!("failed to parse config file {}: {}", config_path, e)))
    }

    /// Parses a YAML document held in memory.
    pub fn from_yaml_str(doc: &str) -> Result<Self, LogError> {
        Figment::new()
            .merge(Yaml::string(doc))
            .extract()
            .map_err(|e| LogError::ConfigError(e.to_string()))
    }

    /// `path` followed directly by `directory`: the directory every log file lives in.
    pub fn log_root(&self) -> String {
        format!("{}{}", self.path, self.directory)
    }

    pub fn encoder_kind(&self) -> EncoderKind {
        EncoderKind::from_name(&self.encoder)
    }

    pub fn level_style(&self) -> LevelStyle {
        LevelStyle::from_name(&self.encode_level)
    }

    pub fn min_level(&self) -> LogLevel {
        LogLevel::parse(&self.log_level)
    }

    pub fn separate_levels(&self) -> bool {
        self.separate_levels.unwrap_or(true)
    }

    /// One `app.log` gated by `log_level`. High-performance always takes it.
    pub fn is_unified(&self) -> bool {
        self.high_performance || !self.separate_levels()
    }

    pub fn stacktrace_key(&self) -> String {
        if self.stacktrace_key.is_empty() {
            DEFAULT_STACKTRACE_KEY.to_string()
        } else {
            self.stacktrace_key.clone()
        }
    }
}
