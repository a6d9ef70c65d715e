use serde_json::{Map, Value};
use std::fmt;
use std::io;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::configs::LogConfig;
use crate::core::error::LogError;
use crate::loggers::core::{LevelFilter, LogLevel, LogRecord, short_caller};
use crate::loggers::encoder::{DEFAULT_STACKTRACE_KEY, Encoder, EncoderKind, LevelStyle};
use crate::loggers::identity::{ContextProbe, IDENTITY_KEY, IdentityResolver};
use crate::loggers::sink::{LogWriter, Sink, SinkSet, StderrWriter, build_sinks};

struct LoggerCore {
    name: Option<String>,
    sinks: SinkSet,
    min_level: LogLevel,
    show_caller: bool,
    capture_stacktrace: bool,
    identity: Option<IdentityResolver>,
    write_errors: AtomicU64,
}

/// A configured logger. Cloning is cheap; all clones share the same sinks.
///
/// A logger never changes after construction. To reconfigure, build a new
/// one and swap it in with `loggers::replace`.
#[derive(Clone)]
pub struct Logger {
    core: Arc<LoggerCore>,
}

pub struct LoggerBuilder {
    config: LogConfig,
    name: Option<String>,
    probe: Option<Arc<dyn ContextProbe>>,
}

impl LoggerBuilder {
    pub fn new(config: LogConfig) -> Self {
        Self { config, name: None, probe: None }
    }

    /// Adds a `logger` field to every record.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Replaces the default thread-based identity probe.
    pub fn with_probe(mut self, probe: Arc<dyn ContextProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn build(self) -> Result<Logger, LogError> {
        let cfg = self.config;
        let sinks = build_sinks(&cfg)?;
        let identity = cfg.show_goroutine.then(|| match self.probe {
            Some(probe) => IdentityResolver::new(probe),
            None => IdentityResolver::default(),
        });

        // Separated mode keeps one exact-level sink per file, so nothing is
        // gated ahead of them.
        let min_level = if cfg.is_unified() { cfg.min_level() } else { LogLevel::Debug };
        let core = LoggerCore {
            name: self.name,
            sinks,
            min_level,
            show_caller: cfg.show_line && !cfg.high_performance,
            capture_stacktrace: !cfg.high_performance,
            identity,
            write_errors: AtomicU64::new(0),
        };
        Ok(Logger { core: Arc::new(core) })
    }
}

impl Logger {
    /// Loads the configuration at `config_path`, places logs under its
    /// `path` followed by `directory`, and builds an independent logger.
    pub fn create(config_path: &str, directory: &str) -> Result<Logger, LogError> {
        let cfg = LogConfig::load(config_path, directory)?;
        LoggerBuilder::new(cfg).build()
    }

    /// Infallible console logger on stderr: capitalized colored levels,
    /// everything from debug up, call sites included.
    pub fn development() -> Logger {
        let encoder = Arc::new(Encoder::new(
            EncoderKind::Console,
            LevelStyle::CapitalColor,
            DEFAULT_STACKTRACE_KEY,
        ));
        let outputs: Vec<Arc<dyn LogWriter>> = vec![Arc::new(StderrWriter)];
        let sink = Sink::new(LevelFilter::AtLeast(LogLevel::Debug), encoder, outputs);
        let core = LoggerCore {
            name: None,
            sinks: SinkSet { sinks: vec![sink], failure: None },
            min_level: LogLevel::Debug,
            show_caller: true,
            capture_stacktrace: true,
            identity: None,
            write_errors: AtomicU64::new(0),
        };
        Logger { core: Arc::new(core) }
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.core.min_level
    }

    pub fn min_level(&self) -> LogLevel {
        self.core.min_level
    }

    pub fn shows_identity(&self) -> bool {
        self.core.identity.is_some()
    }

    /// Number of records that could not be fully written.
    pub fn write_errors(&self) -> u64 {
        self.core.write_errors.load(Ordering::Relaxed)
    }

    /// Flushes every output. Errors are counted, not returned.
    pub fn sync(&self) {
        if let Err(e) = self.core.sinks.flush() {
            self.note_write_error(&e);
        }
    }

    /// Structured entry point used by the macros and the per-level calls.
    #[track_caller]
    pub fn log(&self, level: LogLevel, msg: impl Into<String>, fields: Map<String, Value>) {
        if !self.enabled(level) {
            return;
        }
        let location = Location::caller();
        let mut record = LogRecord::new(level, msg);
        record.logger = self.core.name.clone();
        if self.core.show_caller {
            record.caller = Some(short_caller(location.file(), location.line()));
        }
        if let Some(identity) = &self.core.identity {
            record.ctx.insert(IDENTITY_KEY.to_string(), Value::String(identity.resolve_id()));
        }
        record.ctx.extend(fields);
        if level >= LogLevel::Panic && self.core.capture_stacktrace {
            record.stacktrace = Some(std::backtrace::Backtrace::force_capture().to_string());
        }

        if let Err(e) = self.core.sinks.dispatch(&record) {
            self.note_write_error(&e);
        }
    }

    fn note_write_error(&self, err: &io::Error) {
        self.core.write_errors.fetch_add(1, Ordering::Relaxed);
        crate::loggers::report_internal(&format!("log write error: {}", err));
    }

    #[track_caller]
    pub fn debug(&self, msg: impl fmt::Display) {
        self.log_plain(LogLevel::Debug, msg);
    }

    #[track_caller]
    pub fn info(&self, msg: impl fmt::Display) {
        self.log_plain(LogLevel::Info, msg);
    }

    #[track_caller]
    pub fn warn(&self, msg: impl fmt::Display) {
        self.log_plain(LogLevel::Warn, msg);
    }

    #[track_caller]
    pub fn error(&self, msg: impl fmt::Display) {
        self.log_plain(LogLevel::Error, msg);
    }

    /// Logs at panic level. The record also lands in the failure stream;
    /// the caller does not unwind.
    #[track_caller]
    pub fn panic(&self, msg: impl fmt::Display) {
        self.log_plain(LogLevel::Panic, msg);
    }

    #[track_caller]
    pub fn debugf(&self, args: fmt::Arguments<'_>) {
        self.log_plain(LogLevel::Debug, args);
    }

    #[track_caller]
    pub fn infof(&self, args: fmt::Arguments<'_>) {
        self.log_plain(LogLevel::Info, args);
    }

    #[track_caller]
    pub fn warnf(&self, args: fmt::Arguments<'_>) {
        self.log_plain(LogLevel::Warn, args);
    }

    #[track_caller]
    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.log_plain(LogLevel::Error, args);
    }

    #[track_caller]
    pub fn panicf(&self, args: fmt::Arguments<'_>) {
        self.log_plain(LogLevel::Panic, args);
    }

    /// Same as `infof`.
    #[track_caller]
    pub fn printf(&self, args: fmt::Arguments<'_>) {
        self.log_plain(LogLevel::Info, args);
    }

    #[track_caller]
    fn log_plain(&self, level: LogLevel, msg: impl fmt::Display) {
        // Skip formatting entirely for disabled levels.
        if self.enabled(level) {
            self.log(level, msg.to_string(), Map::new());
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.core.name)
            .field("min_level", &self.core.min_level)
            .field("sinks", &self.core.sinks.sinks.len())
            .field("identity", &self.core.identity)
            .finish()
    }
}

impl Drop for LoggerCore {
    fn drop(&mut self) {
        if let Err(e) = self.sinks.flush() {
            crate::loggers::report_internal(&format!("log flush failed on drop: {}", e));
        }
    }
}
