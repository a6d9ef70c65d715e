//! # Sink Router
//!
//! Decides, from a `LogConfig`, which physical targets exist and which
//! levels reach each of them.
//!
//! * separated mode: `debug.log`, `info.log`, `warn.log`, `error.log`,
//!   `panic.log`, one sink per exact level, plus the `stderr.log` failure
//!   stream that also receives every panic-level record;
//! * unified mode (and always in high-performance mode): a single
//!   `app.log` for everything at or above the configured minimum.

use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::configs::LogConfig;
use crate::core::error::LogError;
use crate::loggers::core::{LevelFilter, LogLevel, LogRecord};
use crate::loggers::encoder::Encoder;
use crate::loggers::rotation::{RotatingFile, RotationPolicy};

pub const FILE_DEBUG: &str = "debug.log";
pub const FILE_INFO: &str = "info.log";
pub const FILE_WARN: &str = "warn.log";
pub const FILE_ERROR: &str = "error.log";
pub const FILE_PANIC: &str = "panic.log";
pub const FILE_STDERR: &str = "stderr.log";
pub const FILE_APP: &str = "app.log";

/// A byte destination that accepts whole encoded records.
pub trait LogWriter: Send + Sync {
    fn write_all(&self, buf: &[u8]) -> io::Result<()>;
    fn flush(&self) -> io::Result<()>;
}

impl LogWriter for RotatingFile {
    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        self.write_record(buf)
    }

    fn flush(&self) -> io::Result<()> {
        RotatingFile::flush(self)
    }
}

/// Mirrors records to the process stdout.
#[derive(Debug, Default)]
pub struct StdoutMirror;

impl LogWriter for StdoutMirror {
    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(buf)?;
        out.flush()
    }

    fn flush(&self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// Writes to the process stderr; the target of the development logger.
#[derive(Debug, Default)]
pub struct StderrWriter;

impl LogWriter for StderrWriter {
    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        io::stderr().lock().write_all(buf)
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Dedicated append-only file for process-level failure output
/// (panic-level records and panic reports). Never rotated.
#[derive(Debug)]
pub struct FailureStream {
    path: PathBuf,
    file: Mutex<File>,
}

impl FailureStream {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file: Mutex::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogWriter for FailureStream {
    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        self.file.lock().write_all(buf)
    }

    fn flush(&self) -> io::Result<()> {
        self.file.lock().flush()
    }
}

/// An encoder, a level predicate, and the outputs that receive what passes it.
pub struct Sink {
    filter: LevelFilter,
    encoder: Arc<Encoder>,
    outputs: Vec<Arc<dyn LogWriter>>,
}

impl Sink {
    pub fn new(filter: LevelFilter, encoder: Arc<Encoder>, outputs: Vec<Arc<dyn LogWriter>>) -> Self {
        Self { filter, encoder, outputs }
    }

    pub fn filter(&self) -> LevelFilter {
        self.filter
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.filter.is_enabled(level)
    }

    /// Encodes once and writes to every output. All outputs are attempted;
    /// the first failure is returned afterwards.
    pub fn write(&self, record: &LogRecord) -> io::Result<()> {
        let line = self.encoder.encode(record);
        write_each(&self.outputs, &line)
    }

    pub fn flush(&self) -> io::Result<()> {
        let mut first_err = None;
        for out in &self.outputs {
            if let Err(e) = out.flush() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

fn write_each(outputs: &[Arc<dyn LogWriter>], line: &[u8]) -> io::Result<()> {
    let mut first_err = None;
    for out in outputs {
        if let Err(e) = out.write_all(line) {
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

/// Everything the router built for one logger.
pub struct SinkSet {
    pub sinks: Vec<Sink>,
    pub failure: Option<(Arc<Encoder>, Arc<FailureStream>)>,
}

impl SinkSet {
    /// Sends `record` to each sink whose predicate accepts it, plus the
    /// failure stream for panic-level records.
    ///
    /// Error-and-above records are flushed at once even on buffered
    /// targets, so they survive an exit without `sync`.
    pub fn dispatch(&self, record: &LogRecord) -> io::Result<()> {
        let urgent = record.level >= LogLevel::Error;
        let mut first_err = None;
        for sink in self.sinks.iter().filter(|s| s.is_enabled(record.level)) {
            let written = sink.write(record).and_then(|()| if urgent { sink.flush() } else { Ok(()) });
            if let Err(e) = written {
                first_err.get_or_insert(e);
            }
        }
        if record.level >= LogLevel::Panic {
            if let Some((encoder, stream)) = &self.failure {
                if let Err(e) = stream.write_all(&encoder.encode(record)) {
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn flush(&self) -> io::Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                first_err.get_or_insert(e);
            }
        }
        if let Some((_, stream)) = &self.failure {
            if let Err(e) = stream.flush() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Creates the log root (and any parents) with mode 0755.
pub fn ensure_root(root: &Path) -> Result<(), LogError> {
    let wrap = |source: io::Error| LogError::DirectoryError {
        path: root.display().to_string(),
        source,
    };
    if root.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(root).map_err(wrap)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(root, fs::Permissions::from_mode(0o755)).map_err(wrap)?;
    }
    Ok(())
}

pub fn build_sinks(cfg: &LogConfig) -> Result<SinkSet, LogError> {
    build_sinks_with(cfg, Arc::new(StdoutMirror))
}

/// Same as `build_sinks`, with `mirror` standing in for stdout when
/// `log_stdout` is set.
pub(crate) fn build_sinks_with(cfg: &LogConfig, mirror: Arc<dyn LogWriter>) -> Result<SinkSet, LogError> {
    let root = PathBuf::from(cfg.log_root());
    ensure_root(&root)?;

    let encoder = Arc::new(Encoder::new(cfg.encoder_kind(), cfg.level_style(), &cfg.stacktrace_key()));
    let policy = cfg.segment.policy();
    // The fast path leaves flushing to `sync`, drop and error-level records.
    let flush_each_write = !cfg.high_performance;

    let target = |name: &str| -> Result<Vec<Arc<dyn LogWriter>>, LogError> {
        let path = root.join(name);
        let file = RotatingFile::open(&path, policy, flush_each_write).map_err(|source| LogError::FileError {
            path: path.display().to_string(),
            source,
        })?;
        let mut outputs: Vec<Arc<dyn LogWriter>> = vec![Arc::new(file)];
        if cfg.log_stdout {
            outputs.push(mirror.clone());
        }
        Ok(outputs)
    };

    if cfg.is_unified() {
        let sink = Sink::new(LevelFilter::AtLeast(cfg.min_level()), encoder, target(FILE_APP)?);
        return Ok(SinkSet { sinks: vec![sink], failure: None });
    }

    let names = [FILE_DEBUG, FILE_INFO, FILE_WARN, FILE_ERROR, FILE_PANIC];
    let mut sinks = Vec::with_capacity(names.len());
    for (name, filter) in names.into_iter().zip(LevelFilter::separated()) {
        sinks.push(Sink::new(filter, encoder.clone(), target(name)?));
    }

    let stderr_path = root.join(FILE_STDERR);
    let failure = FailureStream::open(&stderr_path).map_err(|source| LogError::FileError {
        path: stderr_path.display().to_string(),
        source,
    })?;

    Ok(SinkSet { sinks, failure: Some((encoder, Arc::new(failure))) })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl LogWriter for Broken {
        fn write_all(&self, _: &[u8]) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
        fn flush(&self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Capture(Mutex<Vec<u8>>);

    impl LogWriter for Capture {
        fn write_all(&self, buf: &[u8]) -> io::Result<()> {
            self.0.lock().extend_from_slice(buf);
            Ok(())
        }
        fn flush(&self) -> io::Result<()> {
            Ok(())
        }
    }

    fn encoder() -> Arc<Encoder> {
        use crate::loggers::encoder::{EncoderKind, LevelStyle};
        Arc::new(Encoder::new(EncoderKind::Console, LevelStyle::Lowercase, ""))
    }

    #[test]
    fn failing_output_does_not_starve_the_others() {
        let good = Arc::new(Capture::default());
        let sink = Sink::new(
            LevelFilter::AtLeast(LogLevel::Debug),
            encoder(),
            vec![Arc::new(Broken), good.clone()],
        );

        let err = sink.write(&LogRecord::new(LogLevel::Info, "still here")).unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert!(String::from_utf8_lossy(&good.0.lock()).contains("still here"));
    }

    #[test]
    fn stdout_mirror_and_file_both_get_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LogConfig {
            directory: dir.path().display().to_string(),
            log_stdout: true,
            ..Default::default()
        };
        let mirror = Arc::new(Capture::default());
        let set = build_sinks_with(&cfg, mirror.clone()).unwrap();

        set.dispatch(&LogRecord::new(LogLevel::Warn, "mirrored")).unwrap();
        set.flush().unwrap();

        let mirrored = String::from_utf8_lossy(&mirror.0.lock()).to_string();
        assert_eq!(mirrored.lines().count(), 1);
        assert!(mirrored.contains("mirrored"));
        let on_disk = fs::read_to_string(dir.path().join(FILE_WARN)).unwrap();
        assert!(on_disk.contains("mirrored"));
        assert!(!fs::read_to_string(dir.path().join(FILE_INFO)).unwrap().contains("mirrored"));
    }

    #[test]
    fn mirror_is_skipped_without_log_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LogConfig {
            directory: dir.path().display().to_string(),
            ..Default::default()
        };
        let mirror = Arc::new(Capture::default());
        let set = build_sinks_with(&cfg, mirror.clone()).unwrap();

        set.dispatch(&LogRecord::new(LogLevel::Info, "file only")).unwrap();
        assert!(mirror.0.lock().is_empty());
    }

    #[test]
    fn root_creation_failure_is_a_directory_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();

        let err = ensure_root(&blocker.join("logs")).unwrap_err();
        assert!(matches!(err, LogError::DirectoryError { .. }));
    }

    #[test]
    fn separated_mode_builds_five_sinks_and_failure_stream() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LogConfig {
            directory: dir.path().display().to_string(),
            ..Default::default()
        };
        let set = build_sinks(&cfg).unwrap();
        assert_eq!(set.sinks.len(), 5);
        assert!(set.failure.is_some());
        for name in [FILE_DEBUG, FILE_INFO, FILE_WARN, FILE_ERROR, FILE_PANIC, FILE_STDERR] {
            assert!(dir.path().join(name).exists(), "{} missing", name);
        }
    }

    #[test]
    fn high_performance_forces_unified_mode() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LogConfig {
            directory: dir.path().display().to_string(),
            high_performance: true,
            separate_levels: Some(true),
            log_level: "warn".into(),
            ..Default::default()
        };
        let set = build_sinks(&cfg).unwrap();
        assert_eq!(set.sinks.len(), 1);
        assert_eq!(set.sinks[0].filter(), LevelFilter::AtLeast(LogLevel::Warn));
        assert!(set.failure.is_none());
        assert!(dir.path().join(FILE_APP).exists());
        assert!(!dir.path().join(FILE_INFO).exists());
    }
}
