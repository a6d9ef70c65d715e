//! # Rotation Policy
//!
//! `RotatingFile` owns the active file of one lineage. Size rollover happens
//! inline under the target's lock (close, rename to a timestamped backup,
//! reopen empty); pruning and compression of backups are handed to the
//! background mill in `worker`.

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::loggers::worker::{Lineage, MillHandle, shared_mill};

pub const MEGABYTE: u64 = 1024 * 1024;
pub const DEFAULT_MAX_SIZE_MB: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotationPolicy {
    /// Rollover threshold in megabytes; 0 means `DEFAULT_MAX_SIZE_MB`.
    pub max_size_mb: u64,
    /// Backups older than this many days are removed; 0 keeps them forever.
    pub max_age_days: u64,
    /// Backups kept by count; 0 keeps all.
    pub max_backups: usize,
    /// Gzip rotated backups.
    pub compress: bool,
}

impl RotationPolicy {
    pub fn max_bytes(&self) -> u64 {
        let mb = if self.max_size_mb == 0 { DEFAULT_MAX_SIZE_MB } else { self.max_size_mb };
        mb * MEGABYTE
    }
}

struct Active {
    writer: Option<BufWriter<File>>,
    size: u64,
    last_stamp: Option<NaiveDateTime>,
}

pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    flush_each_write: bool,
    lineage: Arc<Lineage>,
    mill: Option<MillHandle>,
    active: Mutex<Active>,
}

impl RotatingFile {
    /// Opens (or creates) the active file at `path`, appending to whatever
    /// is already there.
    pub fn open(path: impl Into<PathBuf>, policy: RotationPolicy, flush_each_write: bool) -> io::Result<Self> {
        let mut file = Self::unopened(path.into(), policy, flush_each_write);
        file.mill = shared_mill();
        file.open_existing_or_new(0)?;
        Ok(file)
    }

    fn unopened(path: PathBuf, policy: RotationPolicy, flush_each_write: bool) -> Self {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        Self {
            lineage: Arc::new(Lineage {
                dir,
                stem,
                ext,
                max_age_days: policy.max_age_days,
                max_backups: policy.max_backups,
                compress: policy.compress,
            }),
            max_bytes: policy.max_bytes(),
            flush_each_write,
            mill: None,
            active: Mutex::new(Active { writer: None, size: 0, last_stamp: None }),
            path,
        }
    }

    /// Overrides the rollover threshold in bytes. Mostly useful in tests.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    /// Writes one complete record. The record never straddles two files.
    pub fn write_record(&self, buf: &[u8]) -> io::Result<()> {
        let len = buf.len() as u64;
        if len > self.max_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("write length {} exceeds maximum file size {}", len, self.max_bytes),
            ));
        }

        let mut active = self.active.lock();
        if active.writer.is_none() {
            self.reopen(&mut active, len)?;
        } else if active.size + len > self.max_bytes {
            self.rotate(&mut active)?;
        }

        let Some(writer) = active.writer.as_mut() else {
            return Err(io::Error::other("log file is not open"));
        };
        writer.write_all(buf)?;
        if self.flush_each_write {
            writer.flush()?;
        }
        active.size += len;
        Ok(())
    }

    pub fn flush(&self) -> io::Result<()> {
        match self.active.lock().writer.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }

    /// Forces a rollover regardless of the current size.
    pub fn rotate_now(&self) -> io::Result<()> {
        let mut active = self.active.lock();
        self.rotate(&mut active)
    }

    fn open_existing_or_new(&self, len: u64) -> io::Result<()> {
        let mut active = self.active.lock();
        self.reopen(&mut active, len)
    }

    fn reopen(&self, active: &mut Active, len: u64) -> io::Result<()> {
        self.request_mill();
        match fs::metadata(&self.path) {
            Ok(meta) if meta.len() + len > self.max_bytes => self.rotate(active),
            Ok(meta) => {
                let file = OpenOptions::new().append(true).open(&self.path)?;
                active.writer = Some(BufWriter::new(file));
                active.size = meta.len();
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.open_new(active),
            Err(e) => Err(e),
        }
    }

    fn rotate(&self, active: &mut Active) -> io::Result<()> {
        if let Some(mut w) = active.writer.take() {
            w.flush()?;
        }
        self.open_new(active)?;
        self.request_mill();
        Ok(())
    }

    /// Moves any existing active file aside and starts an empty one.
    fn open_new(&self, active: &mut Active) -> io::Result<()> {
        fs::create_dir_all(&self.lineage.dir)?;

        if self.path.exists() {
            let backup = self.next_backup_name(active);
            fs::rename(&self.path, backup)?;
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let file = options.open(&self.path)?;
        active.writer = Some(BufWriter::new(file));
        active.size = 0;
        Ok(())
    }

    /// Backup names have millisecond resolution; bump the stamp until it is free
    /// so back-to-back rollovers never clobber each other.
    fn next_backup_name(&self, active: &mut Active) -> PathBuf {
        let mut stamp = Utc::now().naive_utc();
        if let Some(last) = active.last_stamp {
            if stamp <= last {
                stamp = last + ChronoDuration::milliseconds(1);
            }
        }
        let mut candidate = self.lineage.backup_name(stamp);
        while candidate.exists() || candidate.with_extension(gz_extension(&candidate)).exists() {
            stamp += ChronoDuration::milliseconds(1);
            candidate = self.lineage.backup_name(stamp);
        }
        active.last_stamp = Some(stamp);
        candidate
    }

    fn request_mill(&self) {
        if let Some(mill) = &self.mill {
            mill.request(self.lineage.clone());
        }
    }
}

fn gz_extension(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!("{}.gz", ext.to_string_lossy()),
        None => "gz".to_string(),
    }
}

impl Drop for RotatingFile {
    fn drop(&mut self) {
        if let Some(mut w) = self.active.get_mut().writer.take() {
            let _ = w.flush();
        }
    }
}

impl std::fmt::Debug for RotatingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFile")
            .field("path", &self.path)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}
