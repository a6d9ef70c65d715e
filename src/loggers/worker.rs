//! Background "mill" for rotated backups: pruning by count and age, then
//! gzip compression. Runs off the write path so rollover stays a rename
//! plus reopen.

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::sync::mpsc;

pub(crate) const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
pub(crate) const COMPRESS_SUFFIX: &str = ".gz";

/// Retention rules plus the naming scheme of one file lineage.
#[derive(Debug, Clone)]
pub struct Lineage {
    pub dir: PathBuf,
    pub stem: String,
    pub ext: String,
    pub max_age_days: u64,
    pub max_backups: usize,
    pub compress: bool,
}

#[derive(Debug)]
struct Backup {
    path: PathBuf,
    stamp: NaiveDateTime,
    compressed: bool,
}

impl Lineage {
    pub fn backup_prefix(&self) -> String {
        format!("{}-", self.stem)
    }

    pub fn backup_name(&self, stamp: NaiveDateTime) -> PathBuf {
        self.dir.join(format!(
            "{}{}{}",
            self.backup_prefix(),
            stamp.format(BACKUP_TIME_FORMAT),
            self.ext
        ))
    }

    fn parse_backup(&self, name: &str) -> Option<(NaiveDateTime, bool)> {
        let rest = name.strip_prefix(&self.backup_prefix())?;
        let (rest, compressed) = match rest.strip_suffix(COMPRESS_SUFFIX) {
            Some(r) => (r, true),
            None => (rest, false),
        };
        let stamp = rest.strip_suffix(self.ext.as_str())?;
        NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT)
            .ok()
            .map(|t| (t, compressed))
    }

    /// Backups of this lineage, newest first.
    fn backups(&self) -> io::Result<Vec<Backup>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some((stamp, compressed)) = self.parse_backup(name) {
                found.push(Backup { path: entry.path(), stamp, compressed });
            }
        }
        found.sort_by(|a, b| b.stamp.cmp(&a.stamp));
        Ok(found)
    }

    /// One full pass: drop backups beyond the count and age limits, then
    /// compress whatever is left uncompressed.
    pub fn mill_once(&self) -> io::Result<()> {
        if self.max_backups == 0 && self.max_age_days == 0 && !self.compress {
            return Ok(());
        }

        let mut files = self.backups()?;
        let mut remove = Vec::new();

        if self.max_backups > 0 {
            // A plain file and its .gz twin count as one backup.
            let mut seen = std::collections::HashSet::new();
            let mut keep = Vec::new();
            for b in files {
                seen.insert(b.stamp);
                if seen.len() > self.max_backups {
                    remove.push(b);
                } else {
                    keep.push(b);
                }
            }
            files = keep;
        }

        if self.max_age_days > 0 {
            let cutoff = Utc::now().naive_utc() - ChronoDuration::days(self.max_age_days as i64);
            let (old, fresh): (Vec<_>, Vec<_>) = files.into_iter().partition(|b| b.stamp < cutoff);
            remove.extend(old);
            files = fresh;
        }

        for b in &remove {
            fs::remove_file(&b.path)?;
        }

        if self.compress {
            for b in files.iter().filter(|b| !b.compressed) {
                compress_file(&b.path)?;
            }
        }
        Ok(())
    }
}

fn compress_file(src: &Path) -> io::Result<()> {
    let mut dst_name = src.as_os_str().to_owned();
    dst_name.push(COMPRESS_SUFFIX);
    let dst = PathBuf::from(dst_name);

    let mut reader = BufReader::new(File::open(src)?);
    let out = BufWriter::new(File::create(&dst)?);
    let mut gz = GzEncoder::new(out, Compression::default());
    io::copy(&mut reader, &mut gz)?;
    gz.finish()?.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    fs::remove_file(src)
}

/// Handle used by rotating files to request a milling pass.
#[derive(Clone)]
pub struct MillHandle {
    sender: mpsc::UnboundedSender<Arc<Lineage>>,
}

impl MillHandle {
    /// Queues a pass; silently ignored once the worker has gone away.
    pub fn request(&self, lineage: Arc<Lineage>) {
        let _ = self.sender.send(lineage);
    }
}

static SHARED_MILL: LazyLock<Option<MillHandle>> = LazyLock::new(|| match MillWorker::spawn() {
    Ok(handle) => Some(handle),
    Err(e) => {
        crate::loggers::report_internal(&format!("failed to start backup mill: {}", e));
        None
    }
});

/// The process-wide mill worker, started on first use.
pub fn shared_mill() -> Option<MillHandle> {
    SHARED_MILL.clone()
}

pub struct MillWorker {
    receiver: mpsc::UnboundedReceiver<Arc<Lineage>>,
}

impl MillWorker {
    pub fn new(receiver: mpsc::UnboundedReceiver<Arc<Lineage>>) -> Self {
        Self { receiver }
    }

    /// Starts the worker on its own OS thread. It stops when every
    /// `MillHandle` has been dropped.
    pub fn spawn() -> io::Result<MillHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = MillWorker::new(rx);
        std::thread::Builder::new()
            .name("rs-log-mill".into())
            .spawn(move || worker.run())?;
        Ok(MillHandle { sender: tx })
    }

    pub fn run(mut self) {
        while let Some(lineage) = self.receiver.blocking_recv() {
            if let Err(e) = lineage.mill_once() {
                crate::loggers::report_internal(&format!(
                    "failed to mill backups of {}: {}",
                    lineage.dir.join(format!("{}{}", lineage.stem, lineage.ext)).display(),
                    e
                ));
            }
        }
    }
}
