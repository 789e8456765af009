//! Size/day based rotation, gzip compression and retention of the live log
//! files.

use super::sinks::{open_append, LogSinks, LogStream};
use crate::tasks::spawn_blocking_supervised;
use chrono::{DateTime, Datelike, Local};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_BACKUPS: usize = 10;

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("cannot stat {}: {source}", path.display())]
    Stat { path: PathBuf, source: io::Error },

    #[error("cannot rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("cannot open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("cannot compress {}: {source}", path.display())]
    Compress { path: PathBuf, source: io::Error },

    #[error("cannot list {}: {source}", dir.display())]
    List { dir: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationSettings {
    pub max_size_bytes: u64,
    pub max_backups: usize,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }
}

/// Whether a live file of `size` bytes, last written at `modified`, has to
/// be rotated at `now`.
pub fn needs_rotation(
    size: u64,
    modified: DateTime<Local>,
    now: DateTime<Local>,
    max_size_bytes: u64,
) -> bool {
    if size >= max_size_bytes {
        return true;
    }
    let other_day = (modified.year(), modified.ordinal()) != (now.year(), now.ordinal());
    other_day && size > 0
}

/// `{prefix}-YYYYMMDD-HHMMSS.log`
pub fn rotated_file_name(prefix: &str, now: DateTime<Local>) -> String {
    format!("{}-{}.log", prefix, now.format("%Y%m%d-%H%M%S"))
}

/// First free rotated path in `dir`, adding `-N` when two rotations land in
/// the same second.
fn free_rotated_path(dir: &Path, prefix: &str, now: DateTime<Local>) -> PathBuf {
    let base = rotated_file_name(prefix, now);
    let taken = |p: &Path| p.exists() || gz_path(p).exists();

    let candidate = dir.join(&base);
    if !taken(&candidate) {
        return candidate;
    }
    let stem = base.trim_end_matches(".log");
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{}-{}.log", stem, n));
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip `path` into `path.gz` and remove the uncompressed file.
///
/// The original is only removed once the compressed copy is complete.
pub fn compress_rotated(path: &Path) -> Result<PathBuf, RotationError> {
    let target = gz_path(path);
    let compress_err = |source| RotationError::Compress {
        path: path.to_path_buf(),
        source,
    };

    let input = File::open(path).map_err(compress_err)?;
    let output = File::create(&target).map_err(compress_err)?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut BufReader::new(input), &mut encoder).map_err(compress_err)?;
    let writer = encoder.finish().map_err(compress_err)?;
    writer
        .into_inner()
        .map_err(|e| compress_err(e.into_error()))?
        .sync_all()
        .map_err(compress_err)?;

    fs::remove_file(path).map_err(compress_err)?;
    Ok(target)
}

fn is_rotated_copy(name: &str, prefix: &str) -> bool {
    name.starts_with(&format!("{}-", prefix)) && (name.ends_with(".log") || name.ends_with(".log.gz"))
}

/// Delete all but the `max_backups` most recently modified rotated copies
/// of `prefix` in `dir`. Returns how many files were removed.
pub fn apply_retention(dir: &Path, prefix: &str, max_backups: usize) -> Result<usize, RotationError> {
    let entries = fs::read_dir(dir).map_err(|source| RotationError::List {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut rotated: Vec<(PathBuf, SystemTime)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| is_rotated_copy(n, prefix))
                .unwrap_or(false)
        })
        .filter_map(|e| {
            let modified = e.metadata().and_then(|m| m.modified()).ok()?;
            Some((e.path(), modified))
        })
        .collect();

    if rotated.len() <= max_backups {
        return Ok(0);
    }

    // Newest first
    rotated.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in rotated.into_iter().skip(max_backups) {
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed old log {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove old log {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}

/// Rotates the live files owned by a [`LogSinks`].
pub struct LogRotator {
    sinks: Arc<LogSinks>,
    settings: RotationSettings,
}

impl LogRotator {
    pub fn new(sinks: Arc<LogSinks>, settings: RotationSettings) -> Self {
        Self { sinks, settings }
    }

    pub fn settings(&self) -> RotationSettings {
        self.settings
    }

    /// Rotate `stream` if its live file is oversized or from another day.
    ///
    /// Returns the path of the renamed (still uncompressed) file.
    pub fn rotate_if_needed(
        &self,
        stream: LogStream,
        now: DateTime<Local>,
    ) -> Result<Option<PathBuf>, RotationError> {
        let live = self.sinks.path(stream);
        let metadata = match fs::metadata(&live) {
            Ok(m) => m,
            // Nothing written yet
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(RotationError::Stat { path: live, source }),
        };
        let modified = metadata
            .modified()
            .map(DateTime::<Local>::from)
            .map_err(|source| RotationError::Stat {
                path: live.clone(),
                source,
            })?;

        if !needs_rotation(metadata.len(), modified, now, self.settings.max_size_bytes) {
            return Ok(None);
        }
        self.rotate(stream, now).map(Some)
    }

    /// Rename the live file of `stream` and install a fresh one.
    pub fn rotate(&self, stream: LogStream, now: DateTime<Local>) -> Result<PathBuf, RotationError> {
        let live = self.sinks.path(stream);
        let target = free_rotated_path(self.sinks.dir(), stream.prefix(), now);

        self.sinks.with_stream(stream, |slot| {
            // Close before rename
            slot.take();
            let renamed = fs::rename(&live, &target);

            // Always reinstall a handle, even if the rename failed
            match open_append(&live) {
                Ok(file) => *slot = Some(file),
                Err(source) => {
                    renamed.map_err(|source| RotationError::Rename {
                        from: live.clone(),
                        to: target.clone(),
                        source,
                    })?;
                    return Err(RotationError::Open {
                        path: live.clone(),
                        source,
                    });
                }
            }

            renamed.map_err(|source| RotationError::Rename {
                from: live.clone(),
                to: target.clone(),
                source,
            })
        })?;

        info!("Rotated {} to {}", live.display(), target.display());
        Ok(target)
    }

    /// Check both streams; compress and prune in the background.
    ///
    /// Errors are logged. The returned handles finish once compression and
    /// retention are done.
    pub fn check_and_rotate(&self) -> Vec<JoinHandle<()>> {
        let now = Local::now();
        let mut handles = Vec::new();
        for stream in LogStream::ALL {
            match self.rotate_if_needed(stream, now) {
                Ok(Some(rotated)) => handles.push(self.spawn_compression(stream, rotated)),
                Ok(None) => {}
                Err(e) => error!("Log rotation of {} failed: {}", stream.file_name(), e),
            }
        }
        handles
    }

    fn spawn_compression(&self, stream: LogStream, rotated: PathBuf) -> JoinHandle<()> {
        let dir = self.sinks.dir().to_path_buf();
        let max_backups = self.settings.max_backups;
        spawn_blocking_supervised(format!("compress-{}", stream.prefix()), move || {
            match compress_rotated(&rotated) {
                Ok(gz) => debug!("Compressed {}", gz.display()),
                Err(e) => error!("{}", e),
            }
            match apply_retention(&dir, stream.prefix(), max_backups) {
                Ok(0) => {}
                Ok(n) => info!("Removed {} old {} log file(s)", n, stream.prefix()),
                Err(e) => error!("Log retention for {} failed: {}", stream.prefix(), e),
            }
        })
    }
}
