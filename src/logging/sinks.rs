//! File sinks behind the `tracing` file layer.
//!
//! Every formatted line goes to `bot.log`; WARN and ERROR lines are copied
//! to `errors.log` as well. The rotator swaps file handles through
//! [`LogSinks::with_stream`], which takes the same mutex the writer takes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

/// The two live log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStream {
    Main,
    Errors,
}

impl LogStream {
    pub const ALL: [LogStream; 2] = [LogStream::Main, LogStream::Errors];

    /// Prefix shared by the live file and its rotated copies.
    pub fn prefix(&self) -> &'static str {
        match self {
            LogStream::Main => "bot",
            LogStream::Errors => "errors",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.log", self.prefix())
    }
}

struct SinkFiles {
    main: Option<File>,
    errors: Option<File>,
}

impl SinkFiles {
    fn slot(&mut self, stream: LogStream) -> &mut Option<File> {
        match stream {
            LogStream::Main => &mut self.main,
            LogStream::Errors => &mut self.errors,
        }
    }
}

/// Owner of the live log file handles.
pub struct LogSinks {
    dir: PathBuf,
    files: Mutex<SinkFiles>,
}

pub(crate) fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl LogSinks {
    /// Create `dir` if needed and open both live files for appending.
    pub fn open(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let main = open_append(&dir.join(LogStream::Main.file_name()))?;
        let errors = open_append(&dir.join(LogStream::Errors.file_name()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            files: Mutex::new(SinkFiles {
                main: Some(main),
                errors: Some(errors),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Canonical path of the live file for `stream`.
    pub fn path(&self, stream: LogStream) -> PathBuf {
        self.dir.join(stream.file_name())
    }

    fn lock(&self) -> MutexGuard<'_, SinkFiles> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` with exclusive access to the handle slot of `stream`.
    ///
    /// No log line can be written while `f` runs, so a handle swapped here
    /// never receives half a line.
    pub fn with_stream<R>(&self, stream: LogStream, f: impl FnOnce(&mut Option<File>) -> R) -> R {
        let mut files = self.lock();
        f(files.slot(stream))
    }

    fn write_line(&self, buf: &[u8], mirror_to_errors: bool) -> io::Result<()> {
        let mut files = self.lock();
        if let Some(main) = files.main.as_mut() {
            main.write_all(buf)?;
        }
        if mirror_to_errors {
            if let Some(errors) = files.errors.as_mut() {
                errors.write_all(buf)?;
            }
        }
        Ok(())
    }

    fn flush_all(&self) -> io::Result<()> {
        let mut files = self.lock();
        if let Some(main) = files.main.as_mut() {
            main.flush()?;
        }
        if let Some(errors) = files.errors.as_mut() {
            errors.flush()?;
        }
        Ok(())
    }
}

/// [`MakeWriter`] handing out writers bound to a shared [`LogSinks`].
#[derive(Clone)]
pub struct SinkMakeWriter {
    sinks: Arc<LogSinks>,
}

impl SinkMakeWriter {
    pub fn new(sinks: Arc<LogSinks>) -> Self {
        Self { sinks }
    }
}

pub struct SinkWriter {
    sinks: Arc<LogSinks>,
    mirror_to_errors: bool,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sinks.write_line(buf, self.mirror_to_errors)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sinks.flush_all()
    }
}

impl<'a> MakeWriter<'a> for SinkMakeWriter {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter {
            sinks: self.sinks.clone(),
            mirror_to_errors: false,
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SinkWriter {
            sinks: self.sinks.clone(),
            // ERROR < WARN < INFO in tracing's ordering
            mirror_to_errors: *meta.level() <= Level::WARN,
        }
    }
}
