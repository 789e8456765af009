//! Log output routing and rotation.

pub mod rotation;
pub mod sinks;

pub use rotation::{
    apply_retention, compress_rotated, needs_rotation, LogRotator, RotationError,
    RotationSettings,
};
pub use sinks::{LogSinks, LogStream, SinkMakeWriter};

use std::path::Path;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber: stdout plus the rotating files in
/// `logs_dir`.
///
/// If the log files cannot be opened, logging continues on stdout only and
/// `None` is returned.
pub fn init_logging(logs_dir: &Path, settings: RotationSettings) -> Option<Arc<LogRotator>> {
    let (sinks, open_error) = match LogSinks::open(logs_dir) {
        Ok(sinks) => (Some(Arc::new(sinks)), None),
        Err(e) => (None, Some(e)),
    };

    let file_layer = sinks.as_ref().map(|sinks| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(SinkMakeWriter::new(sinks.clone()))
    });

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init();

    if let Some(e) = open_error {
        warn!(
            "Cannot open log files in {}: {}. Logging to stdout only",
            logs_dir.display(),
            e
        );
    }

    sinks.map(|sinks| Arc::new(LogRotator::new(sinks, settings)))
}
