use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Keeps the background writer alive; logs written to a file are flushed
/// when this is dropped.
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
    pub log_path: Option<PathBuf>,
}

pub fn init_logging(logging: &LoggingConfig) -> Result<LoggingGuard> {
    let (writer, guard) = match logging.file.as_deref() {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let level = logging.level().unwrap_or(Level::WARN);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer);

    // Ignore error if a global subscriber is already set (e.g., when running in tests)
    if logging.json {
        let subscriber = builder.json().with_current_span(false).finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = builder.with_target(false).finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    Ok(LoggingGuard {
        _guard: guard,
        log_path: logging.file.clone(),
    })
}

fn file_writer(path: &Path) -> Result<(non_blocking::NonBlocking, WorkerGuard)> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory at {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file at {}", path.display()))?;

    Ok(non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(file))
}
