//! Logging initialization
//!
//! Logs always go to stderr. When [`LoggingConfig::directory`] is set they are
//! additionally written to daily-rotated files, and the returned
//! [`LoggingGuard`] must be held until shutdown.
//!
//! ```rust,no_run
//! use docbridge_server::LoggingConfig;
//!
//! // Guard lives until main() returns
//! let _guard = LoggingConfig::default().init()?;
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Guard that ensures file logs are flushed on drop
///
/// Dropping it early loses buffered log lines.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    _stderr_guard: WorkerGuard,
}

impl LoggingConfig {
    /// Initialize logging based on this configuration
    ///
    /// Returns `Some(LoggingGuard)` when file logging is configured,
    /// `None` for stderr-only logging. `RUST_LOG` overrides [`Self::level`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The log directory cannot be created
    /// - The level filter cannot be parsed
    /// - A global tracing subscriber is already set
    pub fn init(&self) -> io::Result<Option<LoggingGuard>> {
        let filter = self.filter()?;

        match &self.directory {
            None => {
                init_stderr(self, filter)?;
                Ok(None)
            }
            Some(dir) => init_stderr_and_file(self, dir, filter).map(Some),
        }
    }

    fn filter(&self) -> io::Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string())),
        }
    }
}

/// Initialize stderr-only logging (no guard needed)
fn init_stderr(config: &LoggingConfig, filter: EnvFilter) -> io::Result<()> {
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.structured {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    } else {
        subscriber
            .with(fmt::layer().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

/// Initialize stderr + daily file logging (returns guard)
fn init_stderr_and_file(
    config: &LoggingConfig,
    dir: &Path,
    filter: EnvFilter,
) -> io::Result<LoggingGuard> {
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
    let (file_non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stderr_non_blocking, stderr_guard) = tracing_appender::non_blocking(io::stderr());
    let combined = file_non_blocking.and(stderr_non_blocking);

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.structured {
        subscriber
            .with(fmt::layer().json().with_writer(combined))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(combined))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))?;
    }

    Ok(LoggingGuard {
        _file_guard: file_guard,
        _stderr_guard: stderr_guard,
    })
}
