//! Logging for phrasehound.
//!
//! Built on `tracing`. Output goes to stdout (with ANSI colours) or is appended to a
//! file. `RUST_LOG` overrides the configured level.
//!
//! | Level | Emitted for |
//! |-------|-------------|
//! | [`Debug`](crate::LogLevel::Debug) | Per-stage shutdown detail |
//! | [`Info`](crate::LogLevel::Info) | Guessing rate snapshots |
//! | [`Notice`](crate::LogLevel::Notice) | Start, resume, final status, checkpoint writes |
//! | [`Warn`](crate::LogLevel::Warn) | Skipped rule lines, ignored guesser options |
//! | [`Error`](crate::LogLevel::Error) | Setup and worker failures |
//!
//! Candidate phrases that fail a test are never logged.
//!
//! # Example
//!
//! ```rust,no_run
//! use phrasehound::{LogLevel, logger};
//!
//! logger::init(LogLevel::Notice, None).unwrap();
//! logger::plog(LogLevel::Notice, "Attack started");
//! ```

use std::sync::OnceLock;

use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;
use crate::error::{Error, Result};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the logging system.
///
/// `logfile` of `None` logs to stdout; a path appends to that file. Subsequent calls
/// are no-ops.
///
/// # Errors
///
/// Returns [`Error::Io`] if the log file cannot be opened and
/// [`Error::InvalidConfig`] if another global subscriber is already installed.
pub fn init(level: LogLevel, logfile: Option<&str>) -> Result<()> {
    if LOGGER_INITIALIZED.get().is_some() {
        return Ok(());
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_for(level)));

    match logfile {
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_names(true)
                .with_span_events(FmtSpan::NONE)
                .with_ansi(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| Error::InvalidConfig(format!("failed to set logger: {}", e)))?;
        }
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_names(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| Error::InvalidConfig(format!("failed to set logger: {}", e)))?;
        }
    }

    LOGGER_INITIALIZED.get_or_init(|| ());
    Ok(())
}

fn filter_for(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "debug",
        LogLevel::Info | LogLevel::Notice => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

/// Log a message at the specified level.
///
/// Notice maps to `info!` since tracing has no notice level.
pub fn plog(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => debug!("{}", message),
        LogLevel::Info => info!("{}", message),
        LogLevel::Notice => info!("{}", message),
        LogLevel::Warn => warn!("{}", message),
        LogLevel::Error => error!("{}", message),
    }
}

/// Log a formatted message at the specified level.
///
/// # Example
///
/// ```rust
/// use phrasehound::{LogLevel, plog_fmt};
///
/// plog_fmt!(LogLevel::Notice, "Testing with {} threads", 4);
/// ```
#[macro_export]
macro_rules! plog_fmt {
    ($level:expr, $($arg:tt)*) => {
        $crate::logger::plog($level, &format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_mapping() {
        assert_eq!(filter_for(LogLevel::Debug), "debug");
        assert_eq!(filter_for(LogLevel::Notice), "info");
        assert_eq!(filter_for(LogLevel::Error), "error");
    }

    #[test]
    fn test_plog_without_subscriber() {
        plog(LogLevel::Notice, "no subscriber installed");
        crate::plog_fmt!(LogLevel::Warn, "value {}", 42);
    }
}
