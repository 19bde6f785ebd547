//! Logging system initialization
//!
//! Logs go to `<data>/logs/darts-hub.log`. Each start moves the previous
//! session's log aside (`darts-hub.log.1` .. `darts-hub.log.9`), so the last
//! ten sessions are kept regardless of size.

use crate::error::{DartsHubError, Result, StringError};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt};

/// Log file name inside the log directory
pub const LOG_FILE: &str = "darts-hub.log";

/// Maximum number of historical log files to keep
const MAX_LOG_FILES: u8 = 9;

/// Initialize the logging system
///
/// Log level defaults to INFO but can be configured via `RUST_LOG`.
pub fn init_logging(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;
    rotate_logs_on_startup(&log_dir.join(LOG_FILE))?;

    // Startup-based rotation is handled above; the appender only writes
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(log_dir)
        .map_err(|e| DartsHubError::ConfigError(Box::new(e)))?;

    let subscriber = fmt()
        .with_writer(file_appender)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| DartsHubError::ConfigError(Box::new(e)))?;

    tracing::info!("darts-hub v{} started", env!("CARGO_PKG_VERSION"));
    Ok(())
}

/// Shift `<log>.N` to `<log>.N+1`, dropping the oldest, then `<log>` to `<log>.1`
fn rotate_logs_on_startup(log_path: &Path) -> Result<()> {
    if !log_path.exists() {
        return Ok(());
    }

    let (Some(log_dir), Some(log_name)) = (log_path.parent(), log_path.file_name()) else {
        return Err(DartsHubError::ConfigError(StringError::new(format!(
            "Invalid log path {}",
            log_path.display()
        ))));
    };
    let log_name = log_name.to_string_lossy();
    let numbered = |i: u8| log_dir.join(format!("{log_name}.{i}"));

    let oldest = numbered(MAX_LOG_FILES);
    if oldest.exists() {
        std::fs::remove_file(&oldest)?;
    }
    for i in (1..MAX_LOG_FILES).rev() {
        let current = numbered(i);
        if current.exists() {
            std::fs::rename(&current, numbered(i + 1))?;
        }
    }
    std::fs::rename(log_path, numbered(1))?;
    Ok(())
}
