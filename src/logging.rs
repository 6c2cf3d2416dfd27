//! Tracing subscriber setup for the command line tool.

use crate::backup::job::ensure_dir;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub static LOG_FILE_NAME: &str = "wuergback.log";
static DEFAULT_LOG_LEVEL: &str = "info";

/// Installs the global subscriber.
///
/// Logs go to stderr, or are appended to `<log_dir>/wuergback.log` when a
/// directory is given. `RUST_LOG` overrides the default `info` level.
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    match log_dir {
        Some(dir) => {
            ensure_dir(dir)?;
            let log_file = dir.join(LOG_FILE_NAME);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .map_err(Error::from)
                .with_msg(format!("Cannot open log file {:?}", log_file))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    Ok(())
}
