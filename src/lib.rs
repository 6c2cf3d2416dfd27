//! # wuergback
//!
//! Directory backups through an external 7-Zip compatible archiver.
//!
//! ## Features
//!
//! - **Password protected archives**: compression and encryption delegated to 7-Zip
//! - **Staged publishing**: archives are built locally, then copied to the backup location
//! - **Integrity check**: SHA-256 comparison of the staged and published archive
//! - **Parallel Processing**: one job per source directory on a bounded thread pool
//!
//! ## Quick Start
//!
//! ```no_run
//! use wuergback::backup::backup_config::BackupConfig;
//! use wuergback::backup::batch::{run_batch, DEFAULT_MAX_PARALLELISM};
//!
//! let config = BackupConfig::load("wuergback.json")?;
//! let result = run_batch(&config.job_specs(), DEFAULT_MAX_PARALLELISM)?;
//! result.ensure_success()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
pub mod logging;
