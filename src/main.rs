use clap::Parser;
use itertools::Itertools;
use std::path::{Path, PathBuf};
use std::process::exit;
use tracing::{error, info};
use wuergback::backup::backup_config::{BackupConfig, DEFAULT_CONFIG_NAME};
use wuergback::backup::batch::{run_batch, DEFAULT_MAX_PARALLELISM};
use wuergback::backup::result_error::result::{convert_error_vec, Result};
use wuergback::backup::result_error::WithMsg;
use wuergback::backup::selftest;
use wuergback::logging;

/// Back up directories into password protected 7-Zip archives
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file or name, `.json` is appended when there is no extension.
    /// Repeat to run several configurations one after another.
    #[arg(short, long)]
    config: Vec<PathBuf>,

    /// Number of backup jobs running at the same time
    #[arg(short = 'j', long, default_value_t = DEFAULT_MAX_PARALLELISM)]
    max_parallelism: usize,

    /// Append logs to <LOG_DIR>/wuergback.log instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Only write default configuration files for missing configs, then exit
    #[arg(long)]
    init: bool,

    /// Create a self-test directory tree under the system temp dir first
    #[arg(long)]
    selftest: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = logging::init(args.log_dir.as_deref()) {
        eprintln!("{e}");
        exit(1);
    }

    match run(&args) {
        Ok(()) => info!("Backup finished"),
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    }
}

fn run(args: &Args) -> Result<()> {
    if args.selftest {
        if let Err(e) = selftest::scaffold(std::env::temp_dir()) {
            error!("Self-test setup failed: {e}");
        }
    }

    let configs = if args.config.is_empty() {
        vec![PathBuf::from(DEFAULT_CONFIG_NAME)]
    } else {
        args.config.clone()
    };
    info!("Processing backup configurations: {:?}", configs);

    let errors = configs
        .iter()
        .filter_map(|name| {
            run_config(name, args)
                .with_msg(format!("Backup configuration {:?} failed", name))
                .err()
        })
        .collect_vec();
    convert_error_vec(errors)
}

fn run_config(name: &Path, args: &Args) -> Result<()> {
    let path = BackupConfig::resolve_path(name);
    if !path.exists() {
        BackupConfig::write_default(&path)?;
    }
    if args.init {
        return Ok(());
    }

    let config = BackupConfig::load(&path)?;
    run_batch(&config.job_specs(), args.max_parallelism)?.ensure_success()
}
