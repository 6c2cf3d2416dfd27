//! Fan-out of backup jobs over a bounded worker pool.

use crate::backup::archiver::{Archiver, SevenZip};
use crate::backup::job::{archive_base_name, BackupJobSpec, JobExecutor, JobOutcome};
use crate::backup::publish::{FileCopy, Publisher};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use rayon::ThreadPoolBuilder;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::channel;

pub static DEFAULT_MAX_PARALLELISM: usize = 4;

/// Outcomes of every job in one batch, in completion order
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct BatchResult {
    #[getset(get = "pub")]
    outcomes: Vec<JobOutcome>,
    #[getset(get_copy = "pub")]
    overall_success: bool,
}

impl BatchResult {
    fn from_outcomes(outcomes: Vec<JobOutcome>) -> Self {
        let overall_success = outcomes.iter().all(JobOutcome::success);
        Self {
            outcomes,
            overall_success,
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| !o.success())
    }

    /// Turns a failed reduction into [`Error::BatchFailed`], the outcomes stay on `self`.
    pub fn ensure_success(&self) -> Result<()> {
        if self.overall_success {
            return Ok(());
        }
        let sources = self
            .failed()
            .map(|o| o.source_directory().clone())
            .collect_vec();
        Err(Error::BatchFailed {
            failed: sources.len(),
            total: self.outcomes.len(),
            sources,
        })
    }
}

/// Runs every spec with 7-Zip and a plain file copy.
pub fn run_batch(specs: &[BackupJobSpec], max_parallelism: usize) -> Result<BatchResult> {
    run_batch_with(
        &JobExecutor::<SevenZip, FileCopy>::default(),
        specs,
        max_parallelism,
    )
}

pub fn run_batch_with<A: Archiver, P: Publisher>(
    executor: &JobExecutor<A, P>,
    specs: &[BackupJobSpec],
    max_parallelism: usize,
) -> Result<BatchResult> {
    validate_batch(specs, max_parallelism)?;

    let span = tracing::info_span!("batch", jobs = specs.len(), max_parallelism);
    let _enter = span.enter();
    tracing::info!("Dispatching {} backup job(s)", specs.len());

    let pool = ThreadPoolBuilder::new()
        .num_threads(max_parallelism)
        .thread_name(|i| format!("wuergback-job-{i}"))
        .build()?;

    let (outcome_tx, outcome_rx) = channel();
    pool.scope(|scope| {
        for spec in specs {
            let outcome_tx = outcome_tx.clone();
            scope.spawn(move |_| {
                let outcome = executor.run(spec);
                if let Err(e) = outcome_tx.send(outcome) {
                    tracing::error!("Lost outcome of {:?}", e.0.source_directory());
                }
            });
        }
    });
    drop(outcome_tx);

    let result = BatchResult::from_outcomes(outcome_rx.into_iter().collect_vec());
    let failed = result.failed().count();
    if failed == 0 {
        tracing::info!("All {} backup job(s) succeeded", result.outcomes.len());
    } else {
        tracing::error!(
            "{} of {} backup job(s) failed",
            failed,
            result.outcomes.len()
        );
    }
    Ok(result)
}

/// Checks done before anything is dispatched, any failure rejects the whole batch.
fn validate_batch(specs: &[BackupJobSpec], max_parallelism: usize) -> Result<()> {
    if specs.is_empty() {
        return Err(Error::NoJobs);
    }
    if max_parallelism == 0 {
        return Err(Error::InvalidParallelism(max_parallelism));
    }

    // Keyed case-insensitively, archives may land on a case-insensitive filesystem.
    let mut seen: HashMap<String, &PathBuf> = HashMap::new();
    for spec in specs {
        let base_name = archive_base_name(spec.source_directory())?;
        if let Some(first) = seen.get(&base_name.to_lowercase()) {
            return Err(Error::DuplicateSourceBaseName {
                base_name,
                first: first.to_path_buf(),
                second: spec.source_directory().clone(),
            });
        }
        seen.insert(base_name.to_lowercase(), spec.source_directory());
    }

    Ok(())
}
