//! Backup of a single source directory.
//!
//! A job walks through a fixed sequence of [`JobStage`]s and stops at the first
//! failing one. Whatever happens inside, the caller only ever gets a
//! [`JobOutcome`], so one broken job cannot take its siblings down.

use crate::backup::archiver::{ArchiveRequest, Archiver, SevenZip};
use crate::backup::function_path;
use crate::backup::integrity::{digest, verify_equal};
use crate::backup::publish::{FileCopy, Publisher};
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use bon::Builder;
use chrono::{DateTime, Local};
use derive_more::Display;
use function_name::named;
use getset::{CopyGetters, Getters};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Timestamp embedded in staged archive names, second resolution
static STAGED_TIME_FORMAT: &str = "%Y.%m.%d_%H-%M-%S";

/// Everything needed to back up one source directory
#[derive(Clone, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct BackupJobSpec {
    #[builder(into)]
    source_directory: PathBuf,
    #[builder(into)]
    staging_directory: PathBuf,
    #[builder(into)]
    publish_directory: PathBuf,
    #[builder(into)]
    secret: RedactedString,
    #[builder(into, default)]
    tool_options: Arc<Vec<String>>,
    #[builder(into)]
    tool_path: PathBuf,
    #[builder(into, default = String::from("7z"))]
    archive_format: String,
}

/// Where a job's archive lives while staged and once published
#[derive(Clone, Debug, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct ArchiveHandle {
    staged_path: PathBuf,
    published_path: PathBuf,
    created_at: DateTime<Local>,
}

impl ArchiveHandle {
    /// Staged name: `<base>_<YYYY.MM.DD_HH-MM-SS>.<ext>`, published name: `<base>.<ext>`.
    pub fn compute(spec: &BackupJobSpec, created_at: DateTime<Local>) -> Result<Self> {
        let base_name = archive_base_name(&spec.source_directory)?;
        let staged_name = format!(
            "{}_{}.{}",
            base_name,
            created_at.format(STAGED_TIME_FORMAT),
            spec.archive_format
        );
        let published_name = format!("{}.{}", base_name, spec.archive_format);

        Ok(Self {
            staged_path: spec.staging_directory.join(staged_name),
            published_path: spec.publish_directory.join(published_name),
            created_at,
        })
    }
}

/// Last path component of a source directory, used to name its archives.
pub fn archive_base_name(source_directory: &Path) -> Result<String> {
    source_directory
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::InvalidSourceName(source_directory.to_path_buf()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum JobStage {
    #[display("check source")]
    CheckSource,
    #[display("ensure staging directory")]
    EnsureStagingDir,
    #[display("compute archive names")]
    ComputeNames,
    #[display("create staged archive")]
    CreateStagedArchive,
    #[display("ensure publish directory")]
    EnsurePublishDir,
    #[display("publish copy")]
    PublishCopy,
    #[display("verify hashes")]
    VerifyHashes,
}

/// Final word on one job, created once and never changed.
///
/// `failed_stage` is `None` on success and when the job panicked.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct JobOutcome {
    #[getset(get = "pub")]
    source_directory: PathBuf,
    #[getset(get_copy = "pub")]
    success: bool,
    #[getset(get_copy = "pub")]
    verified: bool,
    #[getset(get = "pub")]
    message: String,
    #[getset(get_copy = "pub")]
    failed_stage: Option<JobStage>,
}

struct StageFailure {
    stage: JobStage,
    error: Error,
}

type StageResult<T> = std::result::Result<T, StageFailure>;

trait AtStage<T> {
    fn at_stage(self, stage: JobStage) -> StageResult<T>;
}

impl<T, E: Into<Error>> AtStage<T> for std::result::Result<T, E> {
    fn at_stage(self, stage: JobStage) -> StageResult<T> {
        self.map_err(|e| StageFailure {
            stage,
            error: e.into(),
        })
    }
}

/// Runs jobs with a given archiver and publisher.
///
/// Holds no per-job state, one executor can serve any number of jobs in parallel.
#[derive(Debug, Clone, Default)]
pub struct JobExecutor<A = SevenZip, P = FileCopy> {
    archiver: A,
    publisher: P,
}

impl<A: Archiver> JobExecutor<A, FileCopy> {
    pub fn new(archiver: A) -> Self {
        Self {
            archiver,
            publisher: FileCopy,
        }
    }
}

impl<A: Archiver, P: Publisher> JobExecutor<A, P> {
    pub fn with_publisher(archiver: A, publisher: P) -> Self {
        Self {
            archiver,
            publisher,
        }
    }

    #[cfg(test)]
    pub(crate) fn archiver(&self) -> &A {
        &self.archiver
    }

    pub fn run(&self, spec: &BackupJobSpec) -> JobOutcome {
        self.run_at(spec, Local::now())
    }

    /// Same as [`run`](Self::run) with the run timestamp fixed by the caller.
    pub fn run_at(&self, spec: &BackupJobSpec, now: DateTime<Local>) -> JobOutcome {
        let span = tracing::info_span!("job", source = ?spec.source_directory);
        let _enter = span.enter();

        let executed = panic::catch_unwind(AssertUnwindSafe(|| self.execute(spec, now)));
        match executed {
            Err(payload) => {
                let message = format!(
                    "Backup of {:?} panicked: {}",
                    spec.source_directory,
                    panic_message(payload.as_ref())
                );
                tracing::error!("{message}");
                JobOutcome {
                    source_directory: spec.source_directory.clone(),
                    success: false,
                    verified: false,
                    message,
                    failed_stage: None,
                }
            }
            Ok(Ok((handle, true))) => {
                tracing::info!("Hashes match, backup of {:?} complete", spec.source_directory);
                JobOutcome {
                    source_directory: spec.source_directory.clone(),
                    success: true,
                    verified: true,
                    message: format!(
                        "Backed up {:?} to {:?}",
                        spec.source_directory, handle.published_path
                    ),
                    failed_stage: None,
                }
            }
            Ok(Ok((handle, false))) => {
                let message = format!(
                    "Hash mismatch between {:?} and {:?}, published archive of {:?} is not trustworthy",
                    handle.staged_path, handle.published_path, spec.source_directory
                );
                tracing::warn!("{message}");
                JobOutcome {
                    source_directory: spec.source_directory.clone(),
                    success: false,
                    verified: false,
                    message,
                    failed_stage: Some(JobStage::VerifyHashes),
                }
            }
            Ok(Err(StageFailure { stage, error })) => {
                let message = format!(
                    "Backup of {:?} failed at stage '{}': {}",
                    spec.source_directory, stage, error
                );
                tracing::error!("{message}");
                JobOutcome {
                    source_directory: spec.source_directory.clone(),
                    success: false,
                    verified: false,
                    message,
                    failed_stage: Some(stage),
                }
            }
        }
    }

    fn execute(
        &self,
        spec: &BackupJobSpec,
        now: DateTime<Local>,
    ) -> StageResult<(ArchiveHandle, bool)> {
        check_source(&spec.source_directory).at_stage(JobStage::CheckSource)?;

        ensure_dir(&spec.staging_directory)
            .with_msg("Failed to create staging directory")
            .at_stage(JobStage::EnsureStagingDir)?;

        let handle = ArchiveHandle::compute(spec, now)
            .and_then(|handle| {
                if handle.staged_path.exists() {
                    Err(Error::DuplicateStagedArchive(handle.staged_path.clone()))
                } else {
                    Ok(handle)
                }
            })
            .at_stage(JobStage::ComputeNames)?;
        tracing::info!(
            staged = ?handle.staged_path,
            published = ?handle.published_path,
            "Archive names computed"
        );

        self.create_staged_archive(spec, &handle)
            .at_stage(JobStage::CreateStagedArchive)?;

        ensure_dir(&spec.publish_directory)
            .with_msg("Failed to create publish directory")
            .at_stage(JobStage::EnsurePublishDir)?;
        if handle.published_path.exists() {
            tracing::info!(
                "Previous archive {:?} will be overwritten",
                handle.published_path
            );
        } else {
            tracing::info!("New publish target {:?}", handle.published_path);
        }

        self.publisher
            .publish(&handle.staged_path, &handle.published_path)
            .at_stage(JobStage::PublishCopy)?;
        tracing::info!("Published {:?}", handle.published_path);

        let verified = verify_hashes(&handle).at_stage(JobStage::VerifyHashes)?;
        Ok((handle, verified))
    }

    #[named]
    fn create_staged_archive(&self, spec: &BackupJobSpec, handle: &ArchiveHandle) -> Result<()> {
        let request = ArchiveRequest::builder()
            .tool_path(&spec.tool_path)
            .source_directory(&spec.source_directory)
            .destination_path(&handle.staged_path)
            .secret(&spec.secret)
            .tool_options(spec.tool_options.as_slice())
            .build();

        match self.archiver.create_archive(&request) {
            Ok(()) => {
                tracing::info!("Created staged archive {:?}", handle.staged_path);
                Ok(())
            }
            Err(e) => {
                remove_partial_archive(&handle.staged_path);
                Err::<(), _>(Error::from(e))
                    .with_debug_object_and_fn_name(handle.staged_path.clone(), function_path!())
            }
        }
    }
}

/// Runs one job with the 7-Zip archiver and a plain file copy.
pub fn run_job(spec: &BackupJobSpec) -> JobOutcome {
    JobExecutor::<SevenZip, FileCopy>::default().run(spec)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn check_source(source_directory: &Path) -> Result<()> {
    if source_directory.is_dir() {
        Ok(())
    } else {
        Err(Error::SourceNotADirectory(source_directory.to_path_buf()))
    }
}

/// Creates `dir` and its parents, an existing directory counts as success.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
        .map_err(Error::from)
        .with_msg(format!("Cannot create {:?}", dir))?;
    tracing::info!("Created directory {:?}", dir);
    Ok(())
}

fn remove_partial_archive(staged_path: &Path) {
    if !staged_path.exists() {
        return;
    }
    match std::fs::remove_file(staged_path) {
        Ok(()) => tracing::info!("Removed partial archive {:?}", staged_path),
        Err(e) => tracing::warn!("Failed to remove partial archive {:?}: {e}", staged_path),
    }
}

fn verify_hashes(handle: &ArchiveHandle) -> Result<bool> {
    let staged = digest(&handle.staged_path)?;
    let published = digest(&handle.published_path)?;
    tracing::debug!(%staged, %published, "Computed digests");
    Ok(verify_equal(&staged, &published))
}
