use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use filetime::FileTime;
use std::path::Path;

/// Moves a finished archive from staging to its durable location.
pub trait Publisher: Send + Sync {
    fn publish(&self, staged: &Path, published: &Path) -> Result<()>;
}

/// Plain file copy that also carries over access and modification times.
///
/// An existing file at the published path is overwritten.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCopy;

impl Publisher for FileCopy {
    fn publish(&self, staged: &Path, published: &Path) -> Result<()> {
        let bytes = std::fs::copy(staged, published)
            .map_err(Error::from)
            .with_msg(format!("Failed to copy {:?} to {:?}", staged, published))?;
        copy_file_times(staged, published)
            .with_msg(format!("Failed to set file times on {:?}", published))?;
        tracing::debug!("Copied {bytes} bytes to {:?}", published);
        Ok(())
    }
}

fn copy_file_times(from: &Path, to: &Path) -> Result<()> {
    let metadata = std::fs::metadata(from)?;
    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(to, atime, mtime)?;
    Ok(())
}
