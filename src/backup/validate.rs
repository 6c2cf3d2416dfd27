//! Validation functions for configuration values.
//!
//! Used through `validator` custom attributes on `BackupConfig`.

use crate::backup::job::archive_base_name;
use itertools::Itertools;
use sanitize_filename::{is_sanitized, sanitize};
use std::path::{Path, PathBuf};
use validator::ValidationError;

pub fn validate_archive_format<S: AsRef<str>>(format: S) -> Result<(), ValidationError> {
    let format = format.as_ref();
    if format.is_empty() || format.contains('.') || !is_sanitized(format) {
        return Err(ValidationError::new("InvalidArchiveFormat").with_message(
            format!(
                "Invalid archive format {:?}, expected a bare extension like {:?}",
                format,
                sanitize(format.trim_matches('.'))
            )
            .into(),
        ));
    }

    Ok(())
}

/// Source directories are not required to exist here, that is checked per job.
pub fn validate_source_directories(dirs: &[PathBuf]) -> Result<(), ValidationError> {
    if dirs.is_empty() {
        return Err(ValidationError::new("NoSourceDirectories")
            .with_message("source_directories must not be empty".into()));
    }

    let unnamed = dirs
        .iter()
        .filter(|dir| archive_base_name(dir).is_err())
        .map(|dir| format!("{:?}", dir))
        .join(", ");
    if !unnamed.is_empty() {
        return Err(ValidationError::new("InvalidSourceDirectory").with_message(
            format!("source directories without a usable name: {unnamed}").into(),
        ));
    }

    Ok(())
}

pub fn validate_file_exist<P: AsRef<Path>>(path: P) -> Result<(), ValidationError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ValidationError::new("FileNotFound")
            .with_message(format!("{:?} is not an existing file", path).into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_archive_format() {
        assert!(validate_archive_format("7z").is_ok());
        assert!(validate_archive_format("zip").is_ok());
        assert!(validate_archive_format("").is_err());
        assert!(validate_archive_format(".7z").is_err());
        assert!(validate_archive_format("a/b").is_err());
    }

    #[test]
    fn test_validate_source_directories() {
        assert!(validate_source_directories(&[]).is_err());
        assert!(validate_source_directories(&[PathBuf::from("/data/docs")]).is_ok());

        let err = validate_source_directories(&[PathBuf::from("/data/docs"), PathBuf::from("/")])
            .unwrap_err();
        assert!(err.message.unwrap().contains("\"/\""));
    }

    #[test]
    fn test_validate_file_exist() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("7z");
        std::fs::write(&file, "").unwrap();

        assert!(validate_file_exist(&file).is_ok());
        assert!(validate_file_exist(temp_dir.path()).is_err());
        assert!(validate_file_exist(temp_dir.path().join("missing")).is_err());
    }
}
