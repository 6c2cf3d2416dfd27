use crate::backup::archiver::ToolError;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use itertools::Itertools;
use std::fmt::Debug;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    ThreadPoolBuildError(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error("Staged archive already exists: {0:?}")]
    DuplicateStagedArchive(PathBuf),
    #[error("Source is not an existing directory: {0:?}")]
    SourceNotADirectory(PathBuf),
    #[error("Cannot derive an archive name from source directory {0:?}")]
    InvalidSourceName(PathBuf),
    #[error("No backup jobs to run")]
    NoJobs,
    #[error("Invalid max parallelism {0}, must be at least 1")]
    InvalidParallelism(usize),
    #[error("Source directories {first:?} and {second:?} share the base name {base_name:?}")]
    DuplicateSourceBaseName {
        base_name: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("{failed} of {total} backup job(s) failed, see log for details: {}", sources.iter().map(|s| format!("{s:?}")).join(", "))]
    BatchFailed {
        failed: usize,
        total: usize,
        sources: Vec<PathBuf>,
    },
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{:?} {} failed:\n{}", obj_debug, fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithDebugObjAndFnName {
        error: Box<Error>,
        obj_debug: Box<dyn Debug + Send + Sync>,
        fn_name: String,
    },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>, O: Debug + Send + Sync + 'static> WithDebugObjectAndFnName<S, O> for Error {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        Error::WithDebugObjAndFnName {
            error: Box::new(self),
            obj_debug: Box::new(obj),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl From<Vec<Error>> for Error {
    fn from(errors: Vec<Error>) -> Self {
        if errors.is_empty() {
            panic!("Should not create lots of errors when error is empty")
        }
        Self::LotsOfError(errors.into_iter().flat_map(|e| e.into_iter()).collect_vec())
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(|e| e.into_iter())),
            e => Box::new(std::iter::once(e)),
        }
    }

    /// Innermost error, skipping message and function-name wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::WithMsg { error, .. } => error.root(),
            Error::WithDebugObjAndFnName { error, .. } => error.root(),
            e => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error);

        match error {
            Error::Io(_) => (),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_with_msg() {
        let error = Error::NoJobs.with_msg("Custom message");

        match error {
            Error::WithMsg { msg, .. } => assert_eq!(msg, "Custom message"),
            _ => panic!("Expected WithMsg error"),
        }
    }

    #[test]
    fn test_error_with_debug_object_and_fn_name() {
        let error = Error::NoJobs.with_debug_object_and_fn_name("test_object", "test_function");

        match error {
            Error::WithDebugObjAndFnName { fn_name, .. } => assert_eq!(fn_name, "test_function"),
            _ => panic!("Expected WithDebugObjAndFnName error"),
        }
    }

    #[test]
    fn test_error_from_vec() {
        let errors = vec![
            Error::NoJobs,
            Error::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "error2")),
        ];

        match Error::from(errors) {
            Error::LotsOfError(error_vec) => assert_eq!(error_vec.len(), 2),
            _ => panic!("Expected LotsOfError"),
        }
    }

    #[test]
    #[should_panic(expected = "Should not create lots of errors when error is empty")]
    fn test_error_from_empty_vec_panics() {
        let errors: Vec<Error> = vec![];
        let _error = Error::from(errors);
    }

    #[test]
    fn test_root_skips_wrappers() {
        let error = Error::DuplicateStagedArchive(PathBuf::from("/tmp/a.7z"))
            .with_msg("outer")
            .with_debug_object_and_fn_name(42, "run");
        assert!(matches!(error.root(), Error::DuplicateStagedArchive(_)));
    }

    #[test]
    fn test_error_with_msg_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error).with_msg("Operation failed");
        let error_str = error.to_string();

        assert!(error_str.contains("Operation failed"));
        assert!(error_str.contains("  file not found"));
    }

    #[test]
    fn test_batch_failed_display() {
        let error = Error::BatchFailed {
            failed: 1,
            total: 3,
            sources: vec![PathBuf::from("/data/docs")],
        };
        let error_str = error.to_string();
        assert!(error_str.contains("1 of 3"));
        assert!(error_str.contains("/data/docs"));
    }
}
