//! Throwaway directory tree for trying out a backup run.

use crate::backup::job::ensure_dir;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use getset::Getters;
use std::path::{Path, PathBuf};

pub static SELFTEST_DIR_NAME: &str = "wuergback_test";
pub static SELFTEST_FILE_CONTENT: &str = "hello from wuergback";
static SELFTEST_SUBDIR_COUNT: usize = 3;

#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct SelfTestLayout {
    test_root: PathBuf,
    source_dir: PathBuf,
    target_dir: PathBuf,
}

/// Creates `<root>/wuergback_test` with a small source tree and an empty target.
///
/// Existing files are overwritten, so running it twice is harmless.
pub fn scaffold<P: AsRef<Path>>(root: P) -> Result<SelfTestLayout> {
    let test_root = root.as_ref().join(SELFTEST_DIR_NAME);
    let layout = SelfTestLayout {
        source_dir: test_root.join("wuergback_source"),
        target_dir: test_root.join("wuergback_target"),
        test_root,
    };

    ensure_dir(&layout.source_dir)?;
    ensure_dir(&layout.target_dir)?;
    for i in 1..=SELFTEST_SUBDIR_COUNT {
        let subdir = layout.source_dir.join(format!("wtestdir_{i}"));
        ensure_dir(&subdir)?;
        let test_file = subdir.join("test.txt");
        std::fs::write(&test_file, SELFTEST_FILE_CONTENT)
            .map_err(Error::from)
            .with_msg(format!("Failed to write {:?}", test_file))?;
    }

    tracing::info!("Self-test directory created at {:?}", layout.test_root);
    Ok(layout)
}
