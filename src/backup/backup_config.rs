use crate::backup::job::{ensure_dir, BackupJobSpec};
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::validate::{
    validate_archive_format, validate_file_exist, validate_source_directories,
};
use bon::Builder;
use getset::Getters;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use validator::Validate;

pub static DEFAULT_CONFIG_NAME: &str = "wuergback";
static DEFAULT_CONFIG_EXT: &str = "json";
static YAML_CONFIG_EXTS: [&str; 2] = ["yml", "yaml"];

static DEFAULT_SOURCE_DIR_NAME: &str = "wuergback";
static DEFAULT_LOCAL_BUFFER_DIR_NAME: &str = "wuergback-sicherungen";
static DEFAULT_BACKUP_DIR_WIN: &str = r"H:\wuergback_target";
static DEFAULT_BACKUP_DIR_LINUX: &str = "/home/austausch/wuergback_target";
static DEFAULT_PASSWORD: &str = "geheim";
static DEFAULT_PARAMETER_7Z: [&str; 1] = ["-mhe=on"];
static DEFAULT_EXE_7Z_WIN: &str = r"C:\pfadname\7z.exe";
static DEFAULT_EXE_7Z_LINUX: &str = "/usr/bin/7z";
static DEFAULT_ARCHIVE_FORMAT: &str = "7z";

static README_FILE_NAME: &str = "wuergback.readme";
static README_CONTENT: &str = "
This is the wuergback backup utility.
It backs up the specified directories to the configured backup directory using 7zip compression.
To configure, edit the wuergback.json file.
";

/// One backup configuration entry, read from a JSON or YAML file
#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupConfig {
    #[validate(custom(function = validate_source_directories))]
    #[builder(into)]
    source_directories: Vec<PathBuf>,
    #[serde(default = "default_local_buffer_dir")]
    #[builder(into, default = default_local_buffer_dir())]
    local_buffer_source_directory: PathBuf,
    #[serde(default = "default_backup_dir_win")]
    #[builder(into, default = default_backup_dir_win())]
    backup_directory_win: PathBuf,
    #[serde(default = "default_backup_dir_linux")]
    #[builder(into, default = default_backup_dir_linux())]
    backup_directory_linux: PathBuf,
    #[validate(nested)]
    #[builder(into)]
    password: RedactedString,
    #[serde(default = "default_parameter7z")]
    #[builder(into, default = default_parameter7z())]
    parameter7z: Vec<String>,
    #[validate(custom(function = validate_file_exist))]
    #[builder(into)]
    exe7z_path: PathBuf,
    #[serde(default = "default_archive_format")]
    #[validate(custom(function = validate_archive_format))]
    #[builder(into, default = default_archive_format())]
    archive_format: String,
    /// Kept for compatibility with older files, logging is set up from the command line.
    log_directory: Option<PathBuf>,
}

fn default_source_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_SOURCE_DIR_NAME)
}

fn default_local_buffer_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_LOCAL_BUFFER_DIR_NAME)
}

fn default_backup_dir_win() -> PathBuf {
    DEFAULT_BACKUP_DIR_WIN.into()
}

fn default_backup_dir_linux() -> PathBuf {
    DEFAULT_BACKUP_DIR_LINUX.into()
}

fn default_parameter7z() -> Vec<String> {
    DEFAULT_PARAMETER_7Z.iter().map(|p| p.to_string()).collect_vec()
}

fn default_exe7z_path() -> PathBuf {
    if cfg!(windows) {
        DEFAULT_EXE_7Z_WIN.into()
    } else {
        DEFAULT_EXE_7Z_LINUX.into()
    }
}

fn default_archive_format() -> String {
    DEFAULT_ARCHIVE_FORMAT.to_string()
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| YAML_CONFIG_EXTS.contains(&ext))
}

impl BackupConfig {
    /// Appends `.json` unless the name already carries a json or yaml extension.
    pub fn resolve_path<P: AsRef<Path>>(name: P) -> PathBuf {
        let path = name.as_ref();
        let known_ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == DEFAULT_CONFIG_EXT || YAML_CONFIG_EXTS.contains(&ext));
        if known_ext {
            return path.to_path_buf();
        }

        let mut with_ext = OsString::from(path.as_os_str());
        with_ext.push(".");
        with_ext.push(DEFAULT_CONFIG_EXT);
        with_ext.into()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(Error::from)
            .with_msg(format!("Cannot open config: {:?}", path))?;

        let config: Self = if is_yaml(path) {
            serde_yml::from_reader(file).map_err(Error::from)
        } else {
            serde_json::from_reader(file).map_err(Error::from)
        }
        .with_msg(format!("Parse config failed: {:?}", path))?;

        config
            .validate()
            .map_err(Error::from)
            .with_msg(format!("Config validation failed: {:?}", path))?;

        Ok(config)
    }

    pub fn default_for_platform() -> Self {
        BackupConfig::builder()
            .source_directories(vec![default_source_dir()])
            .password(DEFAULT_PASSWORD)
            .exe7z_path(default_exe7z_path())
            .build()
    }

    /// Writes the file, the password in cleartext, so it can be loaded again.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut value = serde_json::to_value(self)?;
        value["password"] = serde_json::Value::from(self.password.secret().as_str());

        let mut writer = File::create_new(path)
            .map(BufWriter::new)
            .map_err(Error::from)
            .with_msg(format!("Cannot create config: {:?}", path))?;
        if is_yaml(path) {
            serde_yml::to_writer(&mut writer, &value)?;
        } else {
            serde_json::to_writer_pretty(&mut writer, &value)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes a platform default config and prepares its source directory.
    ///
    /// Fails if `path` already exists.
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::default_for_platform();
        config.write(path.as_ref())?;
        if let Some(source_dir) = config.source_directories.first() {
            create_default_structure(source_dir)?;
        }
        tracing::info!(
            "Default configuration written to {:?}, please review it",
            path.as_ref()
        );
        Ok(config)
    }

    /// The backup directory for the platform this runs on.
    pub fn publish_directory(&self) -> &Path {
        if cfg!(windows) {
            &self.backup_directory_win
        } else {
            &self.backup_directory_linux
        }
    }

    pub fn job_specs(&self) -> Vec<BackupJobSpec> {
        let tool_options = Arc::new(self.parameter7z.clone());
        self.source_directories
            .iter()
            .map(|source| {
                BackupJobSpec::builder()
                    .source_directory(source)
                    .staging_directory(&self.local_buffer_source_directory)
                    .publish_directory(self.publish_directory())
                    .secret(self.password.clone())
                    .tool_options(tool_options.clone())
                    .tool_path(&self.exe7z_path)
                    .archive_format(&self.archive_format)
                    .build()
            })
            .collect_vec()
    }
}

/// Source directory with a readme explaining what it is for.
pub fn create_default_structure<P: AsRef<Path>>(source_dir: P) -> Result<()> {
    let source_dir = source_dir.as_ref();
    ensure_dir(source_dir)?;
    let readme = source_dir.join(README_FILE_NAME);
    std::fs::write(&readme, README_CONTENT)
        .map_err(Error::from)
        .with_msg(format!("Failed to write {:?}", readme))
}
