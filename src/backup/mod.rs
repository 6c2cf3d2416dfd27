pub mod archiver;
pub mod backup_config;
pub mod batch;
pub mod integrity;
pub mod job;
pub mod publish;
pub mod redacted;
pub mod result_error;
pub mod selftest;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
