//! Two-severity logging on top of the `log` facade.
//!
//! `event!` is user-facing progress and outcome reporting; `detail!` is
//! internal diagnostics. Both are fire-and-forget.

use std::fs::OpenOptions;
use std::path::Path;

pub const EVENT_TARGET: &str = "filesweep::event";
pub const DETAIL_TARGET: &str = "filesweep::detail";

macro_rules! event {
    (warn, $($arg:tt)+) => {
        log::warn!(target: $crate::logging::EVENT_TARGET, $($arg)+)
    };
    ($($arg:tt)+) => {
        log::info!(target: $crate::logging::EVENT_TARGET, $($arg)+)
    };
}

macro_rules! detail {
    ($($arg:tt)+) => {
        log::debug!(target: $crate::logging::DETAIL_TARGET, $($arg)+)
    };
}

pub(crate) use detail;
pub(crate) use event;

/// Install the `env_logger` backend for the binary.
///
/// `RUST_LOG` still wins over the defaults. When `log_file` is given the
/// output goes there instead of stderr.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<(), String> {
    let default_level = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(default_level);
    let mut builder = env_logger::Builder::from_env(env);
    builder.format_timestamp_secs().format_module_path(false);

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder
        .try_init()
        .map_err(|e| format!("Failed to install logger: {}", e))
}
