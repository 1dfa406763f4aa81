//! Tracing subscriber setup.
//!
//! Filter comes from `IMGSYNC_LOG`, then `RUST_LOG`, default `info`. Events
//! go to stderr and, when a log file is configured, are appended to it
//! without ANSI colour.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::log_rotation::{rotate_if_needed, MAX_LOG_BYTES, MAX_ROTATED_FILES};

pub const ENV_LOG: &str = "IMGSYNC_LOG";

/// Install the global subscriber. A second call is a no-op.
pub fn init(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_env(ENV_LOG)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let mut rotated = None;
    let mut open_error = None;
    let file_layer = log_file.and_then(|path| {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(err) = std::fs::create_dir_all(parent) {
                open_error = Some(err);
                return None;
            }
        }
        rotated = Some(rotate_if_needed(path, MAX_LOG_BYTES, MAX_ROTATED_FILES));
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            ),
            Err(err) => {
                open_error = Some(err);
                None
            }
        }
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if let Some(path) = log_file {
        match (rotated, open_error) {
            (_, Some(err)) => {
                tracing::warn!(path = %path.display(), error = %err, "log file unavailable")
            }
            (Some(Ok(true)), None) => tracing::info!(path = %path.display(), "log file rotated"),
            (Some(Err(err)), None) => {
                tracing::warn!(path = %path.display(), error = %err, "log rotation failed")
            }
            _ => {}
        }
    }
}
