//! Error types for imgsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Required settings absent from every configuration layer.
    #[error("missing configuration: {}", .keys.join(", "))]
    MissingConfiguration { keys: Vec<&'static str> },

    #[error("invalid namespace '{namespace}': {reason}")]
    InvalidNamespace { namespace: String, reason: &'static str },

    /// A whitelist or ignore entry is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A policy value from the environment or CLI is not recognised.
    #[error("invalid value '{value}' for {field}")]
    InvalidPolicy { field: &'static str, value: String },

    /// `dirs::home_dir()` returned `None`, cannot locate `~/.imgsync/`.
    #[error("cannot determine home directory; set $HOME or pass --config")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
