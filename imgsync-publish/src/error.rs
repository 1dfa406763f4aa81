//! Error types for imgsync-publish.

use std::path::PathBuf;

use thiserror::Error;

use imgsync_core::{ConfigError, DestinationKey, Namespace, VersionToken};

use crate::lock::LockInfo;

/// All errors that can arise from a publish run.
///
/// Only [`PublishError::NoEligibleArtifact`] is recovered locally; every
/// other variant terminates the run.
#[derive(Debug, Error)]
pub enum PublishError {
    /// An error resolving configuration or validating a namespace.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The source root or the namespace's collection does not exist.
    #[error("invalid source argument: {path} does not exist")]
    InvalidSourceArgument { path: PathBuf },

    #[error("no managed objects (identity marker '{marker}') found under {root}")]
    NoManagedObjects { root: PathBuf, marker: String },

    #[error("missing version manifest for object {object}: {manifest} not found")]
    MissingVersionManifest { object: PathBuf, manifest: PathBuf },

    #[error("version manifest {manifest} has no non-empty line")]
    EmptyVersionManifest { manifest: PathBuf },

    #[error("version token '{token}' in {manifest} is not a single path component")]
    InvalidVersionToken { manifest: PathBuf, token: String },

    /// No candidate under the object's version directory matches the pattern.
    #[error("no artifact in {object} (version {version}) matches '{pattern}'")]
    NoEligibleArtifact {
        object: PathBuf,
        version: VersionToken,
        pattern: String,
    },

    #[error("pattern '{pattern}' matches {} artifacts in {object} (version {version}): {}",
        .matches.len(), join_paths(.matches))]
    AmbiguousArtifactMatch {
        object: PathBuf,
        version: VersionToken,
        pattern: String,
        matches: Vec<PathBuf>,
    },

    /// The slot target claims the current version but is not the selected artifact.
    #[error(
        "version mismatch for object {object}: manifest declares '{version}' but canonical \
         slot {key} already targets {slot_target}, not {artifact}"
    )]
    VersionMismatch {
        object: PathBuf,
        version: VersionToken,
        key: DestinationKey,
        slot_target: PathBuf,
        artifact: PathBuf,
    },

    #[error("canonical slot {slot} exists but is not a symlink")]
    CanonicalSlotNotSymlink { slot: PathBuf },

    /// Two distinct artifacts staged under one destination key in the same run.
    #[error("staging conflict at {key}: {artifact} collides with already staged {staged}")]
    StagingConflict {
        key: DestinationKey,
        artifact: PathBuf,
        staged: PathBuf,
    },

    #[error("transfer of {artifact} to {destination} failed: {reason}")]
    TransferFailure {
        artifact: PathBuf,
        destination: PathBuf,
        reason: String,
    },

    #[error("run already in progress for namespace '{namespace}' (lock {lock_dir}){}",
        holder_suffix(.holder))]
    LockContention {
        namespace: Namespace,
        lock_dir: PathBuf,
        holder: Option<LockInfo>,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Lock marker serialization error.
    #[error("lock marker JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PublishError {
    /// Whether the pipeline may skip the affected object/pattern and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PublishError::NoEligibleArtifact { .. })
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn holder_suffix(holder: &Option<LockInfo>) -> String {
    match holder {
        Some(info) => format!(", held by pid {} since {}", info.pid, info.started_at.to_rfc3339()),
        None => String::new(),
    }
}

/// Convenience constructor for [`PublishError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PublishError {
    PublishError::Io {
        path: path.into(),
        source,
    }
}
