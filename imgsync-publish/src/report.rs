//! Per-run outcome record.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use imgsync_core::{DestinationKey, Namespace, PublishAction};

/// What happened to one selected artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// Transferred and committed.
    Published,
    /// Dry run: would have been transferred and committed.
    Planned,
    /// Canonical slot already pointed at the artifact.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactOutcome {
    pub object: PathBuf,
    pub artifact: PathBuf,
    #[serde(serialize_with = "display")]
    pub key: DestinationKey,
    pub action: PublishAction,
    pub status: OutcomeStatus,
    /// Bucket path the artifact landed in, for published artifacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
}

/// A staging collision skipped under the `skip` conflict policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRecord {
    #[serde(serialize_with = "display")]
    pub key: DestinationKey,
    pub artifact: PathBuf,
    pub staged: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(serialize_with = "display")]
    pub namespace: Namespace,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub artifacts: Vec<ArtifactOutcome>,
    /// Objects for which no whitelist pattern matched anything.
    pub skipped_objects: Vec<PathBuf>,
    pub conflicts: Vec<ConflictRecord>,
}

impl RunReport {
    pub(crate) fn new(namespace: Namespace, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            namespace,
            started_at: now,
            finished_at: now,
            dry_run,
            artifacts: Vec::new(),
            skipped_objects: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    fn count(&self, action: PublishAction) -> usize {
        self.artifacts.iter().filter(|a| a.action == action).count()
    }

    pub fn added(&self) -> usize {
        self.count(PublishAction::Add)
    }

    pub fn updated(&self) -> usize {
        self.count(PublishAction::Update)
    }

    pub fn unchanged(&self) -> usize {
        self.count(PublishAction::Noop)
    }

    /// Artifacts actually transferred in this run.
    pub fn transferred(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|a| a.status == OutcomeStatus::Published)
            .count()
    }
}

fn display<T: std::fmt::Display, S: serde::Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}
