//! Run pipeline shared by every entry point.
//!
//! ## One run, in order
//!
//! 1. Resolve the namespace's collection under the source root.
//! 2. Take the namespace's [`RunLock`].
//! 3. Discover managed objects and resolve each one's current version.
//! 4. For each whitelist pattern: select, stage, classify, then (unless
//!    `Noop` or dry run) transfer and commit.
//! 5. Clear the staging area and release the lock, whatever step 3-4 returned.

use std::path::Path;

use chrono::Utc;

use imgsync_core::{Namespace, PublishAction, PublishConfig, StagingConflictPolicy};

use crate::canonical::CanonicalReconciler;
use crate::discovery;
use crate::error::PublishError;
use crate::executor::PublishExecutor;
use crate::lock::RunLock;
use crate::report::{ArtifactOutcome, ConflictRecord, OutcomeStatus, RunReport};
use crate::selector::ArtifactSelector;
use crate::staging::{StageOutcome, StagingArea};
use crate::transfer::{self, Transfer};
use crate::version;

pub struct Pipeline {
    config: PublishConfig,
    selector: ArtifactSelector,
    transfer: Box<dyn Transfer>,
}

impl Pipeline {
    pub fn new(config: PublishConfig, transfer: Box<dyn Transfer>) -> Self {
        let selector = ArtifactSelector::from_config(&config);
        Self {
            config,
            selector,
            transfer,
        }
    }

    /// Pipeline using the transfer collaborator named in `config`.
    pub fn from_config(config: PublishConfig) -> Self {
        let transfer = transfer::from_kind(config.transfer);
        Self::new(config, transfer)
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Execute one run for `namespace` against `source_root`.
    pub fn run(
        &self,
        source_root: &Path,
        namespace: &Namespace,
        dry_run: bool,
    ) -> Result<RunReport, PublishError> {
        let collection = discovery::collection_root(source_root, namespace)?;
        let lock = RunLock::acquire(&self.config.lock_root, namespace)?;
        let staging = StagingArea::new(self.config.staging_dir(namespace));

        tracing::info!(
            namespace = %namespace,
            collection = %collection.display(),
            dry_run,
            "run started",
        );
        let outcome = self.run_locked(&collection, namespace, &staging, dry_run);

        let cleared = staging.clear();
        let released = lock.release();
        let cleanup = cleared.and(released);

        match outcome {
            Ok(report) => {
                cleanup?;
                tracing::info!(
                    namespace = %namespace,
                    added = report.added(),
                    updated = report.updated(),
                    unchanged = report.unchanged(),
                    skipped = report.skipped_objects.len(),
                    "run finished",
                );
                Ok(report)
            }
            Err(err) => {
                if let Err(cleanup_err) = cleanup {
                    tracing::warn!(error = %cleanup_err, "cleanup after failed run also failed");
                }
                Err(err)
            }
        }
    }

    fn run_locked(
        &self,
        collection: &Path,
        namespace: &Namespace,
        staging: &StagingArea,
        dry_run: bool,
    ) -> Result<RunReport, PublishError> {
        let leftover = staging.entry_count()?;
        if leftover > 0 {
            tracing::warn!(
                namespace = %namespace,
                entries = leftover,
                "discarding staging entries left by an interrupted run",
            );
            staging.clear()?;
        }

        let objects = discovery::discover_objects(collection, &self.config.identity_marker)?;
        if objects.is_empty() {
            return Err(PublishError::NoManagedObjects {
                root: collection.to_path_buf(),
                marker: self.config.identity_marker.clone(),
            });
        }

        let reconciler = CanonicalReconciler::new(self.config.canonical_dir(namespace));
        let executor = PublishExecutor::new(
            self.transfer.as_ref(),
            &self.config.destination_root,
            namespace,
        );
        let mut report = RunReport::new(namespace.clone(), dry_run);

        for root in objects {
            let object = version::load_object(root, &self.config.version_manifest)?;
            let candidates = self.selector.candidates(&object)?;
            let mut selected_any = false;

            for pattern in self.selector.whitelist() {
                let selection = match self.selector.select(&object, &candidates, pattern) {
                    Ok(selection) => selection,
                    Err(err) if err.is_recoverable() => {
                        tracing::debug!(error = %err, "no eligible artifact");
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                selected_any = true;

                match staging.stage(&selection.key, &selection.artifact) {
                    Ok(StageOutcome::Staged) => {}
                    Ok(StageOutcome::AlreadyStaged) => {
                        tracing::debug!(key = %selection.key, "artifact already handled this run");
                        continue;
                    }
                    Err(PublishError::StagingConflict { key, artifact, staged })
                        if self.config.staging_conflict == StagingConflictPolicy::Skip =>
                    {
                        tracing::warn!(
                            key = %key,
                            artifact = %artifact.display(),
                            staged = %staged.display(),
                            "staging conflict, skipping artifact",
                        );
                        report.conflicts.push(ConflictRecord { key, artifact, staged });
                        continue;
                    }
                    Err(err) => return Err(err),
                }

                let action = reconciler.classify(&object, &selection)?;
                let (status, destination) = match action {
                    PublishAction::Noop => {
                        tracing::debug!(key = %selection.key, "unchanged");
                        (OutcomeStatus::Unchanged, None)
                    }
                    _ if dry_run => {
                        tracing::info!(
                            key = %selection.key,
                            "[dry-run] would {action}: {}",
                            selection.artifact.display(),
                        );
                        (OutcomeStatus::Planned, executor.destination_path(action, &selection.key))
                    }
                    _ => {
                        let landed = executor.execute(&selection, action, &reconciler)?;
                        (OutcomeStatus::Published, landed)
                    }
                };

                report.artifacts.push(ArtifactOutcome {
                    object: object.root.clone(),
                    artifact: selection.artifact,
                    key: selection.key,
                    action,
                    status,
                    destination,
                });
            }

            if !selected_any {
                tracing::debug!(object = %object.root.display(), "no whitelisted artifact, object skipped");
                report.skipped_objects.push(object.root.clone());
            }
        }

        report.finished_at = Utc::now();
        Ok(report)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use imgsync_core::config::ConfigFile;
    use std::fs;
    use tempfile::TempDir;

    fn config(work: &Path) -> PublishConfig {
        PublishConfig::resolve(ConfigFile {
            destination_root: Some(work.join("dest")),
            volatile_root: Some(work.join("volatile")),
            canonical_root: Some(work.join("canonical")),
            lock_root: Some(work.join("locks")),
            ..Default::default()
        })
        .unwrap()
    }

    fn object(source: &Path, rel: &str, version: &str, files: &[&str]) {
        let root = source.join(rel);
        fs::create_dir_all(root.join(version).join("full")).unwrap();
        fs::write(root.join("0=dflat_1.0"), "").unwrap();
        fs::write(root.join("current.txt"), format!("{version}\n")).unwrap();
        for file in files {
            fs::write(root.join(version).join("full").join(file), *file).unwrap();
        }
    }

    #[test]
    fn object_without_match_is_skipped_not_fatal() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("src");
        object(&source, "ab/obj1", "v1", &["b1234567.DELIVERY.jp2"]);
        object(&source, "ab/obj2", "v1", &["only.tif"]);

        let pipeline = Pipeline::new(config(work.path()), Box::new(transfer::CopyTransfer));
        let ns = Namespace::parse("ab").unwrap();
        let report = pipeline.run(&source, &ns, false).unwrap();

        assert_eq!(report.added(), 1);
        assert_eq!(report.skipped_objects.len(), 1);
        assert!(report.skipped_objects[0].ends_with("ab/obj2"));
    }

    #[test]
    fn empty_collection_is_fatal_and_releases_lock() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("src");
        fs::create_dir_all(source.join("ab")).unwrap();

        let cfg = config(work.path());
        let lock_root = cfg.lock_root.clone();
        let pipeline = Pipeline::new(cfg, Box::new(transfer::CopyTransfer));
        let ns = Namespace::parse("ab").unwrap();

        let err = pipeline.run(&source, &ns, false).unwrap_err();
        assert!(matches!(err, PublishError::NoManagedObjects { .. }), "got: {err}");
        assert!(!imgsync_core::paths::lock_dir(&lock_root, &ns).exists());
    }

    #[test]
    fn leftover_staging_is_discarded() {
        let work = TempDir::new().unwrap();
        let source = work.path().join("src");
        object(&source, "ab/obj1", "v1", &["image.DELIVERY.jp2"]);

        let cfg = config(work.path());
        let ns = Namespace::parse("ab").unwrap();
        let stale = StagingArea::new(cfg.staging_dir(&ns));
        stale
            .stage(
                &imgsync_core::DestinationKey::from_base_name("image.jp2"),
                Path::new("/gone/v0/full/image.DELIVERY.jp2"),
            )
            .unwrap();

        let pipeline = Pipeline::new(cfg, Box::new(transfer::CopyTransfer));
        let report = pipeline.run(&source, &ns, false).unwrap();
        assert_eq!(report.added(), 1);
        assert!(report.conflicts.is_empty());
        assert_eq!(stale.entry_count().unwrap(), 0);
    }
}
