//! Canonical slot classification and commit.
//!
//! A canonical slot is a symlink at `<canonical>/<ns>/<shard>/<base>` whose
//! target is the source artifact last published under that key. Classifying a
//! selection against its slot decides the publish action:
//!
//! | slot                                          | action                 |
//! |-----------------------------------------------|------------------------|
//! | absent                                        | `Add`                  |
//! | target == artifact                            | `Noop`                 |
//! | target differs, contains the current version  | `VersionMismatch` error |
//! | target differs, lacks the current version     | `Update`               |
//!
//! Slots are only written by [`CanonicalReconciler::commit`], which the
//! executor calls after a transfer has succeeded.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use imgsync_core::{DestinationKey, ManagedObject, PublishAction, VersionToken};

use crate::error::{io_err, PublishError};
use crate::link;
use crate::selector::Selection;

/// State of a canonical slot relative to a selected artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Absent,
    SameTarget,
    /// Target differs but already names the current version.
    Stale { target: PathBuf },
    /// Target differs and predates the current version.
    Updateable { target: PathBuf },
}

#[derive(Debug, Clone)]
pub struct CanonicalReconciler {
    root: PathBuf,
}

impl CanonicalReconciler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slot_path(&self, key: &DestinationKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Current target of the slot for `key`, or `None` if there is no slot.
    ///
    /// Dangling symlinks still count as existing slots.
    pub fn slot_target(&self, key: &DestinationKey) -> Result<Option<PathBuf>, PublishError> {
        let slot = self.slot_path(key);
        match fs::symlink_metadata(&slot) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = fs::read_link(&slot).map_err(|e| io_err(&slot, e))?;
                Ok(Some(target))
            }
            Ok(_) => Err(PublishError::CanonicalSlotNotSymlink { slot }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(&slot, err)),
        }
    }

    pub fn slot_state(
        &self,
        object: &ManagedObject,
        selection: &Selection,
    ) -> Result<SlotState, PublishError> {
        let Some(target) = self.slot_target(&selection.key)? else {
            return Ok(SlotState::Absent);
        };
        if target == selection.artifact {
            return Ok(SlotState::SameTarget);
        }
        if names_version(&target, &object.version) {
            Ok(SlotState::Stale { target })
        } else {
            Ok(SlotState::Updateable { target })
        }
    }

    /// Decide the publish action for `selection`.
    ///
    /// Fails with [`PublishError::VersionMismatch`] when the slot claims the
    /// current version but points elsewhere.
    pub fn classify(
        &self,
        object: &ManagedObject,
        selection: &Selection,
    ) -> Result<PublishAction, PublishError> {
        match self.slot_state(object, selection)? {
            SlotState::Absent => Ok(PublishAction::Add),
            SlotState::SameTarget => Ok(PublishAction::Noop),
            SlotState::Stale { target } => Err(PublishError::VersionMismatch {
                object: object.root.clone(),
                version: object.version.clone(),
                key: selection.key.clone(),
                slot_target: target,
                artifact: selection.artifact.clone(),
            }),
            SlotState::Updateable { target } => {
                if !target.starts_with(&object.root) {
                    tracing::warn!(
                        key = %selection.key,
                        previous = %target.display(),
                        object = %object.root.display(),
                        "canonical slot retargeted across objects",
                    );
                }
                Ok(PublishAction::Update)
            }
        }
    }

    /// Point the slot for `key` at `artifact`.
    ///
    /// `Add` creates the slot and fails if one appeared in the meantime;
    /// `Update` replaces it atomically; `Noop` does nothing.
    pub fn commit(
        &self,
        key: &DestinationKey,
        artifact: &Path,
        action: PublishAction,
    ) -> Result<(), PublishError> {
        let slot = self.slot_path(key);
        match action {
            PublishAction::Noop => return Ok(()),
            PublishAction::Add => link::create_symlink(artifact, &slot)?,
            PublishAction::Update => link::replace_symlink(artifact, &slot)?,
        }
        tracing::info!(key = %key, action = %action, target = %artifact.display(), "canonical slot committed");
        Ok(())
    }

    /// Number of slots in the tree.
    pub fn slot_count(&self) -> Result<usize, PublishError> {
        if !self.root.exists() {
            return Ok(0);
        }
        let mut count = 0;
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|err| io_err(&self.root, err.into()))?;
            if entry.file_type().is_symlink() {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Whether the text of `target` contains `version` anywhere.
fn names_version(target: &Path, version: &VersionToken) -> bool {
    target.as_os_str().to_string_lossy().contains(version.as_str())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn object(version: &str) -> ManagedObject {
        ManagedObject {
            root: PathBuf::from("/src/ab/obj1"),
            version: VersionToken::from(version),
        }
    }

    fn selection(version: &str) -> Selection {
        Selection {
            artifact: PathBuf::from(format!("/src/ab/obj1/{version}/full/abc.DELIVERY.jp2")),
            key: DestinationKey::from_base_name("abc.jp2"),
            pattern: "DELIVERY".to_string(),
        }
    }

    #[test]
    fn absent_slot_is_add_then_noop_after_commit() {
        let dir = TempDir::new().unwrap();
        let reconciler = CanonicalReconciler::new(dir.path());
        let sel = selection("v1");

        assert_eq!(reconciler.classify(&object("v1"), &sel).unwrap(), PublishAction::Add);
        reconciler.commit(&sel.key, &sel.artifact, PublishAction::Add).unwrap();
        assert_eq!(reconciler.classify(&object("v1"), &sel).unwrap(), PublishAction::Noop);
        assert_eq!(reconciler.slot_count().unwrap(), 1);
    }

    #[test]
    fn older_target_is_update() {
        let dir = TempDir::new().unwrap();
        let reconciler = CanonicalReconciler::new(dir.path());
        let old = selection("v1");
        reconciler.commit(&old.key, &old.artifact, PublishAction::Add).unwrap();

        let new = selection("v2");
        assert_eq!(reconciler.classify(&object("v2"), &new).unwrap(), PublishAction::Update);
        reconciler.commit(&new.key, &new.artifact, PublishAction::Update).unwrap();
        assert_eq!(reconciler.slot_target(&new.key).unwrap(), Some(new.artifact.clone()));
    }

    #[test]
    fn target_with_current_version_but_different_path_is_mismatch() {
        let dir = TempDir::new().unwrap();
        let reconciler = CanonicalReconciler::new(dir.path());
        let sel = selection("v2");
        let other = PathBuf::from("/src/ab/obj1/v2/full/abc.OLD.jp2");
        reconciler.commit(&sel.key, &other, PublishAction::Add).unwrap();

        let err = reconciler.classify(&object("v2"), &sel).unwrap_err();
        match err {
            PublishError::VersionMismatch { slot_target, .. } => assert_eq!(slot_target, other),
            other => panic!("expected VersionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn version_is_matched_anywhere_in_target() {
        let target = Path::new("/src/ab/obj1/v10/full/abc.DELIVERY.jp2");
        assert!(names_version(target, &VersionToken::from("v1")));
        assert!(names_version(target, &VersionToken::from("v10")));
        assert!(!names_version(target, &VersionToken::from("v2")));
    }

    #[test]
    fn version_inside_longer_component_is_mismatch() {
        let dir = TempDir::new().unwrap();
        let reconciler = CanonicalReconciler::new(dir.path());
        let sel = selection("v2");
        let candidate = PathBuf::from("/src/ab/obj1/v2-rc/full/abc.DELIVERY.jp2");
        reconciler.commit(&sel.key, &candidate, PublishAction::Add).unwrap();

        let err = reconciler.classify(&object("v2"), &sel).unwrap_err();
        assert!(matches!(err, PublishError::VersionMismatch { .. }), "got: {err}");
    }

    #[test]
    fn dangling_slot_still_exists() {
        let dir = TempDir::new().unwrap();
        let reconciler = CanonicalReconciler::new(dir.path());
        let sel = selection("v1");
        reconciler
            .commit(&sel.key, Path::new("/nowhere/v0/gone.jp2"), PublishAction::Add)
            .unwrap();
        assert_eq!(reconciler.classify(&object("v1"), &sel).unwrap(), PublishAction::Update);
    }

    #[test]
    fn regular_file_in_slot_is_rejected() {
        let dir = TempDir::new().unwrap();
        let reconciler = CanonicalReconciler::new(dir.path());
        let sel = selection("v1");
        let slot = reconciler.slot_path(&sel.key);
        fs::create_dir_all(slot.parent().unwrap()).unwrap();
        fs::write(&slot, "not a link").unwrap();

        let err = reconciler.classify(&object("v1"), &sel).unwrap_err();
        assert!(matches!(err, PublishError::CanonicalSlotNotSymlink { .. }), "got: {err}");
    }
}
