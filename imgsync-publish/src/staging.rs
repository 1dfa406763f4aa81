//! Per-run staging area.
//!
//! Every selected artifact is staged as `<volatile>/<ns>/<shard>/<base>`
//! pointing at its source. Two different artifacts landing on the same key
//! within one run is a collision; re-staging the same artifact is harmless.
//! The area lives for one run and is cleared at its end, success or failure.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use imgsync_core::DestinationKey;

use crate::error::{io_err, PublishError};
use crate::link;

/// Result of a successful [`StagingArea::stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Staged,
    /// The same artifact was already staged under this key.
    AlreadyStaged,
}

#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record `artifact` under `key`, failing with
    /// [`PublishError::StagingConflict`] if a different artifact holds it.
    pub fn stage(&self, key: &DestinationKey, artifact: &Path) -> Result<StageOutcome, PublishError> {
        let entry = self.root.join(key.relative_path());
        match fs::symlink_metadata(&entry) {
            Ok(meta) => {
                let staged = if meta.file_type().is_symlink() {
                    fs::read_link(&entry).map_err(|e| io_err(&entry, e))?
                } else {
                    entry.clone()
                };
                if staged == artifact {
                    return Ok(StageOutcome::AlreadyStaged);
                }
                Err(PublishError::StagingConflict {
                    key: key.clone(),
                    artifact: artifact.to_path_buf(),
                    staged,
                })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                link::create_symlink(artifact, &entry)?;
                tracing::debug!(key = %key, artifact = %artifact.display(), "staged");
                Ok(StageOutcome::Staged)
            }
            Err(err) => Err(io_err(&entry, err)),
        }
    }

    /// Number of staged entries currently on disk.
    pub fn entry_count(&self) -> Result<usize, PublishError> {
        if !self.root.exists() {
            return Ok(0);
        }
        let mut count = 0;
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|err| io_err(&self.root, err.into()))?;
            if !entry.file_type().is_dir() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Remove the whole staging directory.
    pub fn clear(&self) -> Result<(), PublishError> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err(&self.root, err)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stage_then_restage_same_artifact() {
        let dir = TempDir::new().unwrap();
        let area = StagingArea::new(dir.path().join("ns"));
        let key = DestinationKey::from_base_name("image.jp2");
        let artifact = Path::new("/src/obj1/v1/full/image.DELIVERY.jp2");

        assert_eq!(area.stage(&key, artifact).unwrap(), StageOutcome::Staged);
        assert_eq!(area.stage(&key, artifact).unwrap(), StageOutcome::AlreadyStaged);
        assert_eq!(
            fs::read_link(area.root().join("f7b/image.jp2")).unwrap(),
            artifact
        );
        assert_eq!(area.entry_count().unwrap(), 1);
    }

    #[test]
    fn different_artifact_same_key_conflicts() {
        let dir = TempDir::new().unwrap();
        let area = StagingArea::new(dir.path().join("ns"));
        let key = DestinationKey::from_base_name("image.jp2");
        let first = Path::new("/src/obj1/v1/full/image.DELIVERY.jp2");
        let second = Path::new("/src/obj2/v3/full/image.DELIVERY.jp2");

        area.stage(&key, first).unwrap();
        match area.stage(&key, second).unwrap_err() {
            PublishError::StagingConflict { staged, artifact, .. } => {
                assert_eq!(staged, first);
                assert_eq!(artifact, second);
            }
            other => panic!("expected StagingConflict, got {other:?}"),
        }
    }

    #[test]
    fn clear_removes_everything_and_tolerates_absence() {
        let dir = TempDir::new().unwrap();
        let area = StagingArea::new(dir.path().join("ns"));
        area.stage(&DestinationKey::from_base_name("a.jp2"), Path::new("/x/a"))
            .unwrap();
        area.stage(&DestinationKey::from_base_name("abc.jp2"), Path::new("/x/b"))
            .unwrap();
        assert_eq!(area.entry_count().unwrap(), 2);

        area.clear().unwrap();
        assert!(!area.root().exists());
        assert_eq!(area.entry_count().unwrap(), 0);
        area.clear().unwrap();
    }
}
