//! Namespace-scoped run lock.
//!
//! A run owns `<lock_root>/.running_<ns>/` for its whole lifetime. The
//! directory is created with `create_dir`, which fails when it already exists;
//! that exclusive create is the only guard against overlapping runs on one
//! namespace. There is no waiting: contention aborts the second run at once.
//!
//! The marker file inside (`imgsync.pid`) records who holds the lock, for
//! diagnostics and `imgsync status`.
//!
//! [`RunLock`] releases exactly once: through [`RunLock::release`] on the
//! normal path, or from `Drop` when a run unwinds without reaching it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use imgsync_core::{paths, Namespace};

use crate::error::{io_err, PublishError};

/// Contents of the lock marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub namespace: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

/// What is currently on disk for a namespace's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    Free,
    Held(LockInfo),
    /// Lock directory present but its marker is missing or unreadable.
    Orphaned { lock_dir: PathBuf },
}

/// Held run lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct RunLock {
    namespace: Namespace,
    dir: PathBuf,
    released: bool,
}

impl RunLock {
    /// Take the lock for `namespace`, failing with
    /// [`PublishError::LockContention`] if another run holds it.
    pub fn acquire(lock_root: &Path, namespace: &Namespace) -> Result<Self, PublishError> {
        fs::create_dir_all(lock_root).map_err(|e| io_err(lock_root, e))?;

        let dir = paths::lock_dir(lock_root, namespace);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let holder = match inspect(lock_root, namespace) {
                    Ok(LockState::Held(info)) => Some(info),
                    _ => None,
                };
                return Err(PublishError::LockContention {
                    namespace: namespace.clone(),
                    lock_dir: dir,
                    holder,
                });
            }
            Err(err) => return Err(io_err(&dir, err)),
        }

        // From here on, Drop cleans up the directory if writing the marker fails.
        let lock = Self {
            namespace: namespace.clone(),
            dir,
            released: false,
        };
        let info = LockInfo {
            namespace: namespace.to_string(),
            pid: std::process::id(),
            started_at: Utc::now(),
        };
        let marker = paths::lock_marker_path(lock_root, namespace);
        let json = serde_json::to_string_pretty(&info)?;
        fs::write(&marker, json).map_err(|e| io_err(&marker, e))?;

        tracing::debug!(namespace = %namespace, lock = %lock.dir.display(), "run lock acquired");
        Ok(lock)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Release the lock, reporting any failure to remove it.
    pub fn release(mut self) -> Result<(), PublishError> {
        self.released = true;
        remove_lock_dir(&self.dir)?;
        tracing::debug!(namespace = %self.namespace, "run lock released");
        Ok(())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = remove_lock_dir(&self.dir) {
            tracing::warn!(
                namespace = %self.namespace,
                error = %err,
                "failed to release run lock",
            );
        }
    }
}

/// Read the lock state for `namespace` without touching it.
pub fn inspect(lock_root: &Path, namespace: &Namespace) -> Result<LockState, PublishError> {
    let dir = paths::lock_dir(lock_root, namespace);
    if !dir.exists() {
        return Ok(LockState::Free);
    }
    let marker = paths::lock_marker_path(lock_root, namespace);
    let contents = match fs::read_to_string(&marker) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Ok(LockState::Orphaned { lock_dir: dir });
        }
        Err(err) => return Err(io_err(&marker, err)),
    };
    match serde_json::from_str::<LockInfo>(&contents) {
        Ok(info) => Ok(LockState::Held(info)),
        Err(_) => Ok(LockState::Orphaned { lock_dir: dir }),
    }
}

/// Remove a lock left behind by a run that was killed before releasing.
///
/// Returns `true` if a lock directory was present.
pub fn force_release(lock_root: &Path, namespace: &Namespace) -> Result<bool, PublishError> {
    let dir = paths::lock_dir(lock_root, namespace);
    if !dir.exists() {
        return Ok(false);
    }
    tracing::warn!(namespace = %namespace, lock = %dir.display(), "forcibly removing run lock");
    remove_lock_dir(&dir)?;
    Ok(true)
}

fn remove_lock_dir(dir: &Path) -> Result<(), PublishError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(dir, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ns(name: &str) -> Namespace {
        Namespace::parse(name).unwrap()
    }

    #[test]
    fn second_acquire_fails_with_contention() {
        let root = TempDir::new().unwrap();
        let first = RunLock::acquire(root.path(), &ns("abc")).expect("first acquire");

        let err = RunLock::acquire(root.path(), &ns("abc")).unwrap_err();
        match err {
            PublishError::LockContention { holder, .. } => {
                let holder = holder.expect("holder info");
                assert_eq!(holder.pid, std::process::id());
                assert_eq!(holder.namespace, "abc");
            }
            other => panic!("expected LockContention, got {other:?}"),
        }

        first.release().expect("release");
        assert!(!paths::lock_dir(root.path(), &ns("abc")).exists());
    }

    #[test]
    fn different_namespaces_do_not_contend() {
        let root = TempDir::new().unwrap();
        let a = RunLock::acquire(root.path(), &ns("abc")).expect("abc");
        let b = RunLock::acquire(root.path(), &ns("xyz")).expect("xyz");
        a.release().unwrap();
        b.release().unwrap();
    }

    #[test]
    fn drop_releases_lock() {
        let root = TempDir::new().unwrap();
        {
            let _lock = RunLock::acquire(root.path(), &ns("abc")).expect("acquire");
            assert!(matches!(
                inspect(root.path(), &ns("abc")).unwrap(),
                LockState::Held(_)
            ));
        }
        assert_eq!(inspect(root.path(), &ns("abc")).unwrap(), LockState::Free);
        RunLock::acquire(root.path(), &ns("abc")).expect("reacquire after drop");
    }

    #[test]
    fn marker_less_lock_dir_is_orphaned_and_force_releasable() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(paths::lock_dir(root.path(), &ns("abc"))).unwrap();

        assert!(matches!(
            inspect(root.path(), &ns("abc")).unwrap(),
            LockState::Orphaned { .. }
        ));
        let err = RunLock::acquire(root.path(), &ns("abc")).unwrap_err();
        assert!(matches!(err, PublishError::LockContention { holder: None, .. }));

        assert!(force_release(root.path(), &ns("abc")).unwrap());
        assert!(!force_release(root.path(), &ns("abc")).unwrap());
        assert_eq!(inspect(root.path(), &ns("abc")).unwrap(), LockState::Free);
    }
}
