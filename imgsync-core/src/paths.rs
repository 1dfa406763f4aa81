//! On-disk layout for every tree a run touches.
//!
//! ```text
//! <destination_root>/<ns>/add/<shard>/<base>      transfers for new artifacts
//! <destination_root>/<ns>/modify/<shard>/<base>   transfers for version updates
//! <canonical_root>/<ns>/<shard>/<base>            canonical slot symlinks
//! <volatile_root>/<ns>/<shard>/<base>             staging symlinks (one run)
//! <lock_root>/.running_<ns>/imgsync.pid           run lock marker
//! ```

use std::path::{Path, PathBuf};

use crate::types::{DestinationKey, Namespace};

pub const CONFIG_DIR: &str = ".imgsync";
pub const CONFIG_FILE: &str = "config.yaml";
pub const LOCK_MARKER: &str = "imgsync.pid";
pub const TMP_SUFFIX: &str = "imgsync.tmp";

pub const DEFAULT_IDENTITY_MARKER: &str = "0=dflat_1.0";
pub const DEFAULT_VERSION_MANIFEST: &str = "current.txt";
pub const DEFAULT_PUBLISHED_EXTENSION: &str = "jp2";

pub fn config_dir_at(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR)
}

pub fn default_config_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join(CONFIG_FILE)
}

pub fn lock_dir(lock_root: &Path, namespace: &Namespace) -> PathBuf {
    lock_root.join(format!(".running_{namespace}"))
}

pub fn lock_marker_path(lock_root: &Path, namespace: &Namespace) -> PathBuf {
    lock_dir(lock_root, namespace).join(LOCK_MARKER)
}

pub fn staging_dir(volatile_root: &Path, namespace: &Namespace) -> PathBuf {
    volatile_root.join(namespace.as_str())
}

pub fn canonical_dir(canonical_root: &Path, namespace: &Namespace) -> PathBuf {
    canonical_root.join(namespace.as_str())
}

pub fn destination_dir(destination_root: &Path, namespace: &Namespace) -> PathBuf {
    destination_root.join(namespace.as_str())
}

/// `<destination_root>/<ns>/<bucket>/<shard>/<base>`
pub fn bucket_path(
    destination_root: &Path,
    namespace: &Namespace,
    bucket: &str,
    key: &DestinationKey,
) -> PathBuf {
    destination_dir(destination_root, namespace)
        .join(bucket)
        .join(key.relative_path())
}

/// Sibling used for write-then-rename replacement of `path`.
pub fn tmp_sibling(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.{TMP_SUFFIX}", path.display()))
}
