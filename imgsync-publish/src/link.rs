//! Symlink helpers shared by staging, the canonical tree and transfers.

use std::io;
use std::path::Path;

use imgsync_core::paths;

use crate::error::{io_err, PublishError};

#[cfg(unix)]
pub(crate) fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub(crate) fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Create `link -> target`, creating missing parent directories.
pub(crate) fn create_symlink(target: &Path, link: &Path) -> Result<(), PublishError> {
    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    symlink(target, link).map_err(|e| io_err(link, e))
}

/// Point `link` at `target`, replacing any existing link atomically.
///
/// A sibling `<link>.imgsync.tmp` symlink is created and renamed over `link`,
/// so readers observe either the old target or the new one.
pub(crate) fn replace_symlink(target: &Path, link: &Path) -> Result<(), PublishError> {
    let tmp = paths::tmp_sibling(link);
    match std::fs::remove_file(&tmp) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(&tmp, err)),
    }
    create_symlink(target, &tmp)?;
    if let Err(e) = std::fs::rename(&tmp, link) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(link, e));
    }
    Ok(())
}
