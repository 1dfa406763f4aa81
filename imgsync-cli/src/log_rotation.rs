//! Size-based rotation for the optional run log file.
//!
//! Keeps at most 5 rotated copies:
//!   imgsync.log → imgsync.log.1 → imgsync.log.2 → … → imgsync.log.5

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum log file size before rotation (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum number of rotated backup files to keep.
pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log_path` if its size has reached `max_bytes`.
///
/// Returns `true` if rotation occurred, `false` if the file was under the
/// threshold or does not exist yet. Unlike a daemon log, no fresh file is
/// created here; the subscriber opens it in append mode.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes {
        return Ok(false);
    }

    if max_files == 0 {
        fs::remove_file(log_path)?;
        return Ok(true);
    }
    // Gaps in the backup sequence are fine; each step tolerates a missing source.
    tolerate_missing(fs::remove_file(numbered_path(log_path, max_files)))?;
    for n in (1..max_files).rev() {
        tolerate_missing(fs::rename(
            numbered_path(log_path, n),
            numbered_path(log_path, n + 1),
        ))?;
    }
    fs::rename(log_path, numbered_path(log_path, 1))?;
    Ok(true)
}

fn tolerate_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// `imgsync.log` → `imgsync.log.<n>`
fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("imgsync.log");
    base.with_file_name(format!("{name}.{n}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SMALL_LIMIT: u64 = 1024;

    #[test]
    fn under_threshold_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("imgsync.log");
        fs::write(&log, vec![b'x'; 100]).unwrap();

        assert!(!rotate_if_needed(&log, SMALL_LIMIT, MAX_ROTATED_FILES).unwrap());
        assert!(log.exists());
        assert!(!numbered_path(&log, 1).exists());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("never-written.log");
        assert!(!rotate_if_needed(&log, SMALL_LIMIT, MAX_ROTATED_FILES).unwrap());
    }

    #[test]
    fn oversized_file_moves_to_first_backup() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("imgsync.log");
        fs::write(&log, vec![b'x'; SMALL_LIMIT as usize]).unwrap();

        assert!(rotate_if_needed(&log, SMALL_LIMIT, MAX_ROTATED_FILES).unwrap());
        assert!(!log.exists());
        assert_eq!(fs::metadata(numbered_path(&log, 1)).unwrap().len(), SMALL_LIMIT);
    }

    #[test]
    fn backups_are_capped() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("imgsync.log");
        for n in 1..=MAX_ROTATED_FILES {
            fs::write(numbered_path(&log, n), format!("rotated-{n}")).unwrap();
        }
        fs::write(&log, vec![b'x'; SMALL_LIMIT as usize + 1]).unwrap();

        assert!(rotate_if_needed(&log, SMALL_LIMIT, MAX_ROTATED_FILES).unwrap());
        assert_eq!(
            fs::read_to_string(numbered_path(&log, MAX_ROTATED_FILES)).unwrap(),
            format!("rotated-{}", MAX_ROTATED_FILES - 1)
        );
        assert!(!numbered_path(&log, MAX_ROTATED_FILES + 1).exists());
    }

    #[test]
    fn gaps_in_backups_are_shifted_as_is() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("imgsync.log");
        fs::write(numbered_path(&log, 2), "older").unwrap();
        fs::write(&log, vec![b'x'; SMALL_LIMIT as usize]).unwrap();

        assert!(rotate_if_needed(&log, SMALL_LIMIT, MAX_ROTATED_FILES).unwrap());
        assert_eq!(fs::read_to_string(numbered_path(&log, 3)).unwrap(), "older");
        assert!(!numbered_path(&log, 2).exists());
        assert!(numbered_path(&log, 1).exists());
    }

    #[test]
    fn zero_backups_discards_the_log() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("imgsync.log");
        fs::write(&log, vec![b'x'; SMALL_LIMIT as usize]).unwrap();

        assert!(rotate_if_needed(&log, SMALL_LIMIT, 0).unwrap());
        assert!(!log.exists());
        assert!(!numbered_path(&log, 1).exists());
    }
}
