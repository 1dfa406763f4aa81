//! Transfer collaborators that move artifacts into the destination tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use filetime::FileTime;
use thiserror::Error;

use imgsync_core::{paths, TransferKind};

/// Why a single transfer failed.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {}: {stderr}", exit_code(.code))]
    Exit {
        program: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (killed by signal)".to_string(),
    }
}

fn io_err(path: impl Into<PathBuf>, source: io::Error) -> TransferError {
    TransferError::Io {
        path: path.into(),
        source,
    }
}

/// Copies one artifact to one destination path.
///
/// Implementations must not create `destination`'s parent; the executor does.
pub trait Transfer: Send + Sync {
    fn name(&self) -> &'static str;

    fn transfer(&self, source: &Path, destination: &Path) -> Result<(), TransferError>;
}

/// Build the collaborator selected by configuration.
pub fn from_kind(kind: TransferKind) -> Box<dyn Transfer> {
    match kind {
        TransferKind::Rsync => Box::new(RsyncTransfer::default()),
        TransferKind::Copy => Box::new(CopyTransfer),
    }
}

// ---------------------------------------------------------------------------
// rsync
// ---------------------------------------------------------------------------

/// Shells out to `rsync -lpt`: links as links, permissions and times kept.
#[derive(Debug, Clone)]
pub struct RsyncTransfer {
    program: PathBuf,
}

impl Default for RsyncTransfer {
    fn default() -> Self {
        Self {
            program: PathBuf::from("rsync"),
        }
    }
}

impl RsyncTransfer {
    /// Use a specific rsync binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Transfer for RsyncTransfer {
    fn name(&self) -> &'static str {
        "rsync"
    }

    fn transfer(&self, source: &Path, destination: &Path) -> Result<(), TransferError> {
        let output = Command::new(&self.program)
            .arg("-lpt")
            .arg(source)
            .arg(destination)
            .output()
            .map_err(|source| TransferError::Spawn {
                program: "rsync",
                source,
            })?;
        if !output.status.success() {
            return Err(TransferError::Exit {
                program: "rsync",
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// copy
// ---------------------------------------------------------------------------

/// In-process equivalent of `rsync -lpt` for hosts without rsync.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyTransfer;

impl Transfer for CopyTransfer {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn transfer(&self, source: &Path, destination: &Path) -> Result<(), TransferError> {
        let meta = fs::symlink_metadata(source).map_err(|e| io_err(source, e))?;
        let tmp = paths::tmp_sibling(destination);
        let _ = fs::remove_file(&tmp);

        if meta.file_type().is_symlink() {
            let target = fs::read_link(source).map_err(|e| io_err(source, e))?;
            crate::link::symlink(&target, &tmp).map_err(|e| io_err(&tmp, e))?;
        } else {
            fs::copy(source, &tmp).map_err(|e| io_err(&tmp, e))?;
            let atime = FileTime::from_last_access_time(&meta);
            let mtime = FileTime::from_last_modification_time(&meta);
            if let Err(e) = filetime::set_file_times(&tmp, atime, mtime) {
                let _ = fs::remove_file(&tmp);
                return Err(io_err(&tmp, e));
            }
        }

        if let Err(e) = fs::rename(&tmp, destination) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(destination, e));
        }
        Ok(())
    }
}
