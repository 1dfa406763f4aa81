//! Transfer-then-commit publication of one selected artifact.

use std::path::PathBuf;

use imgsync_core::{paths, DestinationKey, Namespace, PublishAction};

use crate::canonical::CanonicalReconciler;
use crate::error::{io_err, PublishError};
use crate::selector::Selection;
use crate::transfer::Transfer;

/// Moves artifacts into `<destination>/<ns>/{add,modify}` and commits their
/// canonical slots.
pub struct PublishExecutor<'a> {
    transfer: &'a dyn Transfer,
    destination_root: PathBuf,
    namespace: Namespace,
}

impl<'a> PublishExecutor<'a> {
    pub fn new(
        transfer: &'a dyn Transfer,
        destination_root: impl Into<PathBuf>,
        namespace: &Namespace,
    ) -> Self {
        Self {
            transfer,
            destination_root: destination_root.into(),
            namespace: namespace.clone(),
        }
    }

    /// Bucket path an artifact with `key` lands in for `action`.
    pub fn destination_path(&self, action: PublishAction, key: &DestinationKey) -> Option<PathBuf> {
        let bucket = action.bucket()?;
        Some(paths::bucket_path(&self.destination_root, &self.namespace, bucket, key))
    }

    /// Transfer `selection` and, only once that succeeded, commit `action`
    /// to the canonical slot.
    ///
    /// Returns the destination path, or `None` for [`PublishAction::Noop`].
    pub fn execute(
        &self,
        selection: &Selection,
        action: PublishAction,
        reconciler: &CanonicalReconciler,
    ) -> Result<Option<PathBuf>, PublishError> {
        let Some(destination) = self.destination_path(action, &selection.key) else {
            return Ok(None);
        };

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        self.transfer
            .transfer(&selection.artifact, &destination)
            .map_err(|err| PublishError::TransferFailure {
                artifact: selection.artifact.clone(),
                destination: destination.clone(),
                reason: err.to_string(),
            })?;
        tracing::info!(
            key = %selection.key,
            bucket = action.bucket().unwrap_or_default(),
            transfer = self.transfer.name(),
            "transferred {}",
            selection.artifact.display(),
        );

        reconciler.commit(&selection.key, &selection.artifact, action)?;
        Ok(Some(destination))
    }
}
