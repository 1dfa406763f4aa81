//! Collection lookup and managed-object discovery.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use imgsync_core::Namespace;

use crate::error::{io_err, PublishError};

/// Resolve `<source_root>/<collection path>` for `namespace`.
///
/// The source root is canonicalised so every artifact path derived from the
/// result is absolute. Fails with [`PublishError::InvalidSourceArgument`] if
/// either the source root or the collection is missing.
pub fn collection_root(source_root: &Path, namespace: &Namespace) -> Result<PathBuf, PublishError> {
    let source = source_root
        .canonicalize()
        .map_err(|_| PublishError::InvalidSourceArgument {
            path: source_root.to_path_buf(),
        })?;
    let collection = source.join(namespace.collection_path());
    if !collection.is_dir() {
        return Err(PublishError::InvalidSourceArgument { path: collection });
    }
    Ok(collection)
}

/// Find every directory under `collection` that holds `identity_marker`.
///
/// Symlinks are not followed. Results are sorted so runs process objects in
/// a stable order.
pub fn discover_objects(collection: &Path, identity_marker: &str) -> Result<Vec<PathBuf>, PublishError> {
    let mut objects = Vec::new();
    for entry in WalkDir::new(collection).follow_links(false) {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| collection.to_path_buf());
            io_err(path, err.into())
        })?;
        if !entry.file_type().is_file() || entry.file_name() != identity_marker {
            continue;
        }
        if let Some(parent) = entry.path().parent() {
            objects.push(parent.to_path_buf());
        }
    }
    objects.sort();
    objects.dedup();
    Ok(objects)
}
