//! Version resolution from an object's manifest.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use imgsync_core::{ManagedObject, VersionToken};

use crate::error::{io_err, PublishError};

/// Read the declared current version of the object rooted at `object_root`.
///
/// The token is the first non-empty line of `<object_root>/<manifest_name>`,
/// trimmed. It is embedded verbatim in artifact paths later, so it must be a
/// single path component.
pub fn resolve_version(object_root: &Path, manifest_name: &str) -> Result<VersionToken, PublishError> {
    let manifest = object_root.join(manifest_name);
    let contents = match std::fs::read_to_string(&manifest) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(PublishError::MissingVersionManifest {
                object: object_root.to_path_buf(),
                manifest,
            });
        }
        Err(err) => return Err(io_err(&manifest, err)),
    };

    let Some(token) = contents.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return Err(PublishError::EmptyVersionManifest { manifest });
    };

    if token == "." || token == ".." || token.contains(['/', '\\']) {
        return Err(PublishError::InvalidVersionToken {
            manifest,
            token: token.to_owned(),
        });
    }

    Ok(VersionToken(token.to_owned()))
}

/// Resolve the object at `root` into a [`ManagedObject`].
pub fn load_object(root: PathBuf, manifest_name: &str) -> Result<ManagedObject, PublishError> {
    let version = resolve_version(&root, manifest_name)?;
    Ok(ManagedObject { root, version })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    #[rstest]
    #[case("v3\n", "v3")]
    #[case("  v3  \r\nv2\n", "v3")]
    #[case("\n\n   \nv10\n", "v10")]
    #[case("v1", "v1")]
    fn first_non_empty_line_trimmed(#[case] contents: &str, #[case] expected: &str) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("current.txt"), contents).unwrap();
        let version = resolve_version(dir.path(), "current.txt").unwrap();
        assert_eq!(version.as_str(), expected);
    }

    #[test]
    fn missing_manifest() {
        let dir = TempDir::new().unwrap();
        let err = resolve_version(dir.path(), "current.txt").unwrap_err();
        assert!(matches!(err, PublishError::MissingVersionManifest { .. }), "got: {err}");
    }

    #[test]
    fn blank_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("current.txt"), "\n  \n").unwrap();
        let err = resolve_version(dir.path(), "current.txt").unwrap_err();
        assert!(matches!(err, PublishError::EmptyVersionManifest { .. }), "got: {err}");
    }

    #[rstest]
    #[case("..")]
    #[case("v1/../../etc")]
    fn path_like_token_rejected(#[case] token: &str) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("current.txt"), token).unwrap();
        let err = resolve_version(dir.path(), "current.txt").unwrap_err();
        assert!(matches!(err, PublishError::InvalidVersionToken { .. }), "got: {err}");
    }

    #[test]
    fn load_object_pairs_root_and_version() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("current.txt"), "v2\n").unwrap();
        let object = load_object(dir.path().to_path_buf(), "current.txt").unwrap();
        assert_eq!(object.root, dir.path());
        assert_eq!(object.version, VersionToken::from("v2"));
        assert_eq!(object.full_dir(), dir.path().join("v2").join("full"));
    }
}
