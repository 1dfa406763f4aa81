//! Whitelist-driven artifact selection.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use regex::Regex;

use imgsync_core::{AmbiguityPolicy, DestinationKey, ManagedObject, PublishConfig};

use crate::error::{io_err, PublishError};

/// An artifact chosen for publication by one whitelist pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Absolute path of the selected source file.
    pub artifact: PathBuf,
    pub key: DestinationKey,
    pub pattern: String,
}

/// Picks at most one artifact per (object, whitelist pattern).
#[derive(Debug, Clone)]
pub struct ArtifactSelector {
    whitelist: Vec<Regex>,
    ignore: Vec<Regex>,
    ambiguity: AmbiguityPolicy,
    published_extension: String,
}

impl ArtifactSelector {
    pub fn new(
        whitelist: Vec<Regex>,
        ignore: Vec<Regex>,
        ambiguity: AmbiguityPolicy,
        published_extension: impl Into<String>,
    ) -> Self {
        Self {
            whitelist,
            ignore,
            ambiguity,
            published_extension: published_extension.into(),
        }
    }

    pub fn from_config(config: &PublishConfig) -> Self {
        Self::new(
            config.whitelist.clone(),
            config.ignore.clone(),
            config.ambiguity,
            config.published_extension.clone(),
        )
    }

    pub fn whitelist(&self) -> &[Regex] {
        &self.whitelist
    }

    /// Files directly under the object's `full` directory, sorted by name,
    /// minus anything matching an ignore pattern.
    ///
    /// A missing `full` directory yields no candidates.
    pub fn candidates(&self, object: &ManagedObject) -> Result<Vec<PathBuf>, PublishError> {
        let dir = object.full_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_err(&dir, err)),
        };

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            let file_type = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
            if file_type.is_dir() {
                continue;
            }
            let path = entry.path();
            let Some(name) = file_name(&path) else {
                tracing::debug!(path = %path.display(), "skipping non UTF-8 file name");
                continue;
            };
            if self.ignore.iter().any(|p| p.is_match(name)) {
                continue;
            }
            candidates.push(path);
        }
        candidates.sort();
        Ok(candidates)
    }

    /// Select the artifact `pattern` names among `candidates`.
    pub fn select(
        &self,
        object: &ManagedObject,
        candidates: &[PathBuf],
        pattern: &Regex,
    ) -> Result<Selection, PublishError> {
        let matches: Vec<&PathBuf> = candidates
            .iter()
            .filter(|path| file_name(path).is_some_and(|name| pattern.is_match(name)))
            .collect();

        let no_match = || PublishError::NoEligibleArtifact {
            object: object.root.clone(),
            version: object.version.clone(),
            pattern: pattern.as_str().to_owned(),
        };

        let artifact = match matches.as_slice() {
            [] => return Err(no_match()),
            [only] => (*only).clone(),
            [first, ..] => match self.ambiguity {
                AmbiguityPolicy::Strict => {
                    return Err(PublishError::AmbiguousArtifactMatch {
                        object: object.root.clone(),
                        version: object.version.clone(),
                        pattern: pattern.as_str().to_owned(),
                        matches: matches.iter().map(|p| (*p).clone()).collect(),
                    });
                }
                AmbiguityPolicy::Lenient => {
                    tracing::warn!(
                        object = %object.root.display(),
                        pattern = pattern.as_str(),
                        matches = matches.len(),
                        chosen = %first.display(),
                        "ambiguous whitelist match, using first in name order",
                    );
                    (*first).clone()
                }
            },
        };

        let name = artifact.file_name().map(Path::new).ok_or_else(no_match)?;
        let key = DestinationKey::for_artifact(name, &self.published_extension).ok_or_else(no_match)?;

        Ok(Selection {
            artifact,
            key,
            pattern: pattern.as_str().to_owned(),
        })
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()
}
