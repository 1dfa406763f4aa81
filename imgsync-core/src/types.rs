//! Domain types for the publish protocol.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Policy enums are serializable via serde + serde_yaml and parse from the
//! lowercase strings accepted on the command line and in the environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Number of leading hex digits of the MD5 digest used as the shard directory.
pub const SHARD_WIDTH: usize = 3;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A validated collection namespace.
///
/// Namespaces name a path component in every mutable tree, so they may not
/// be empty, contain separators, or be `.` / `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidNamespace {
            namespace: raw.to_owned(),
            reason,
        };
        if raw.is_empty() {
            return Err(invalid("namespace is empty"));
        }
        if raw == "." || raw == ".." {
            return Err(invalid("namespace may not be '.' or '..'"));
        }
        if raw.contains(['/', '\\']) {
            return Err(invalid("namespace may not contain path separators"));
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Relative path of this namespace's collection under the source root.
    ///
    /// The name is split into two-character components; a trailing single
    /// character gets a `_` suffix so every component has width two:
    /// `abcde` → `ab/cd/e_`.
    pub fn collection_path(&self) -> PathBuf {
        let chars: Vec<char> = self.0.chars().collect();
        let mut path = PathBuf::new();
        for chunk in chars.chunks(2) {
            let mut component: String = chunk.iter().collect();
            if chunk.len() == 1 {
                component.push('_');
            }
            path.push(component);
        }
        path
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque version token read from an object's version manifest.
///
/// Never compared semantically; recency is inferred only from whether a
/// canonical slot target contains the token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken(pub String);

impl VersionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for VersionToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A directory delimited by the identity marker, with its declared version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedObject {
    /// Absolute path of the directory holding the identity marker.
    pub root: PathBuf,
    pub version: VersionToken,
}

impl ManagedObject {
    /// `<root>/<version>/full`, where candidate artifacts live.
    pub fn full_dir(&self) -> PathBuf {
        self.root.join(self.version.as_str()).join("full")
    }
}

/// Deterministic `(shard, base name)` pair naming a published artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationKey {
    shard: String,
    base_name: String,
}

impl DestinationKey {
    /// Key for an already-derived published base name (`b1234567.jp2`).
    pub fn from_base_name(base_name: impl Into<String>) -> Self {
        let base_name = base_name.into();
        let digest = hex::encode(Md5::digest(base_name.as_bytes()));
        Self {
            shard: digest[..SHARD_WIDTH].to_owned(),
            base_name,
        }
    }

    /// Key for a source artifact file name.
    ///
    /// Strips the extension twice (`b1234567.DELIVERY.jp2` → `b1234567`) and
    /// appends `published_extension`. Returns `None` for names that leave an
    /// empty or non-UTF-8 stem.
    pub fn for_artifact(file_name: &Path, published_extension: &str) -> Option<Self> {
        let once = file_name.file_stem()?;
        let twice = Path::new(once).file_stem()?.to_str()?;
        if twice.is_empty() {
            return None;
        }
        let extension = published_extension.trim_start_matches('.');
        Some(Self::from_base_name(format!("{twice}.{extension}")))
    }

    pub fn shard(&self) -> &str {
        &self.shard
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// `<shard>/<base name>`, relative to any of the sharded trees.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.shard).join(&self.base_name)
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.shard, self.base_name)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What publishing an artifact requires, relative to its canonical slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishAction {
    /// No canonical slot yet.
    Add,
    /// Slot lags behind the object's current version.
    Update,
    /// Slot already names this exact artifact.
    Noop,
}

impl PublishAction {
    /// Destination bucket the transfer lands in; `None` for [`PublishAction::Noop`].
    pub fn bucket(self) -> Option<&'static str> {
        match self {
            PublishAction::Add => Some("add"),
            PublishAction::Update => Some("modify"),
            PublishAction::Noop => None,
        }
    }
}

impl fmt::Display for PublishAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishAction::Add => write!(f, "add"),
            PublishAction::Update => write!(f, "update"),
            PublishAction::Noop => write!(f, "noop"),
        }
    }
}

/// How to treat a whitelist pattern that matches more than one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityPolicy {
    /// Abort the run.
    #[default]
    Strict,
    /// Warn and use the first match in file-name order.
    Lenient,
}

impl FromStr for AmbiguityPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            _ => Err(ConfigError::InvalidPolicy {
                field: "ambiguity",
                value: s.to_owned(),
            }),
        }
    }
}

/// How to treat two distinct artifacts staged under one key in the same run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StagingConflictPolicy {
    #[default]
    Abort,
    /// Report the conflict and skip the later artifact.
    Skip,
}

impl FromStr for StagingConflictPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            _ => Err(ConfigError::InvalidPolicy {
                field: "staging_conflict",
                value: s.to_owned(),
            }),
        }
    }
}

/// Which transfer collaborator moves bytes into the destination tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    #[default]
    Rsync,
    Copy,
}

impl FromStr for TransferKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rsync" => Ok(Self::Rsync),
            "copy" => Ok(Self::Copy),
            _ => Err(ConfigError::InvalidPolicy {
                field: "transfer",
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Rsync => write!(f, "rsync"),
            TransferKind::Copy => write!(f, "copy"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
