//! Layered configuration.
//!
//! # Layers (highest precedence first)
//!
//! 1. CLI flags: built by the binary as a [`ConfigFile`] overlay
//! 2. Environment: `IM_DESTINATION`, `IM_VOLATILE`, `IM_CANONICAL`, `IM_LOCK_ROOT`
//! 3. YAML file: `~/.imgsync/config.yaml` unless `IM_CONFIG` / `--config` names another
//!
//! Every layer is a [`ConfigFile`] with all-optional fields; [`ConfigFile::layer`]
//! merges them and [`PublishConfig::resolve`] validates the result into the
//! explicit struct handed to the pipeline.
//!
//! As in the rest of the workspace, functions touching the home directory come
//! in two forms: `fn_at(home: &Path, …)` for tests and `fn(…)` using
//! `dirs::home_dir()`.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::paths;
use crate::types::{AmbiguityPolicy, Namespace, StagingConflictPolicy, TransferKind};

/// Whitelist used when no layer supplies one.
pub const DEFAULT_WHITELIST: &[&str] = &[r"^.*DELIVERY\.jp2$"];

/// Derivatives that are known and intentionally never published.
pub const DEFAULT_IGNORE: &[&str] = &[r"^.*THUMB\.jp2$", r"^encoding\.log$"];

pub const ENV_CONFIG: &str = "IM_CONFIG";
pub const ENV_DESTINATION: &str = "IM_DESTINATION";
pub const ENV_VOLATILE: &str = "IM_VOLATILE";
pub const ENV_CANONICAL: &str = "IM_CANONICAL";
pub const ENV_LOCK_ROOT: &str = "IM_LOCK_ROOT";

// ---------------------------------------------------------------------------
// 1. Raw layer
// ---------------------------------------------------------------------------

/// One configuration layer, exactly as written in `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatile_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_marker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_manifest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambiguity: Option<AmbiguityPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_conflict: Option<StagingConflictPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer: Option<TransferKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl ConfigFile {
    /// Load a YAML layer from `path`.
    ///
    /// A missing file is an empty layer; an unreadable or malformed file is
    /// an error carrying the path.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Layer built from environment variables.
    pub fn from_env() -> Self {
        Self::from_env_vars(std::env::vars())
    }

    /// Layer built from an explicit variable list (used by tests).
    pub fn from_env_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut layer = Self::default();
        for (key, value) in vars {
            let value: String = value.into();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                ENV_DESTINATION => layer.destination_root = Some(PathBuf::from(value)),
                ENV_VOLATILE => layer.volatile_root = Some(PathBuf::from(value)),
                ENV_CANONICAL => layer.canonical_root = Some(PathBuf::from(value)),
                ENV_LOCK_ROOT => layer.lock_root = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        layer
    }

    /// Merge `over` on top of `self`; any field set in `over` wins.
    pub fn layer(self, over: ConfigFile) -> ConfigFile {
        ConfigFile {
            destination_root: over.destination_root.or(self.destination_root),
            volatile_root: over.volatile_root.or(self.volatile_root),
            canonical_root: over.canonical_root.or(self.canonical_root),
            lock_root: over.lock_root.or(self.lock_root),
            whitelist: over.whitelist.or(self.whitelist),
            ignore: over.ignore.or(self.ignore),
            identity_marker: over.identity_marker.or(self.identity_marker),
            version_manifest: over.version_manifest.or(self.version_manifest),
            published_extension: over.published_extension.or(self.published_extension),
            ambiguity: over.ambiguity.or(self.ambiguity),
            staging_conflict: over.staging_conflict.or(self.staging_conflict),
            transfer: over.transfer.or(self.transfer),
            log_file: over.log_file.or(self.log_file),
        }
    }
}

/// Config file path: `IM_CONFIG` if set, else `<home>/.imgsync/config.yaml`.
pub fn config_path_at(home: &Path, im_config: Option<&str>) -> PathBuf {
    match im_config {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => paths::default_config_path_at(home),
    }
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    let im_config = std::env::var(ENV_CONFIG).ok();
    Ok(config_path_at(&home, im_config.as_deref()))
}

// ---------------------------------------------------------------------------
// 2. Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved configuration handed to the pipeline constructor.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub destination_root: PathBuf,
    pub volatile_root: PathBuf,
    pub canonical_root: PathBuf,
    pub lock_root: PathBuf,
    /// Ordered; each pattern selects at most one artifact per object.
    pub whitelist: Vec<Regex>,
    pub ignore: Vec<Regex>,
    pub identity_marker: String,
    pub version_manifest: String,
    pub published_extension: String,
    pub ambiguity: AmbiguityPolicy,
    pub staging_conflict: StagingConflictPolicy,
    pub transfer: TransferKind,
    pub log_file: Option<PathBuf>,
}

impl PublishConfig {
    /// Validate a merged layer.
    ///
    /// Fails with [`ConfigError::MissingConfiguration`] naming every absent
    /// root (and `whitelist` when it is empty), or
    /// [`ConfigError::InvalidPattern`] for the first pattern that does not compile.
    pub fn resolve(layer: ConfigFile) -> Result<Self, ConfigError> {
        let whitelist = layer
            .whitelist
            .unwrap_or_else(|| DEFAULT_WHITELIST.iter().map(|p| p.to_string()).collect());
        let ignore = layer
            .ignore
            .unwrap_or_else(|| DEFAULT_IGNORE.iter().map(|p| p.to_string()).collect());

        let (destination_root, volatile_root, canonical_root) = match (
            layer.destination_root,
            layer.volatile_root,
            layer.canonical_root,
        ) {
            (Some(d), Some(v), Some(c)) if !whitelist.is_empty() => (d, v, c),
            (d, v, c) => {
                let keys = [
                    ("destination_root", d.is_none()),
                    ("volatile_root", v.is_none()),
                    ("canonical_root", c.is_none()),
                    ("whitelist", whitelist.is_empty()),
                ]
                .into_iter()
                .filter_map(|(key, missing)| missing.then_some(key))
                .collect();
                return Err(ConfigError::MissingConfiguration { keys });
            }
        };

        Ok(Self {
            destination_root,
            volatile_root,
            canonical_root,
            lock_root: layer.lock_root.unwrap_or_else(std::env::temp_dir),
            whitelist: compile_patterns(&whitelist)?,
            ignore: compile_patterns(&ignore)?,
            identity_marker: layer
                .identity_marker
                .unwrap_or_else(|| paths::DEFAULT_IDENTITY_MARKER.to_string()),
            version_manifest: layer
                .version_manifest
                .unwrap_or_else(|| paths::DEFAULT_VERSION_MANIFEST.to_string()),
            published_extension: layer
                .published_extension
                .unwrap_or_else(|| paths::DEFAULT_PUBLISHED_EXTENSION.to_string()),
            ambiguity: layer.ambiguity.unwrap_or_default(),
            staging_conflict: layer.staging_conflict.unwrap_or_default(),
            transfer: layer.transfer.unwrap_or_default(),
            log_file: layer.log_file,
        })
    }

    pub fn staging_dir(&self, namespace: &Namespace) -> PathBuf {
        paths::staging_dir(&self.volatile_root, namespace)
    }

    pub fn canonical_dir(&self, namespace: &Namespace) -> PathBuf {
        paths::canonical_dir(&self.canonical_root, namespace)
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}
