//! Config file loading and layering integration tests.

use assert_fs::prelude::*;
use imgsync_core::{
    config::ConfigFile, AmbiguityPolicy, ConfigError, PublishConfig, StagingConflictPolicy,
    TransferKind,
};
use predicates::prelude::*;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// 1. Loading
// ---------------------------------------------------------------------------

#[test]
fn missing_file_is_an_empty_layer() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let layer = ConfigFile::load_at(&dir.path().join("absent.yaml")).expect("load");
    assert_eq!(layer, ConfigFile::default());
}

#[test]
fn full_file_round_trips_every_key() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str(
        r#"
destination_root: /srv/publish
volatile_root: /srv/volatile
canonical_root: /srv/canonical
lock_root: /var/lock
whitelist: ['^.*DELIVERY\.jp2$', '^.*ACCESS\.jp2$']
ignore: []
identity_marker: 0=dflat_1.0
version_manifest: current.txt
published_extension: jp2
ambiguity: lenient
staging_conflict: skip
transfer: copy
log_file: /var/log/imgsync.log
"#,
    )
    .expect("write");

    let config = PublishConfig::resolve(ConfigFile::load_at(file.path()).expect("load"))
        .expect("resolve");
    assert_eq!(config.destination_root, PathBuf::from("/srv/publish"));
    assert_eq!(config.lock_root, PathBuf::from("/var/lock"));
    assert_eq!(config.whitelist.len(), 2);
    assert!(config.ignore.is_empty());
    assert_eq!(config.ambiguity, AmbiguityPolicy::Lenient);
    assert_eq!(config.staging_conflict, StagingConflictPolicy::Skip);
    assert_eq!(config.transfer, TransferKind::Copy);
    assert_eq!(config.log_file, Some(PathBuf::from("/var/log/imgsync.log")));
}

#[test]
fn malformed_yaml_reports_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("destination_root: [unclosed\n").expect("write");

    let err = ConfigFile::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(
        predicate::str::contains("config.yaml").eval(err.to_string().as_str()),
        "must contain file path, got: {err}"
    );
}

#[test]
fn unknown_key_is_rejected() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("destinaton_root: /typo\n").expect("write");

    let err = ConfigFile::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Layering
// ---------------------------------------------------------------------------

#[test]
fn environment_overrides_file_roots() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("destination_root: /from/file\nvolatile_root: /v\ncanonical_root: /c\n")
        .expect("write");

    let merged = ConfigFile::load_at(file.path())
        .expect("load")
        .layer(ConfigFile::from_env_vars([("IM_DESTINATION", "/from/env")]));
    let config = PublishConfig::resolve(merged).expect("resolve");
    assert_eq!(config.destination_root, PathBuf::from("/from/env"));
    assert_eq!(config.volatile_root, PathBuf::from("/v"));
}

#[test]
fn missing_roots_message_lists_keys() {
    let err = PublishConfig::resolve(ConfigFile::default()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "missing configuration: destination_root, volatile_root, canonical_root"
    );
}
