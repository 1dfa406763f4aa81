//! imgsync core library: domain types, configuration, path layout, errors.
//!
//! Public API surface:
//! - [`types`]: namespaces, version tokens, destination keys, policies
//! - [`config`]: layered configuration resolved into [`PublishConfig`]
//! - [`paths`]: where every namespace-scoped tree lives on disk
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{ConfigFile, PublishConfig};
pub use error::ConfigError;
pub use types::{
    AmbiguityPolicy, DestinationKey, ManagedObject, Namespace, PublishAction,
    StagingConflictPolicy, TransferKind, VersionToken,
};
