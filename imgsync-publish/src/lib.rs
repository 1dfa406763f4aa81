//! imgsync-publish: reconcile a source collection against the canonical tree
//! and publish new or updated derivatives.
//!
//! Entry point is [`Pipeline::run`]; the stages it drives are public so the
//! CLI (`status`, `unlock`) and tests can use them directly.

pub mod canonical;
pub mod discovery;
pub mod error;
pub mod executor;
mod link;
pub mod lock;
pub mod pipeline;
pub mod report;
pub mod selector;
pub mod staging;
pub mod transfer;
pub mod version;

pub use canonical::{CanonicalReconciler, SlotState};
pub use error::PublishError;
pub use executor::PublishExecutor;
pub use lock::{LockInfo, LockState, RunLock};
pub use pipeline::Pipeline;
pub use report::{ArtifactOutcome, ConflictRecord, OutcomeStatus, RunReport};
pub use selector::{ArtifactSelector, Selection};
pub use staging::{StageOutcome, StagingArea};
pub use transfer::{CopyTransfer, RsyncTransfer, Transfer, TransferError};
