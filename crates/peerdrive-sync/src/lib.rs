//! PeerDrive Sync - Reconciliation between the local disk and the remote tree
//!
//! Provides:
//! - Snapshots of the sync root with concurrent content hashing
//! - Persistence of the baseline (state at the last completed sync)
//! - The three-way comparison producing the six action sets
//!
//! ## Modules
//!
//! - [`filesystem`] - Snapshot builder (recursive walk, SHA-256 hashing)
//! - [`baseline`] - Baseline store port and atomic JSON file adapter
//! - [`synchronizer`] - Three-way diff of baseline, local and remote state

pub mod baseline;
pub mod filesystem;
pub mod synchronizer;

use std::path::PathBuf;

use peerdrive_conflict::ConflictError;
use peerdrive_core::domain::{DomainError, RelativePath};
use thiserror::Error;

pub use baseline::{FileBaselineStore, IBaselineStore};
pub use filesystem::{IgnoreSet, SnapshotBuilder};
pub use synchronizer::{FileSynchronizer, RemoteNode, SyncOptions, SyncPlan};

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// The sync root could not be fully read; no partial snapshot is returned
    #[error("Snapshot read failure at {path}: {source}")]
    SnapshotReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No baseline has been persisted yet
    #[error("Baseline not found: {0}")]
    BaselineMissing(PathBuf),

    /// The baseline exists but cannot be decoded
    #[error("Baseline corrupt at {path}: {reason}")]
    BaselineCorrupt { path: PathBuf, reason: String },

    /// The baseline could not be written
    #[error("Baseline write failure at {path}: {source}")]
    BaselineWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two distinct paths fold to the same key on a case-insensitive filesystem
    #[error("Case collision between {first} and {second}")]
    CaseCollision {
        first: RelativePath,
        second: RelativePath,
    },

    /// An ignore pattern is not a valid glob
    #[error("Invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Conflict policy could not be built from configuration
    #[error("Conflict policy error: {0}")]
    Conflict(#[from] ConflictError),

    /// A domain-level error propagated from peerdrive-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}
