//! PeerDrive Conflict - Three-way change classification
//!
//! Provides:
//! - The baseline/local/remote decision table as a pure function
//! - The policy for paths created independently on both sides
//! - Glob-based per-path policy overrides

pub mod detector;
pub mod error;
pub mod policy;

pub use detector::{ChangeDetector, Observation, SyncAction};
pub use error::ConflictError;
pub use policy::{BothAddedStrategy, ConflictRule, PolicyEngine};
