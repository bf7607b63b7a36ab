//! Domain entities and business logic
//!
//! This module contains the core domain types for PeerDrive:
//! - Newtypes for type-safe identifiers, paths and content hashes
//! - Entry states shared by snapshots and the namespace tree
//! - Snapshots of a namespace at one instant
//! - The namespace tree model
//! - Domain-specific error types

pub mod entry;
pub mod errors;
pub mod newtypes;
pub mod snapshot;
pub mod tree;

// Re-export commonly used types
pub use entry::{EntryKind, EntryState};
pub use errors::DomainError;
pub use newtypes::*;
pub use snapshot::Snapshot;
pub use tree::{FlatNode, KeyPair, NamespaceTree, TreeNode};
