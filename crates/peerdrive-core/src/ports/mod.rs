//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are interfaces the reconciliation core depends on, but whose
//! implementations are owned elsewhere.
//!
//! ## Ports Overview
//!
//! - [`INamespaceTree`] - Read-only queries against the remote namespace tree

pub mod namespace_tree;

pub use namespace_tree::INamespaceTree;
