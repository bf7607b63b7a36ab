//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and invalid namespace tree operations.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid relative path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid content hash (expected 32 bytes, Base64 encoded)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid node name (empty, contains a separator, or a dot segment)
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// No node with the given ID exists in the tree
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// The operation requires a folder node
    #[error("Not a folder: {0}")]
    NotAFolder(String),

    /// The operation requires a file node
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// A sibling with the same name already exists
    #[error("Name already exists under parent: {0}")]
    DuplicateName(String),

    /// Only empty folders can be removed with `remove_empty`
    #[error("Folder is not empty: {0}")]
    FolderNotEmpty(String),

    /// The operation would break the tree structure
    #[error("Invalid tree operation: {0}")]
    InvalidTreeOperation(String),
}
