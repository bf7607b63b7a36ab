//! Error types for the conflict engine

use thiserror::Error;

/// Errors that can occur while building a conflict policy
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// Unknown strategy name in configuration
    #[error("invalid strategy '{strategy}'; valid: remote_wins, local_wins, skip")]
    InvalidStrategy { strategy: String },

    /// Invalid glob pattern in conflict rule
    #[error("invalid glob pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
