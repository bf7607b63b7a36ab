//! Namespace entries
//!
//! The comparable state of one path, shared by snapshots and the flattened
//! namespace tree.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::ContentHash;

/// Whether an entry is a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Folder,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntryKind::File => "file",
            EntryKind::Folder => "folder",
        };
        write!(f, "{}", s)
    }
}

/// State of a single path: its kind and, for files, its content hash
///
/// Folders never carry a hash. A file may lack one when the remote tree
/// registered it before its content was hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEntryState")]
pub struct EntryState {
    kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_hash: Option<ContentHash>,
}

/// Wire form of [`EntryState`] before the folder invariant is checked
#[derive(Deserialize)]
struct RawEntryState {
    kind: EntryKind,
    #[serde(default)]
    content_hash: Option<ContentHash>,
}

impl TryFrom<RawEntryState> for EntryState {
    type Error = DomainError;

    fn try_from(raw: RawEntryState) -> Result<Self, Self::Error> {
        match (raw.kind, raw.content_hash) {
            (EntryKind::Folder, Some(hash)) => Err(DomainError::InvalidHash(format!(
                "folder carries content hash {hash}"
            ))),
            (EntryKind::Folder, None) => Ok(Self::folder()),
            (EntryKind::File, content_hash) => Ok(Self {
                kind: EntryKind::File,
                content_hash,
            }),
        }
    }
}

impl EntryState {
    /// A file with the given content hash
    pub fn file(content_hash: ContentHash) -> Self {
        Self {
            kind: EntryKind::File,
            content_hash: Some(content_hash),
        }
    }

    /// A file whose content hash is not known
    pub fn unhashed_file() -> Self {
        Self {
            kind: EntryKind::File,
            content_hash: None,
        }
    }

    /// A folder
    pub fn folder() -> Self {
        Self {
            kind: EntryKind::Folder,
            content_hash: None,
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    pub fn content_hash(&self) -> Option<&ContentHash> {
        self.content_hash.as_ref()
    }

    /// Whether two states count as "unchanged" relative to each other
    ///
    /// Folders always match folders. Files match when their hashes are
    /// equal. A kind change never matches.
    pub fn matches(&self, other: &EntryState) -> bool {
        match (self.kind, other.kind) {
            (EntryKind::Folder, EntryKind::Folder) => true,
            (EntryKind::File, EntryKind::File) => self.content_hash == other.content_hash,
            _ => false,
        }
    }
}
