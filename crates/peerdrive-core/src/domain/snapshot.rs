//! Snapshots
//!
//! A Snapshot is an immutable, path-keyed record of every file and folder
//! in a namespace at one instant. Live snapshots are built by walking the
//! sync root; the baseline is a persisted snapshot of the last completed
//! synchronization.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::EntryState;
use super::newtypes::RelativePath;

/// Immutable mapping from relative path to entry state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    captured_at: DateTime<Utc>,
    entries: BTreeMap<RelativePath, EntryState>,
}

impl Snapshot {
    /// A snapshot with no entries, used when no baseline exists yet
    pub fn empty() -> Self {
        Self {
            captured_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }

    /// Build a snapshot from `(path, state)` pairs captured now
    ///
    /// The namespace root is never recorded; a root entry is dropped.
    pub fn from_entries(entries: impl IntoIterator<Item = (RelativePath, EntryState)>) -> Self {
        Self::with_timestamp(Utc::now(), entries)
    }

    /// Build a snapshot with an explicit capture time (used when reloading)
    pub fn with_timestamp(
        captured_at: DateTime<Utc>,
        entries: impl IntoIterator<Item = (RelativePath, EntryState)>,
    ) -> Self {
        let entries = entries
            .into_iter()
            .filter(|(path, _)| !path.is_root())
            .collect();
        Self {
            captured_at,
            entries,
        }
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn get(&self, path: &RelativePath) -> Option<&EntryState> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &RelativePath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in path order (parents before children)
    pub fn iter(&self) -> impl Iterator<Item = (&RelativePath, &EntryState)> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &RelativePath> {
        self.entries.keys()
    }

    /// Number of file entries
    pub fn file_count(&self) -> usize {
        self.entries.values().filter(|e| !e.is_folder()).count()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
