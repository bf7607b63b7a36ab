//! Snapshot builder (secondary/driven adapter)
//!
//! Walks the sync root with `tokio::fs` and records every folder and file
//! under its [`RelativePath`]. File contents are streamed through SHA-256 on
//! the tokio runtime, bounded by a semaphore.
//!
//! ## Design Decisions
//!
//! - **All-or-nothing**: any I/O failure aborts the walk, cancels pending
//!   hash tasks and returns [`SyncError::SnapshotReadFailure`].
//! - **Baseline exclusion**: the baseline file and its temporary write file
//!   sit under the root but are never part of the namespace.
//! - **Symlinks**: skipped unless `follow_symlinks` is set; when followed,
//!   a directory whose canonical path is already on its own ancestor chain
//!   is a cycle and is not descended into. Links to folders elsewhere in
//!   the tree are walked like any other folder.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;
use peerdrive_core::{
    config::{Config, SnapshotConfig},
    domain::{ContentHash, ContentHasher, EntryState, RelativePath, Snapshot},
};
use tokio::io::AsyncReadExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, trace, warn};

use crate::SyncError;

/// Read buffer used when streaming file contents into the hasher
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Suffix of the temporary file used for atomic baseline writes
pub(crate) const TMP_SUFFIX: &str = ".tmp";

fn read_failure(path: &Path, source: std::io::Error) -> SyncError {
    SyncError::SnapshotReadFailure {
        path: path.to_path_buf(),
        source,
    }
}

/// Compiled `snapshot.ignore` globs, matched against relative paths
///
/// Shared by the walk and the synchronizer so an ignored path is absent
/// from every state that gets compared, not just the local one.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    /// # Errors
    /// Returns [`SyncError::InvalidPattern`] if a glob does not compile
    pub fn new(patterns: &[String]) -> Result<Self, SyncError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| SyncError::InvalidPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether a pattern matches `path` itself
    pub fn matches(&self, path: &RelativePath) -> bool {
        self.patterns.iter().any(|p| p.matches(path.as_str()))
    }

    /// Whether `path` or any of its ancestors is ignored
    ///
    /// The walk never descends into an ignored folder, so everything below
    /// one is ignored too.
    pub fn covers(&self, path: &RelativePath) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let mut cursor = Some(path.clone());
        while let Some(current) = cursor {
            if current.is_root() {
                break;
            }
            if self.matches(&current) {
                return true;
            }
            cursor = current.parent();
        }
        false
    }
}

/// Builds live [`Snapshot`]s of a sync root
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    ignore: IgnoreSet,
    follow_symlinks: bool,
    hash_concurrency: usize,
    excluded_names: Vec<String>,
}

impl SnapshotBuilder {
    /// Create a builder from the snapshot settings and the baseline file name
    ///
    /// # Errors
    /// Returns [`SyncError::InvalidPattern`] if an ignore glob does not compile
    pub fn new(config: &SnapshotConfig, baseline_file: &str) -> Result<Self, SyncError> {
        Ok(Self {
            ignore: IgnoreSet::new(&config.ignore)?,
            follow_symlinks: config.follow_symlinks,
            hash_concurrency: config.hash_concurrency.max(1),
            excluded_names: vec![
                baseline_file.to_string(),
                format!("{baseline_file}{TMP_SUFFIX}"),
            ],
        })
    }

    /// Create a builder from the full application configuration
    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        Self::new(&config.snapshot, &config.sync.baseline_file)
    }

    fn is_excluded(&self, path: &RelativePath) -> bool {
        path.depth() == 1 && self.excluded_names.iter().any(|n| n == path.as_str())
    }

    /// Walk `root` and return a snapshot of everything below it
    ///
    /// Returns only after every file has been hashed.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub async fn build(&self, root: &Path) -> Result<Snapshot, SyncError> {
        let metadata = tokio::fs::metadata(root)
            .await
            .map_err(|e| read_failure(root, e))?;
        if !metadata.is_dir() {
            return Err(read_failure(
                root,
                std::io::Error::new(ErrorKind::Other, "sync root is not a directory"),
            ));
        }

        let mut entries: BTreeMap<RelativePath, EntryState> = BTreeMap::new();
        let mut hashing: JoinSet<Result<(RelativePath, ContentHash), SyncError>> = JoinSet::new();
        let permits = Arc::new(Semaphore::new(self.hash_concurrency));

        // Canonical paths from the root down to each pending folder; only
        // tracked when links are followed, since cycles need a link
        let mut root_chain: Vec<PathBuf> = Vec::new();
        if self.follow_symlinks {
            let canonical = tokio::fs::canonicalize(root)
                .await
                .map_err(|e| read_failure(root, e))?;
            root_chain.push(canonical);
        }

        let mut pending: Vec<(RelativePath, PathBuf, Arc<Vec<PathBuf>>)> =
            vec![(RelativePath::root(), root.to_path_buf(), Arc::new(root_chain))];

        while let Some((dir_rel, dir_path, chain)) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir_path)
                .await
                .map_err(|e| read_failure(&dir_path, e))?;

            while let Some(entry) = read_dir
                .next_entry()
                .await
                .map_err(|e| read_failure(&dir_path, e))?
            {
                let path = entry.path();
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                    warn!(path = %path.display(), "Skipping entry with non UTF-8 name");
                    continue;
                };
                let rel = dir_rel.join(&name)?;

                if self.is_excluded(&rel) {
                    trace!(path = %rel, "Skipping baseline file");
                    continue;
                }
                if self.ignore.matches(&rel) {
                    debug!(path = %rel, "Ignored by pattern");
                    continue;
                }

                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| read_failure(&path, e))?;

                let (is_dir, is_file) = if file_type.is_symlink() {
                    if !self.follow_symlinks {
                        debug!(path = %rel, "Skipping symlink");
                        continue;
                    }
                    match tokio::fs::metadata(&path).await {
                        Ok(target) => (target.is_dir(), target.is_file()),
                        Err(e) => {
                            warn!(path = %rel, error = %e, "Skipping broken symlink");
                            continue;
                        }
                    }
                } else {
                    (file_type.is_dir(), file_type.is_file())
                };

                if is_dir {
                    let child_chain = if self.follow_symlinks {
                        let canonical = tokio::fs::canonicalize(&path)
                            .await
                            .map_err(|e| read_failure(&path, e))?;
                        if chain.contains(&canonical) {
                            debug!(path = %rel, "Skipping symlink cycle back to an ancestor");
                            continue;
                        }
                        let mut extended = Vec::with_capacity(chain.len() + 1);
                        extended.extend(chain.iter().cloned());
                        extended.push(canonical);
                        Arc::new(extended)
                    } else {
                        Arc::clone(&chain)
                    };
                    trace!(path = %rel, "Folder");
                    entries.insert(rel.clone(), EntryState::folder());
                    pending.push((rel, path, child_chain));
                } else if is_file {
                    let permits = Arc::clone(&permits);
                    hashing.spawn(async move {
                        let _permit = permits
                            .acquire_owned()
                            .await
                            .map_err(|e| read_failure(&path, std::io::Error::new(ErrorKind::Other, e)))?;
                        let hash = hash_file(&path).await?;
                        Ok((rel, hash))
                    });
                } else {
                    debug!(path = %rel, "Skipping special file");
                }
            }
        }

        while let Some(joined) = hashing.join_next().await {
            match joined {
                Ok(Ok((rel, hash))) => {
                    trace!(path = %rel, hash = %hash, "File hashed");
                    entries.insert(rel, EntryState::file(hash));
                }
                Ok(Err(e)) => {
                    hashing.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    hashing.abort_all();
                    return Err(read_failure(root, std::io::Error::from(e)));
                }
            }
        }

        let snapshot = Snapshot::from_entries(entries);
        info!(
            entries = snapshot.len(),
            files = snapshot.file_count(),
            "Snapshot built"
        );
        Ok(snapshot)
    }
}

/// Stream a file through SHA-256
async fn hash_file(path: &Path) -> Result<ContentHash, SyncError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| read_failure(path, e))?;
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf).await.map_err(|e| read_failure(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

// ============================================================================
// Unit tests
// ============================================================================
