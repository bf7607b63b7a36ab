//! Baseline persistence
//!
//! The baseline is the snapshot recorded at the end of the last completed
//! synchronization. It is stored as a versioned JSON envelope directly under
//! the sync root and replaced atomically (temp file + rename).

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use peerdrive_core::{
    config::Config,
    domain::{EntryState, RelativePath, Snapshot},
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::filesystem::TMP_SUFFIX;
use crate::SyncError;

/// Version written into every baseline envelope
pub const BASELINE_FORMAT_VERSION: u32 = 1;

/// Port for loading and storing the baseline snapshot
#[async_trait]
pub trait IBaselineStore: Send + Sync {
    /// Replace the stored baseline with `snapshot`
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), SyncError>;

    /// Load the stored baseline
    ///
    /// # Errors
    /// [`SyncError::BaselineMissing`] when nothing has been persisted yet,
    /// [`SyncError::BaselineCorrupt`] when the stored data cannot be decoded
    async fn load(&self) -> Result<Snapshot, SyncError>;

    /// Load the stored baseline, treating a missing one as empty
    async fn load_or_empty(&self) -> Result<Snapshot, SyncError> {
        match self.load().await {
            Err(SyncError::BaselineMissing(path)) => {
                info!(path = %path.display(), "No baseline yet, starting from an empty one");
                Ok(Snapshot::empty())
            }
            other => other,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BaselineEnvelope {
    format_version: u32,
    captured_at: DateTime<Utc>,
    entries: BTreeMap<RelativePath, EntryState>,
}

#[derive(Deserialize)]
struct VersionHeader {
    format_version: u32,
}

/// [`IBaselineStore`] backed by a JSON file under the sync root
#[derive(Debug)]
pub struct FileBaselineStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileBaselineStore {
    pub fn new(root: &Path, file_name: &str) -> Self {
        Self {
            path: root.join(file_name),
            lock: RwLock::new(()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.sync.root, &config.sync.baseline_file)
    }

    /// Location of the baseline file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut p = self.path.as_os_str().to_owned();
        p.push(TMP_SUFFIX);
        PathBuf::from(p)
    }

    fn write_failure(&self, source: std::io::Error) -> SyncError {
        SyncError::BaselineWriteFailure {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, reason: impl ToString) -> SyncError {
        SyncError::BaselineCorrupt {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl IBaselineStore for FileBaselineStore {
    #[instrument(skip_all, fields(entries = snapshot.len()))]
    async fn persist(&self, snapshot: &Snapshot) -> Result<(), SyncError> {
        let envelope = BaselineEnvelope {
            format_version: BASELINE_FORMAT_VERSION,
            captured_at: snapshot.captured_at(),
            entries: snapshot.iter().map(|(p, s)| (p.clone(), *s)).collect(),
        };
        let data = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| self.write_failure(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        let _guard = self.lock.write().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_failure(e))?;
        }

        let tmp_path = self.tmp_path();
        debug!(?tmp_path, "writing to temporary file");
        tokio::fs::write(&tmp_path, &data)
            .await
            .map_err(|e| self.write_failure(e))?;

        debug!("renaming temporary file to target");
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.write_failure(e))?;

        info!(path = %self.path.display(), bytes = data.len(), "Baseline persisted");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn load(&self) -> Result<Snapshot, SyncError> {
        let data = {
            let _guard = self.lock.read().await;
            match tokio::fs::read(&self.path).await {
                Ok(data) => data,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(SyncError::BaselineMissing(self.path.clone()));
                }
                Err(e) => return Err(self.corrupt(e)),
            }
        };

        let header: VersionHeader = serde_json::from_slice(&data).map_err(|e| self.corrupt(e))?;
        if header.format_version != BASELINE_FORMAT_VERSION {
            return Err(self.corrupt(format!(
                "unsupported format_version {}",
                header.format_version
            )));
        }

        let envelope: BaselineEnvelope =
            serde_json::from_slice(&data).map_err(|e| self.corrupt(e))?;
        let snapshot = Snapshot::with_timestamp(envelope.captured_at, envelope.entries);
        debug!(path = %self.path.display(), entries = snapshot.len(), "Baseline loaded");
        Ok(snapshot)
    }
}
