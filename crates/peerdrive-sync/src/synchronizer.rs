//! Three-way reconciliation
//!
//! Joins the baseline, the live local snapshot and the flattened remote tree
//! on their paths and classifies every path with
//! [`ChangeDetector::classify`]. Inputs are immutable once the synchronizer
//! is built, so every query recomputes the same answer.
//!
//! Paths covered by the ignore globs are dropped from all three states
//! before the join. The walk never reports them locally, so keeping them in
//! the baseline or the remote tree would read as a deletion or an addition.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use peerdrive_conflict::{BothAddedStrategy, ChangeDetector, Observation, PolicyEngine, SyncAction};
use peerdrive_core::{
    config::Config,
    domain::{EntryState, FlatNode, NamespaceTree, NodeId, RelativePath, Snapshot},
    ports::INamespaceTree,
};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::baseline::IBaselineStore;
use crate::filesystem::{IgnoreSet, SnapshotBuilder};
use crate::SyncError;

/// A node of the remote tree that requires action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
    pub id: NodeId,
    pub path: RelativePath,
    pub state: EntryState,
}

impl From<FlatNode> for RemoteNode {
    fn from(node: FlatNode) -> Self {
        Self {
            id: node.id,
            path: node.path,
            state: node.state,
        }
    }
}

/// Knobs for a reconciliation pass
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Join paths exactly (`true`) or on their lower-cased form
    pub case_sensitive: bool,
    /// Outcome for paths created independently on both sides
    pub policy: PolicyEngine,
    /// Paths left out of the comparison on every side
    pub ignore: IgnoreSet,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            policy: PolicyEngine::default(),
            ignore: IgnoreSet::default(),
        }
    }
}

impl SyncOptions {
    /// # Errors
    /// Returns [`SyncError::Conflict`] if the conflict section is invalid,
    /// [`SyncError::InvalidPattern`] if an ignore glob does not compile
    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        Ok(Self {
            case_sensitive: config.snapshot.case_sensitive,
            policy: PolicyEngine::from_config(&config.conflicts)?,
            ignore: IgnoreSet::new(&config.snapshot.ignore)?,
        })
    }

    pub fn with_both_added(mut self, strategy: BothAddedStrategy) -> Self {
        self.policy = PolicyEngine::with_strategy(strategy);
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_ignore(mut self, ignore: IgnoreSet) -> Self {
        self.ignore = ignore;
        self
    }
}

/// The six action sets of one pass, each in path order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub added_locally: Vec<PathBuf>,
    pub updated_locally: Vec<PathBuf>,
    pub deleted_remotely: Vec<PathBuf>,
    pub added_remotely: Vec<RemoteNode>,
    pub updated_remotely: Vec<RemoteNode>,
    pub deleted_locally: Vec<RemoteNode>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.total_actions() == 0
    }

    pub fn total_actions(&self) -> usize {
        self.added_locally.len()
            + self.updated_locally.len()
            + self.deleted_remotely.len()
            + self.added_remotely.len()
            + self.updated_remotely.len()
            + self.deleted_locally.len()
    }
}

/// One joined path across the three states
#[derive(Debug, Default)]
struct Row {
    baseline: Option<(RelativePath, EntryState)>,
    local: Option<(RelativePath, EntryState)>,
    remote: Option<RemoteNode>,
}

impl Row {
    fn display_path(&self) -> Option<&RelativePath> {
        self.local
            .as_ref()
            .map(|(p, _)| p)
            .or_else(|| self.remote.as_ref().map(|n| &n.path))
            .or_else(|| self.baseline.as_ref().map(|(p, _)| p))
    }
}

/// Compares baseline, local and remote state of one namespace
#[derive(Debug)]
pub struct FileSynchronizer {
    root: PathBuf,
    rows: BTreeMap<RelativePath, Row>,
    options: SyncOptions,
}

impl FileSynchronizer {
    /// Build a synchronizer from already captured state
    ///
    /// The tree is flattened once here and not consulted afterwards.
    ///
    /// # Errors
    /// Returns [`SyncError::CaseCollision`] in case-insensitive mode when two
    /// paths of the same state fold to the same key
    pub fn new<T>(
        root: &Path,
        baseline: &Snapshot,
        local: &Snapshot,
        tree: &T,
        options: SyncOptions,
    ) -> Result<Self, SyncError>
    where
        T: INamespaceTree + ?Sized,
    {
        Self::from_parts(root, baseline, local, tree.flatten(), options)
    }

    /// Capture local and baseline state, flatten the shared tree, and build
    /// a synchronizer from the three
    #[instrument(skip_all, fields(root = %root.display()))]
    pub async fn prepare(
        root: &Path,
        builder: &SnapshotBuilder,
        baseline_store: &dyn IBaselineStore,
        tree: &RwLock<NamespaceTree>,
        options: SyncOptions,
    ) -> Result<Self, SyncError> {
        let local = builder.build(root).await?;
        let baseline = baseline_store.load_or_empty().await?;
        let remote = {
            let guard = tree.read().await;
            guard.flatten()
        };
        Self::from_parts(root, &baseline, &local, remote, options)
    }

    fn from_parts(
        root: &Path,
        baseline: &Snapshot,
        local: &Snapshot,
        remote: Vec<FlatNode>,
        options: SyncOptions,
    ) -> Result<Self, SyncError> {
        let key = |path: &RelativePath| {
            if options.case_sensitive {
                path.clone()
            } else {
                path.to_lowercase()
            }
        };

        let mut rows: BTreeMap<RelativePath, Row> = BTreeMap::new();
        let mut ignored = 0usize;
        let mut skip = |path: &RelativePath| {
            let covered = options.ignore.covers(path);
            if covered {
                ignored += 1;
            }
            covered
        };

        for (path, state) in baseline.iter() {
            if skip(path) {
                continue;
            }
            let row = rows.entry(key(path)).or_default();
            if let Some((first, _)) = &row.baseline {
                return Err(collision(first, path));
            }
            row.baseline = Some((path.clone(), *state));
        }
        for (path, state) in local.iter() {
            if skip(path) {
                continue;
            }
            let row = rows.entry(key(path)).or_default();
            if let Some((first, _)) = &row.local {
                return Err(collision(first, path));
            }
            row.local = Some((path.clone(), *state));
        }
        for node in remote {
            if skip(&node.path) {
                continue;
            }
            let row = rows.entry(key(&node.path)).or_default();
            if let Some(first) = &row.remote {
                return Err(collision(&first.path, &node.path));
            }
            row.remote = Some(node.into());
        }

        debug!(
            baseline = baseline.len(),
            local = local.len(),
            paths = rows.len(),
            ignored,
            "Joined states"
        );

        Ok(Self {
            root: root.to_path_buf(),
            rows,
            options,
        })
    }

    /// The sync root local paths are resolved against
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn classify_row(&self, row: &Row) -> Option<SyncAction> {
        let obs = Observation::from_states(
            row.baseline.as_ref().map(|(_, s)| s),
            row.local.as_ref().map(|(_, s)| s),
            row.remote.as_ref().map(|n| &n.state),
        );
        let strategy = if !obs.in_baseline && obs.in_local && obs.in_remote {
            row.display_path()
                .map(|p| self.options.policy.evaluate(p.as_str()))
                .unwrap_or_else(|| self.options.policy.default_strategy())
        } else {
            self.options.policy.default_strategy()
        };
        let action = ChangeDetector::classify(&obs, strategy);
        if let (Some(action), Some(path)) = (action, row.display_path()) {
            debug!(path = %path, action = %action, "Path classified");
        }
        action
    }

    fn local_path(&self, row: &Row) -> Option<PathBuf> {
        row.local.as_ref().map(|(p, _)| p.to_path(&self.root))
    }

    fn collect_local(&self, wanted: SyncAction) -> Vec<PathBuf> {
        self.rows
            .values()
            .filter(|row| self.classify_row(row) == Some(wanted))
            .filter_map(|row| self.local_path(row))
            .collect()
    }

    fn collect_remote(&self, wanted: SyncAction) -> Vec<RemoteNode> {
        self.rows
            .values()
            .filter(|row| self.classify_row(row) == Some(wanted))
            .filter_map(|row| row.remote.clone())
            .collect()
    }

    /// Local files and folders to upload as new remote nodes
    pub fn get_added_locally(&self) -> Vec<PathBuf> {
        self.collect_local(SyncAction::AddedLocally)
    }

    /// Local files whose new content must be uploaded
    pub fn get_updated_locally(&self) -> Vec<PathBuf> {
        self.collect_local(SyncAction::UpdatedLocally)
    }

    /// Local copies to remove because the remote side deleted them
    pub fn get_deleted_remotely(&self) -> Vec<PathBuf> {
        self.collect_local(SyncAction::DeletedRemotely)
    }

    /// Remote nodes to download as new local entries
    pub fn get_added_remotely(&self) -> Vec<RemoteNode> {
        self.collect_remote(SyncAction::AddedRemotely)
    }

    /// Remote nodes whose content must be downloaded over the local copy
    pub fn get_updated_remotely(&self) -> Vec<RemoteNode> {
        self.collect_remote(SyncAction::UpdatedRemotely)
    }

    /// Remote nodes to remove because the local side deleted them
    pub fn get_deleted_locally(&self) -> Vec<RemoteNode> {
        self.collect_remote(SyncAction::DeletedLocally)
    }

    /// Classify a single path
    pub fn classify(&self, path: &RelativePath) -> Option<SyncAction> {
        let key = if self.options.case_sensitive {
            path.clone()
        } else {
            path.to_lowercase()
        };
        self.rows.get(&key).and_then(|row| self.classify_row(row))
    }

    /// All six action sets in a single pass
    pub fn plan(&self) -> SyncPlan {
        let mut plan = SyncPlan::default();
        for row in self.rows.values() {
            let Some(action) = self.classify_row(row) else {
                continue;
            };
            if action.targets_local_path() {
                let Some(path) = self.local_path(row) else {
                    continue;
                };
                match action {
                    SyncAction::AddedLocally => plan.added_locally.push(path),
                    SyncAction::UpdatedLocally => plan.updated_locally.push(path),
                    _ => plan.deleted_remotely.push(path),
                }
            } else {
                let Some(node) = row.remote.clone() else {
                    continue;
                };
                match action {
                    SyncAction::AddedRemotely => plan.added_remotely.push(node),
                    SyncAction::UpdatedRemotely => plan.updated_remotely.push(node),
                    _ => plan.deleted_locally.push(node),
                }
            }
        }

        info!(
            added_locally = plan.added_locally.len(),
            updated_locally = plan.updated_locally.len(),
            deleted_remotely = plan.deleted_remotely.len(),
            added_remotely = plan.added_remotely.len(),
            updated_remotely = plan.updated_remotely.len(),
            deleted_locally = plan.deleted_locally.len(),
            "Sync plan computed"
        );
        plan
    }
}

fn collision(first: &RelativePath, second: &RelativePath) -> SyncError {
    SyncError::CaseCollision {
        first: first.clone(),
        second: second.clone(),
    }
}

// ============================================================================
// Unit tests
// ============================================================================
