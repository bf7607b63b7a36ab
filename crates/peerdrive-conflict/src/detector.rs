//! Change classification
//!
//! Classifies one path from its presence and change status in the three
//! snapshots of a sync cycle: the baseline (last completed sync), the live
//! local walk and the flattened remote tree. Every path yields at most one
//! action.

use std::fmt;

use peerdrive_core::domain::EntryState;
use tracing::trace;

use crate::policy::BothAddedStrategy;

/// Action a path requires to bring both sides back in step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAction {
    /// New on the local side, upload it
    AddedLocally,
    /// Changed on the local side only, upload it
    UpdatedLocally,
    /// Gone from the remote side, delete the local copy
    DeletedRemotely,
    /// New on the remote side, download it
    AddedRemotely,
    /// Changed on the remote side, download it
    UpdatedRemotely,
    /// Gone from the local side, delete the remote node
    DeletedLocally,
}

impl SyncAction {
    pub const ALL: [SyncAction; 6] = [
        SyncAction::AddedLocally,
        SyncAction::UpdatedLocally,
        SyncAction::DeletedRemotely,
        SyncAction::AddedRemotely,
        SyncAction::UpdatedRemotely,
        SyncAction::DeletedLocally,
    ];

    /// Whether the action is carried out against the local filesystem
    /// (its subject is a local path rather than a remote node)
    pub fn targets_local_path(&self) -> bool {
        matches!(
            self,
            SyncAction::AddedLocally | SyncAction::UpdatedLocally | SyncAction::DeletedRemotely
        )
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncAction::AddedLocally => "added_locally",
            SyncAction::UpdatedLocally => "updated_locally",
            SyncAction::DeletedRemotely => "deleted_remotely",
            SyncAction::AddedRemotely => "added_remotely",
            SyncAction::UpdatedRemotely => "updated_remotely",
            SyncAction::DeletedLocally => "deleted_locally",
        };
        write!(f, "{}", s)
    }
}

/// Presence and change facts about one path across the three snapshots
///
/// `local_changed` and `remote_changed` are relative to the baseline and
/// only meaningful when the path is in the baseline and on that side.
/// `sides_agree` compares local against remote directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Observation {
    pub in_baseline: bool,
    pub in_local: bool,
    pub in_remote: bool,
    pub local_changed: bool,
    pub remote_changed: bool,
    pub sides_agree: bool,
}

impl Observation {
    /// Derives the observation from the three optional entry states
    pub fn from_states(
        baseline: Option<&EntryState>,
        local: Option<&EntryState>,
        remote: Option<&EntryState>,
    ) -> Self {
        let changed = |side: Option<&EntryState>| match (baseline, side) {
            (Some(m), Some(s)) => !m.matches(s),
            _ => false,
        };
        let sides_agree = match (local, remote) {
            (Some(l), Some(r)) => l.matches(r),
            _ => false,
        };

        Self {
            in_baseline: baseline.is_some(),
            in_local: local.is_some(),
            in_remote: remote.is_some(),
            local_changed: changed(local),
            remote_changed: changed(remote),
            sides_agree,
        }
    }
}

/// Applies the three-way decision table
pub struct ChangeDetector;

impl ChangeDetector {
    /// Classifies a path into at most one action
    ///
    /// A path changed on both sides goes to the remote: remote wins. A path
    /// deleted on one side and changed on the other is restored from the
    /// side that changed it. A path created independently on both sides
    /// with differing content is settled by `both_added`.
    pub fn classify(obs: &Observation, both_added: BothAddedStrategy) -> Option<SyncAction> {
        let action = match (obs.in_baseline, obs.in_local, obs.in_remote) {
            (false, true, false) => Some(SyncAction::AddedLocally),
            (false, false, true) => Some(SyncAction::AddedRemotely),
            (false, true, true) => {
                if obs.sides_agree {
                    None
                } else {
                    match both_added {
                        BothAddedStrategy::RemoteWins => Some(SyncAction::AddedRemotely),
                        BothAddedStrategy::LocalWins => Some(SyncAction::AddedLocally),
                        BothAddedStrategy::Skip => None,
                    }
                }
            }
            (true, true, false) => {
                if obs.local_changed {
                    Some(SyncAction::AddedLocally)
                } else {
                    Some(SyncAction::DeletedRemotely)
                }
            }
            (true, false, true) => {
                if obs.remote_changed {
                    Some(SyncAction::AddedRemotely)
                } else {
                    Some(SyncAction::DeletedLocally)
                }
            }
            (true, true, true) => match (obs.local_changed, obs.remote_changed) {
                (false, false) => None,
                (true, false) => Some(SyncAction::UpdatedLocally),
                (_, true) => Some(SyncAction::UpdatedRemotely),
            },
            // Deleted on both sides, or never seen anywhere
            (true, false, false) | (false, false, false) => None,
        };

        trace!(observation = ?obs, action = ?action, "Classified path");
        action
    }

    /// Convenience wrapper deriving the observation from entry states
    pub fn classify_states(
        baseline: Option<&EntryState>,
        local: Option<&EntryState>,
        remote: Option<&EntryState>,
        both_added: BothAddedStrategy,
    ) -> Option<SyncAction> {
        Self::classify(&Observation::from_states(baseline, local, remote), both_added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerdrive_core::domain::ContentHash;

    fn file(content: &str) -> EntryState {
        EntryState::file(ContentHash::digest(content.as_bytes()))
    }

    fn classify(
        m: Option<EntryState>,
        l: Option<EntryState>,
        r: Option<EntryState>,
    ) -> Option<SyncAction> {
        ChangeDetector::classify_states(
            m.as_ref(),
            l.as_ref(),
            r.as_ref(),
            BothAddedStrategy::RemoteWins,
        )
    }

    #[test]
    fn test_new_local_path() {
        assert_eq!(
            classify(None, Some(file("a")), None),
            Some(SyncAction::AddedLocally)
        );
    }

    #[test]
    fn test_new_remote_path() {
        assert_eq!(
            classify(None, None, Some(EntryState::unhashed_file())),
            Some(SyncAction::AddedRemotely)
        );
    }

    #[test]
    fn test_both_added_same_content_is_noop() {
        assert_eq!(classify(None, Some(file("a")), Some(file("a"))), None);
        assert_eq!(
            classify(None, Some(EntryState::folder()), Some(EntryState::folder())),
            None
        );
    }

    #[test]
    fn test_both_added_follows_strategy() {
        let l = file("local");
        let r = file("remote");
        let run = |s| ChangeDetector::classify_states(None, Some(&l), Some(&r), s);

        assert_eq!(run(BothAddedStrategy::RemoteWins), Some(SyncAction::AddedRemotely));
        assert_eq!(run(BothAddedStrategy::LocalWins), Some(SyncAction::AddedLocally));
        assert_eq!(run(BothAddedStrategy::Skip), None);
    }

    #[test]
    fn test_remote_deleted_unchanged_local() {
        assert_eq!(
            classify(Some(file("a")), Some(file("a")), None),
            Some(SyncAction::DeletedRemotely)
        );
        assert_eq!(
            classify(Some(EntryState::folder()), Some(EntryState::folder()), None),
            Some(SyncAction::DeletedRemotely)
        );
    }

    #[test]
    fn test_remote_deleted_but_local_updated() {
        assert_eq!(
            classify(Some(file("a")), Some(file("b")), None),
            Some(SyncAction::AddedLocally)
        );
    }

    #[test]
    fn test_local_deleted_unchanged_remote() {
        assert_eq!(
            classify(Some(file("a")), None, Some(file("a"))),
            Some(SyncAction::DeletedLocally)
        );
    }

    #[test]
    fn test_local_deleted_but_remote_updated() {
        assert_eq!(
            classify(Some(file("a")), None, Some(file("b"))),
            Some(SyncAction::AddedRemotely)
        );
    }

    #[test]
    fn test_deleted_on_both_sides() {
        assert_eq!(classify(Some(file("a")), None, None), None);
    }

    #[test]
    fn test_unchanged_everywhere() {
        assert_eq!(classify(Some(file("a")), Some(file("a")), Some(file("a"))), None);
    }

    #[test]
    fn test_only_local_updated() {
        assert_eq!(
            classify(Some(file("a")), Some(file("b")), Some(file("a"))),
            Some(SyncAction::UpdatedLocally)
        );
    }

    #[test]
    fn test_only_remote_updated() {
        assert_eq!(
            classify(Some(file("a")), Some(file("a")), Some(file("b"))),
            Some(SyncAction::UpdatedRemotely)
        );
    }

    #[test]
    fn test_both_updated_remote_wins() {
        assert_eq!(
            classify(Some(file("a")), Some(file("b")), Some(file("c"))),
            Some(SyncAction::UpdatedRemotely)
        );
        // Even when both sides converged on the same content
        assert_eq!(
            classify(Some(file("a")), Some(file("b")), Some(file("b"))),
            Some(SyncAction::UpdatedRemotely)
        );
    }

    #[test]
    fn test_kind_change_counts_as_update() {
        assert_eq!(
            classify(Some(file("a")), Some(EntryState::folder()), Some(file("a"))),
            Some(SyncAction::UpdatedLocally)
        );
    }

    #[test]
    fn test_absent_everywhere() {
        assert_eq!(classify(None, None, None), None);
    }

    #[test]
    fn test_observation_from_states() {
        let m = file("a");
        let l = file("b");
        let obs = Observation::from_states(Some(&m), Some(&l), None);
        assert!(obs.in_baseline && obs.in_local && !obs.in_remote);
        assert!(obs.local_changed);
        assert!(!obs.remote_changed);
        assert!(!obs.sides_agree);
    }

    #[test]
    fn test_action_display_and_targets() {
        assert_eq!(SyncAction::DeletedRemotely.to_string(), "deleted_remotely");
        let local: Vec<_> = SyncAction::ALL
            .iter()
            .filter(|a| a.targets_local_path())
            .collect();
        assert_eq!(local.len(), 3);
    }
}
