//! Namespace tree port (driven/secondary port)
//!
//! The query interface the synchronizer uses to read the remote tree. The
//! tree itself is owned and mutated by the profile layer; nothing behind
//! this trait mutates it.
//!
//! ## Design Notes
//!
//! - Queries take and return [`NodeId`]s so callers never hold references
//!   into a tree that may be edited between calls.
//! - [`INamespaceTree::flatten`] has a default implementation built from the
//!   other queries; [`NamespaceTree`] overrides it with a single traversal.

use crate::domain::{
    entry::EntryState,
    newtypes::{ContentHash, NodeId, RelativePath},
    tree::{FlatNode, NamespaceTree},
};

/// Read-only view of a namespace tree
pub trait INamespaceTree: Send + Sync {
    /// The root folder
    fn root(&self) -> NodeId;

    /// Resolve a relative path to a node
    fn find_by_path(&self, path: &RelativePath) -> Option<NodeId>;

    /// Children of a node in a stable order
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Path from the root down to the node
    fn full_path(&self, node: NodeId) -> Option<RelativePath>;

    /// Content hash of a file node (`None` for folders and unhashed files)
    fn content_hash(&self, node: NodeId) -> Option<ContentHash>;

    /// Whether the node is a folder
    fn is_folder(&self, node: NodeId) -> bool;

    /// Every node except the root, parents before children
    fn flatten(&self) -> Vec<FlatNode> {
        let mut flat = Vec::new();
        let mut stack: Vec<NodeId> = self.children(self.root()).into_iter().rev().collect();

        while let Some(id) = stack.pop() {
            let Some(path) = self.full_path(id) else {
                continue;
            };
            let state = if self.is_folder(id) {
                stack.extend(self.children(id).into_iter().rev());
                EntryState::folder()
            } else {
                match self.content_hash(id) {
                    Some(hash) => EntryState::file(hash),
                    None => EntryState::unhashed_file(),
                }
            };
            flat.push(FlatNode { id, path, state });
        }
        flat
    }
}

impl INamespaceTree for NamespaceTree {
    fn root(&self) -> NodeId {
        NamespaceTree::root(self)
    }

    fn find_by_path(&self, path: &RelativePath) -> Option<NodeId> {
        NamespaceTree::find_by_path(self, path)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        NamespaceTree::children(self, node)
    }

    fn full_path(&self, node: NodeId) -> Option<RelativePath> {
        NamespaceTree::full_path(self, node)
    }

    fn content_hash(&self, node: NodeId) -> Option<ContentHash> {
        NamespaceTree::content_hash(self, node)
    }

    fn is_folder(&self, node: NodeId) -> bool {
        self.get(node).is_some_and(|n| n.is_folder())
    }

    fn flatten(&self) -> Vec<FlatNode> {
        NamespaceTree::flatten(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal tree exposing only the required queries, to exercise the
    /// default `flatten`.
    struct QueriesOnly<'a>(&'a NamespaceTree);

    impl INamespaceTree for QueriesOnly<'_> {
        fn root(&self) -> NodeId {
            self.0.root()
        }
        fn find_by_path(&self, path: &RelativePath) -> Option<NodeId> {
            self.0.find_by_path(path)
        }
        fn children(&self, node: NodeId) -> Vec<NodeId> {
            self.0.children(node)
        }
        fn full_path(&self, node: NodeId) -> Option<RelativePath> {
            self.0.full_path(node)
        }
        fn content_hash(&self, node: NodeId) -> Option<ContentHash> {
            self.0.content_hash(node)
        }
        fn is_folder(&self, node: NodeId) -> bool {
            self.0.get(node).is_some_and(|n| n.is_folder())
        }
    }

    #[test]
    fn test_default_flatten_matches_tree_flatten() {
        let mut tree = NamespaceTree::new();
        let root = tree.root();
        let docs = tree.add_folder(root, "docs", None).unwrap();
        tree.add_file(docs, "a.txt", Some(ContentHash::digest(b"a")), None)
            .unwrap();
        tree.add_file(root, "pending.bin", None, None).unwrap();
        tree.add_folder(docs, "empty", None).unwrap();

        let via_default = QueriesOnly(&tree).flatten();
        let via_tree = INamespaceTree::flatten(&tree);

        assert_eq!(via_default, via_tree);
        assert_eq!(via_tree.len(), 4);
    }
}
