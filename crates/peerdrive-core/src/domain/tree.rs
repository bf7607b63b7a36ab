//! Namespace tree model
//!
//! The remote, authoritative hierarchy of files and folders for one user's
//! synchronized space. Nodes live in an arena keyed by [`NodeId`]; parents
//! own their children through an ordered name index, and each node keeps
//! a parent back-pointer used only to derive its full path.
//!
//! The tree is owned and mutated by the profile layer. The synchronizer
//! only reads it, and only through one [`NamespaceTree::flatten`] per pass.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::entry::{EntryKind, EntryState};
use super::errors::DomainError;
use super::newtypes::{validate_name, ContentHash, NodeId, RelativePath};

/// Opaque key material used by the document encryption layer
///
/// Carried on nodes so the profile round-trips intact; never interpreted here.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub public: Vec<u8>,
    pub private: Vec<u8>,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &format_args!("{} bytes", self.public.len()))
            .field("private", &"<redacted>")
            .finish()
    }
}

/// A single node of the namespace tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    id: NodeId,
    name: String,
    kind: EntryKind,
    content_hash: Option<ContentHash>,
    keys: Option<KeyPair>,
    parent: Option<NodeId>,
    children: BTreeMap<String, NodeId>,
}

impl TreeNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Name of the node among its siblings (empty for the root)
    pub fn name(&self) -> &str {
        &self.name
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

    pub fn keys(&self) -> Option<&KeyPair> {
        self.keys.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child IDs ordered by name
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.values().copied()
    }

    pub fn entry_state(&self) -> EntryState {
        match (self.kind, self.content_hash) {
            (EntryKind::Folder, _) => EntryState::folder(),
            (EntryKind::File, Some(hash)) => EntryState::file(hash),
            (EntryKind::File, None) => EntryState::unhashed_file(),
        }
    }
}

/// One node of a flattened tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatNode {
    pub id: NodeId,
    pub path: RelativePath,
    pub state: EntryState,
}

/// The namespace tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceTree {
    root: NodeId,
    nodes: HashMap<NodeId, TreeNode>,
}

impl NamespaceTree {
    /// Create a tree holding only the (nameless) root folder
    pub fn new() -> Self {
        let root = NodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            TreeNode {
                id: root,
                name: String::new(),
                kind: EntryKind::Folder,
                content_hash: None,
                keys: None,
                parent: None,
                children: BTreeMap::new(),
            },
        );
        Self { root, nodes }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node by ID
    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    /// Number of nodes, not counting the root
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Add a file under `parent`
    ///
    /// `content_hash` may be `None` for a file registered before its
    /// content was hashed.
    pub fn add_file(
        &mut self,
        parent: NodeId,
        name: &str,
        content_hash: Option<ContentHash>,
        keys: Option<KeyPair>,
    ) -> Result<NodeId, DomainError> {
        self.insert(parent, name, EntryKind::File, content_hash, keys)
    }

    /// Add a folder under `parent`
    pub fn add_folder(
        &mut self,
        parent: NodeId,
        name: &str,
        keys: Option<KeyPair>,
    ) -> Result<NodeId, DomainError> {
        self.insert(parent, name, EntryKind::Folder, None, keys)
    }

    fn insert(
        &mut self,
        parent: NodeId,
        name: &str,
        kind: EntryKind,
        content_hash: Option<ContentHash>,
        keys: Option<KeyPair>,
    ) -> Result<NodeId, DomainError> {
        validate_name(name)?;
        let parent_node = self.folder_mut(parent)?;
        if parent_node.children.contains_key(name) {
            return Err(DomainError::DuplicateName(name.to_string()));
        }

        let id = NodeId::new();
        parent_node.children.insert(name.to_string(), id);
        self.nodes.insert(
            id,
            TreeNode {
                id,
                name: name.to_string(),
                kind,
                content_hash,
                keys,
                parent: Some(parent),
                children: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    /// Detach and drop a node together with its whole subtree
    ///
    /// Returns the number of nodes removed.
    pub fn remove(&mut self, id: NodeId) -> Result<usize, DomainError> {
        if id == self.root {
            return Err(DomainError::InvalidTreeOperation(
                "the root cannot be removed".to_string(),
            ));
        }
        let node = self.node(id)?;
        let (parent, name) = (node.parent, node.name.clone());

        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.remove(&name);
        }

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.values().copied());
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove a file or an empty folder
    ///
    /// Folders that still have children are rejected; their contents must
    /// be removed first.
    pub fn remove_empty(&mut self, id: NodeId) -> Result<(), DomainError> {
        let node = self.node(id)?;
        if !node.children.is_empty() {
            return Err(DomainError::FolderNotEmpty(self.describe(id)));
        }
        self.remove(id).map(|_| ())
    }

    /// Move and/or rename a node in one step
    pub fn move_node(
        &mut self,
        id: NodeId,
        new_parent: NodeId,
        new_name: &str,
    ) -> Result<(), DomainError> {
        if id == self.root {
            return Err(DomainError::InvalidTreeOperation(
                "the root cannot be moved".to_string(),
            ));
        }
        validate_name(new_name)?;
        let (old_parent, old_name) = {
            let node = self.node(id)?;
            (node.parent, node.name.clone())
        };

        // The destination must not be the node itself or one of its descendants.
        let mut cursor = Some(new_parent);
        while let Some(current) = cursor {
            if current == id {
                return Err(DomainError::InvalidTreeOperation(format!(
                    "cannot move {} into its own subtree",
                    self.describe(id)
                )));
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }

        let destination = self.folder_mut(new_parent)?;
        match destination.children.get(new_name) {
            Some(existing) if *existing != id => {
                return Err(DomainError::DuplicateName(new_name.to_string()));
            }
            _ => {}
        }

        if let Some(parent) = old_parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.remove(&old_name);
        }
        if let Some(parent) = self.nodes.get_mut(&new_parent) {
            parent.children.insert(new_name.to_string(), id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.name = new_name.to_string();
            node.parent = Some(new_parent);
        }
        Ok(())
    }

    /// Record new content for a file node
    pub fn set_content_hash(&mut self, id: NodeId, hash: ContentHash) -> Result<(), DomainError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| DomainError::NodeNotFound(id.to_string()))?;
        if node.kind != EntryKind::File {
            return Err(DomainError::NotAFile(node.name.clone()));
        }
        node.content_hash = Some(hash);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Resolve a relative path to a node (the empty path is the root)
    pub fn find_by_path(&self, path: &RelativePath) -> Option<NodeId> {
        path.segments().try_fold(self.root, |current, segment| {
            self.nodes.get(&current)?.children.get(segment).copied()
        })
    }

    /// Child IDs of `id` ordered by name (empty for files and unknown IDs)
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&id)
            .map(|n| n.children().collect())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id)?.parent
    }

    /// Concatenation of ancestor names down to the node
    pub fn full_path(&self, id: NodeId) -> Option<RelativePath> {
        let mut names = Vec::new();
        let mut cursor = self.nodes.get(&id)?;
        while let Some(parent) = cursor.parent {
            names.push(cursor.name.as_str());
            cursor = self.nodes.get(&parent)?;
        }
        names.reverse();
        RelativePath::new(names.join("/")).ok()
    }

    pub fn content_hash(&self, id: NodeId) -> Option<ContentHash> {
        self.nodes.get(&id)?.content_hash
    }

    pub fn entry_state(&self, id: NodeId) -> Option<EntryState> {
        self.nodes.get(&id).map(TreeNode::entry_state)
    }

    /// Filesystem location of a node under a sync root
    pub fn local_path(&self, root: &Path, id: NodeId) -> Option<PathBuf> {
        self.full_path(id).map(|p| p.to_path(root))
    }

    /// Every node except the root, depth-first with siblings in name order
    pub fn flatten(&self) -> Vec<FlatNode> {
        let mut flat = Vec::with_capacity(self.len());
        let mut stack: Vec<(NodeId, RelativePath)> = self
            .children(self.root)
            .into_iter()
            .rev()
            .filter_map(|id| {
                let name = &self.nodes.get(&id)?.name;
                Some((id, RelativePath::root().join(name).ok()?))
            })
            .collect();

        while let Some((id, path)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            for child in node.children.values().rev() {
                if let Some(child_node) = self.nodes.get(child) {
                    if let Ok(child_path) = path.join(&child_node.name) {
                        stack.push((*child, child_path));
                    }
                }
            }
            flat.push(FlatNode {
                id,
                path,
                state: node.entry_state(),
            });
        }
        flat
    }

    fn node(&self, id: NodeId) -> Result<&TreeNode, DomainError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| DomainError::NodeNotFound(id.to_string()))
    }

    fn folder_mut(&mut self, id: NodeId) -> Result<&mut TreeNode, DomainError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| DomainError::NodeNotFound(id.to_string()))?;
        if node.kind != EntryKind::Folder {
            return Err(DomainError::NotAFolder(node.name.clone()));
        }
        Ok(node)
    }

    fn describe(&self, id: NodeId) -> String {
        self.full_path(id)
            .map(|p| p.to_string())
            .unwrap_or_else(|| id.to_string())
    }
}

impl Default for NamespaceTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root:
    /// - 1f1
    /// - 1f2
    /// - 1d:
    /// - - 2f
    /// - - 2d (empty folder)
    struct Fixture {
        tree: NamespaceTree,
        f1: NodeId,
        d1: NodeId,
        f2: NodeId,
        d2: NodeId,
    }

    fn fixture() -> Fixture {
        let mut tree = NamespaceTree::new();
        let root = tree.root();
        let f1 = tree
            .add_file(root, "1f1", Some(ContentHash::digest(b"1f1")), None)
            .unwrap();
        tree.add_file(root, "1f2", Some(ContentHash::digest(b"1f2")), None)
            .unwrap();
        let d1 = tree.add_folder(root, "1d", None).unwrap();
        let f2 = tree
            .add_file(d1, "2f", Some(ContentHash::digest(b"2f")), None)
            .unwrap();
        let d2 = tree.add_folder(d1, "2d", None).unwrap();
        Fixture {
            tree,
            f1,
            d1,
            f2,
            d2,
        }
    }

    fn path(s: &str) -> RelativePath {
        s.parse().unwrap()
    }

    #[test]
    fn test_full_path_concatenates_ancestors() {
        let fx = fixture();
        assert_eq!(fx.tree.full_path(fx.f2), Some(path("1d/2f")));
        assert_eq!(fx.tree.full_path(fx.d1), Some(path("1d")));
        assert_eq!(fx.tree.full_path(fx.tree.root()), Some(RelativePath::root()));
        assert_eq!(fx.tree.len(), 5);
    }

    #[test]
    fn test_find_by_path() {
        let fx = fixture();
        assert_eq!(fx.tree.find_by_path(&path("1d/2d")), Some(fx.d2));
        assert_eq!(fx.tree.find_by_path(&RelativePath::root()), Some(fx.tree.root()));
        assert_eq!(fx.tree.find_by_path(&path("1d/missing")), None);
        assert_eq!(fx.tree.find_by_path(&path("1f1/below-a-file")), None);
    }

    #[test]
    fn test_children_and_parent() {
        let fx = fixture();
        assert_eq!(fx.tree.children(fx.d1), vec![fx.d2, fx.f2]);
        assert_eq!(fx.tree.parent(fx.f2), Some(fx.d1));
        assert!(fx.tree.children(fx.f1).is_empty());
    }

    #[test]
    fn test_duplicate_sibling_rejected() {
        let mut fx = fixture();
        let root = fx.tree.root();
        let result = fx.tree.add_folder(root, "1f1", None);
        assert_eq!(result, Err(DomainError::DuplicateName("1f1".to_string())));
    }

    #[test]
    fn test_add_under_file_rejected() {
        let mut fx = fixture();
        let result = fx.tree.add_file(fx.f1, "x", None, None);
        assert!(matches!(result, Err(DomainError::NotAFolder(_))));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut fx = fixture();
        let root = fx.tree.root();
        assert!(fx.tree.add_folder(root, "a/b", None).is_err());
        assert!(fx.tree.add_folder(root, "..", None).is_err());
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut fx = fixture();
        let removed = fx.tree.remove(fx.d1).unwrap();

        assert_eq!(removed, 3);
        assert_eq!(fx.tree.len(), 2);
        assert!(fx.tree.get(fx.f2).is_none());
        assert!(fx.tree.find_by_path(&path("1d")).is_none());
    }

    #[test]
    fn test_remove_root_rejected() {
        let mut fx = fixture();
        let root = fx.tree.root();
        assert!(matches!(
            fx.tree.remove(root),
            Err(DomainError::InvalidTreeOperation(_))
        ));
    }

    #[test]
    fn test_remove_empty_refuses_non_empty_folder() {
        let mut fx = fixture();
        assert_eq!(
            fx.tree.remove_empty(fx.d1),
            Err(DomainError::FolderNotEmpty("1d".to_string()))
        );

        fx.tree.remove_empty(fx.d2).unwrap();
        fx.tree.remove_empty(fx.f2).unwrap();
        fx.tree.remove_empty(fx.d1).unwrap();
        assert_eq!(fx.tree.len(), 2);
    }

    #[test]
    fn test_move_and_rename() {
        let mut fx = fixture();
        let root = fx.tree.root();
        fx.tree.move_node(fx.f2, root, "moved").unwrap();

        assert_eq!(fx.tree.full_path(fx.f2), Some(path("moved")));
        assert!(fx.tree.find_by_path(&path("1d/2f")).is_none());
        assert_eq!(fx.tree.children(fx.d1), vec![fx.d2]);
    }

    #[test]
    fn test_move_into_own_subtree_rejected() {
        let mut fx = fixture();
        let result = fx.tree.move_node(fx.d1, fx.d2, "loop");
        assert!(matches!(result, Err(DomainError::InvalidTreeOperation(_))));
    }

    #[test]
    fn test_move_onto_existing_name_rejected() {
        let mut fx = fixture();
        let root = fx.tree.root();
        let result = fx.tree.move_node(fx.f2, root, "1f1");
        assert!(matches!(result, Err(DomainError::DuplicateName(_))));
    }

    #[test]
    fn test_set_content_hash() {
        let mut fx = fixture();
        let new_hash = ContentHash::digest(b"changed");
        fx.tree.set_content_hash(fx.f1, new_hash).unwrap();
        assert_eq!(fx.tree.content_hash(fx.f1), Some(new_hash));

        assert!(matches!(
            fx.tree.set_content_hash(fx.d1, new_hash),
            Err(DomainError::NotAFile(_))
        ));
    }

    #[test]
    fn test_flatten_is_depth_first_in_name_order() {
        let fx = fixture();
        let flat = fx.tree.flatten();
        let order: Vec<&str> = flat.iter().map(|n| n.path.as_str()).collect();

        assert_eq!(order, vec!["1d", "1d/2d", "1d/2f", "1f1", "1f2"]);
        assert!(flat[0].state.is_folder());
        assert_eq!(
            flat[2].state.content_hash(),
            Some(&ContentHash::digest(b"2f"))
        );
    }

    #[test]
    fn test_local_path() {
        let fx = fixture();
        let local = fx.tree.local_path(Path::new("/sync"), fx.f2).unwrap();
        assert_eq!(local, PathBuf::from("/sync/1d/2f"));
    }

    #[test]
    fn test_keys_are_carried() {
        let mut tree = NamespaceTree::new();
        let root = tree.root();
        let keys = KeyPair {
            public: vec![1, 2, 3],
            private: vec![4, 5, 6],
        };
        let id = tree.add_folder(root, "secret", Some(keys.clone())).unwrap();

        assert_eq!(tree.get(id).unwrap().keys(), Some(&keys));
        assert!(!format!("{keys:?}").contains("4, 5, 6"));
    }
}
