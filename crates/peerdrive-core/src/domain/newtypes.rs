//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// NodeId
// ============================================================================

/// Stable identifier of a node in the namespace tree
///
/// IDs survive renames and moves, so the orchestration layer can act on a
/// node reported by the synchronizer even after the tree was edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Create a new random NodeId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a NodeId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::NodeNotFound(format!("malformed node id '{s}': {e}")))
    }
}

// ============================================================================
// RelativePath
// ============================================================================

/// Validate a single path segment / node name
///
/// # Errors
/// Returns error if the name is empty, `.`, `..`, or contains `/` or NUL
pub fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() {
        return Err(DomainError::InvalidName("name cannot be empty".to_string()));
    }
    if name == "." || name == ".." {
        return Err(DomainError::InvalidName(format!(
            "dot segments are not allowed: {name}"
        )));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(DomainError::InvalidName(format!(
            "name contains a separator or NUL: {name:?}"
        )));
    }
    Ok(())
}

/// Path of an entry relative to the namespace root
///
/// Stored as `/`-joined segments without leading or trailing separator.
/// The empty path denotes the namespace root itself. Ordering is
/// segment-wise, so a folder always sorts before everything nested in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// Create a new RelativePath
    ///
    /// # Errors
    /// Returns error if the path has a leading/trailing separator or an
    /// invalid segment
    pub fn new(path: String) -> Result<Self, DomainError> {
        if path.is_empty() {
            return Ok(Self::root());
        }

        if path.starts_with('/') || path.ends_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "Relative path must not start or end with '/': {path}"
            )));
        }

        for segment in path.split('/') {
            validate_name(segment)
                .map_err(|e| DomainError::InvalidPath(format!("{path}: {e}")))?;
        }

        Ok(Self(path))
    }

    /// The namespace root (empty path)
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Whether this is the namespace root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a single segment
    ///
    /// # Errors
    /// Returns error if `name` is not a valid segment
    pub fn join(&self, name: &str) -> Result<Self, DomainError> {
        validate_name(name)?;
        if self.is_root() {
            Ok(Self(name.to_string()))
        } else {
            Ok(Self(format!("{}/{name}", self.0)))
        }
    }

    /// Get the parent path (`None` for the root)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Get the last segment (`None` for the root)
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// Iterate over the path segments from the root down
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments (0 for the root)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Whether `ancestor` is this path or one of its ancestors
    #[must_use]
    pub fn starts_with(&self, ancestor: &RelativePath) -> bool {
        let mut own = self.segments();
        ancestor.segments().all(|segment| own.next() == Some(segment))
    }

    /// Resolve this path under a filesystem root
    #[must_use]
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, s| acc.join(s))
    }

    /// Derive the relative path of `path` under `root`
    ///
    /// # Errors
    /// Returns error if `path` is not under `root`, is not valid UTF-8, or
    /// contains `..`/root components after the prefix
    pub fn from_path(root: &Path, path: &Path) -> Result<Self, DomainError> {
        let rest = path.strip_prefix(root).map_err(|_| {
            DomainError::InvalidPath(format!(
                "{} is not under {}",
                path.display(),
                root.display()
            ))
        })?;

        let mut segments = Vec::new();
        for component in rest.components() {
            match component {
                Component::Normal(os) => {
                    let segment = os.to_str().ok_or_else(|| {
                        DomainError::InvalidPath(format!(
                            "path is not valid UTF-8: {}",
                            path.display()
                        ))
                    })?;
                    segments.push(segment);
                }
                Component::CurDir => {}
                _ => {
                    return Err(DomainError::InvalidPath(format!(
                        "path escapes its root: {}",
                        path.display()
                    )))
                }
            }
        }

        Self::new(segments.join("/"))
    }

    /// Case-folded copy, used as join key on case-insensitive filesystems
    #[must_use]
    pub fn to_lowercase(&self) -> Self {
        Self(self.0.to_lowercase())
    }
}

impl PartialOrd for RelativePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelativePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments().cmp(other.segments())
    }
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RelativePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RelativePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RelativePath> for String {
    fn from(path: RelativePath) -> Self {
        path.0
    }
}

// ============================================================================
// ContentHash
// ============================================================================

/// SHA-256 digest of a file's bytes
///
/// Opaque to the synchronizer: only equality matters. Displayed and
/// serialized as standard Base64.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash([u8; ContentHash::LEN]);

impl ContentHash {
    /// Digest length in bytes
    pub const LEN: usize = 32;

    /// Hash a complete buffer
    #[must_use]
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = ContentHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Wrap an existing digest
    ///
    /// # Errors
    /// Returns error if `bytes` is not exactly [`ContentHash::LEN`] long
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DomainError> {
        let raw: [u8; Self::LEN] = bytes.try_into().map_err(|_| {
            DomainError::InvalidHash(format!(
                "expected {} bytes, got {} bytes",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    /// Wrap a raw digest array
    #[must_use]
    pub const fn from_raw(raw: [u8; Self::LEN]) -> Self {
        Self(raw)
    }

    /// Get the digest bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    fn encode(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }
}

impl Debug for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.encode())
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|e| DomainError::InvalidHash(format!("Hash is not valid Base64: {e}")))?;
        Self::from_bytes(&decoded)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.encode()
    }
}

/// Incremental SHA-256 hasher producing a [`ContentHash`]
///
/// Lets callers stream large files instead of buffering them.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    #[must_use]
    pub fn finalize(self) -> ContentHash {
        let digest = self.inner.finalize();
        let mut raw = [0u8; ContentHash::LEN];
        raw.copy_from_slice(&digest);
        ContentHash(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------
    // RelativePath
    // ------------------------------------------------------------------

    #[test]
    fn test_relative_path_valid() {
        let path = RelativePath::new("1d/2f".to_string()).unwrap();
        assert_eq!(path.as_str(), "1d/2f");
        assert_eq!(path.depth(), 2);
        assert_eq!(path.file_name(), Some("2f"));
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["1d", "2f"]);
    }

    #[test]
    fn test_relative_path_empty_is_root() {
        let path = RelativePath::new(String::new()).unwrap();
        assert!(path.is_root());
        assert_eq!(path.depth(), 0);
        assert_eq!(path.parent(), None);
        assert_eq!(path.file_name(), None);
    }

    #[test]
    fn test_relative_path_rejects_invalid() {
        assert!(RelativePath::new("/abs".to_string()).is_err());
        assert!(RelativePath::new("trailing/".to_string()).is_err());
        assert!(RelativePath::new("a//b".to_string()).is_err());
        assert!(RelativePath::new("a/../b".to_string()).is_err());
        assert!(RelativePath::new("./a".to_string()).is_err());
    }

    #[test]
    fn test_relative_path_join_and_parent() {
        let root = RelativePath::root();
        let dir = root.join("1d").unwrap();
        let file = dir.join("2f").unwrap();

        assert_eq!(file.as_str(), "1d/2f");
        assert_eq!(file.parent(), Some(dir.clone()));
        assert_eq!(dir.parent(), Some(root));
        assert!(dir.join("a/b").is_err());
        assert!(dir.join("").is_err());
    }

    #[test]
    fn test_relative_path_starts_with_is_segment_wise() {
        let dir: RelativePath = "1d".parse().unwrap();
        let child: RelativePath = "1d/2f".parse().unwrap();
        let sibling: RelativePath = "1d2/x".parse().unwrap();

        assert!(child.starts_with(&dir));
        assert!(dir.starts_with(&dir));
        assert!(!sibling.starts_with(&dir));
        assert!(child.starts_with(&RelativePath::root()));
    }

    #[test]
    fn test_relative_path_ordering_parents_first() {
        let mut paths: Vec<RelativePath> = ["1d-x", "1d/2f", "1d", "1f1"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        paths.sort();

        let ordered: Vec<&str> = paths.iter().map(RelativePath::as_str).collect();
        assert_eq!(ordered, vec!["1d", "1d/2f", "1d-x", "1f1"]);
    }

    #[test]
    fn test_relative_path_filesystem_conversion() {
        let root = Path::new("/tmp/sync");
        let path: RelativePath = "1d/2f".parse().unwrap();

        let fs_path = path.to_path(root);
        assert_eq!(fs_path, PathBuf::from("/tmp/sync/1d/2f"));
        assert_eq!(RelativePath::from_path(root, &fs_path).unwrap(), path);
        assert!(RelativePath::from_path(root, Path::new("/elsewhere/x")).is_err());
        assert!(RelativePath::from_path(root, root).unwrap().is_root());
    }

    #[test]
    fn test_relative_path_serde_roundtrip() {
        let path: RelativePath = "docs/report.txt".parse().unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"docs/report.txt\"");

        let back: RelativePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);

        let invalid: Result<RelativePath, _> = serde_json::from_str("\"/abs\"");
        assert!(invalid.is_err());
    }

    // ------------------------------------------------------------------
    // ContentHash
    // ------------------------------------------------------------------

    #[test]
    fn test_content_hash_digest_is_content_sensitive() {
        let a = ContentHash::digest(b"aaa");
        let b = ContentHash::digest(b"bbb");
        assert_ne!(a, b);
        assert_eq!(a, ContentHash::digest(b"aaa"));
    }

    #[test]
    fn test_content_hash_streaming_matches_digest() {
        let mut hasher = ContentHasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finalize(), ContentHash::digest(b"hello world"));
    }

    #[test]
    fn test_content_hash_from_bytes_checks_length() {
        assert!(ContentHash::from_bytes(&[0u8; 32]).is_ok());
        assert!(matches!(
            ContentHash::from_bytes(&[0u8; 20]),
            Err(DomainError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_content_hash_string_roundtrip() {
        let hash = ContentHash::digest(b"content");
        let encoded = hash.to_string();
        assert_eq!(encoded.len(), 44);
        assert_eq!(encoded.parse::<ContentHash>().unwrap(), hash);
        assert!("not base64!".parse::<ContentHash>().is_err());
    }

    // ------------------------------------------------------------------
    // NodeId
    // ------------------------------------------------------------------

    #[test]
    fn test_node_id_unique() {
        assert_ne!(NodeId::new(), NodeId::new());
    }

    #[test]
    fn test_node_id_parse() {
        let id = NodeId::new();
        assert_eq!(id.to_string().parse::<NodeId>().unwrap(), id);
        assert!("nope".parse::<NodeId>().is_err());
    }
}
