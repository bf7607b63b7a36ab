//! Configuration module for PeerDrive.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for PeerDrive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub snapshot: SnapshotConfig,
    pub conflicts: ConflictsConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root directory of the synchronized namespace on disk.
    pub root: PathBuf,
    /// File name of the persisted baseline, stored directly under `root`.
    pub baseline_file: String,
}

/// Filesystem walk settings used when building snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Resolve symbolic links instead of skipping them.
    pub follow_symlinks: bool,
    /// Compare paths case-sensitively. Set to `false` on case-insensitive
    /// filesystems so `Report.txt` and `report.txt` are the same entry.
    pub case_sensitive: bool,
    /// Number of files hashed concurrently.
    pub hash_concurrency: usize,
    /// Glob patterns (relative to the root) excluded from snapshots.
    pub ignore: Vec<String>,
}

/// Conflict policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// What to do when both sides created the same path independently:
    /// `remote_wins`, `local_wins`, or `skip`.
    pub both_added: String,
    /// Per-path overrides of `both_added`, first match wins.
    pub rules: Vec<ConflictRule>,
}

/// A single conflict rule: paths matching `pattern` use `strategy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    /// Glob pattern matched against the relative path (e.g. `"**/*.docx"`)
    pub pattern: String,
    /// One of [`VALID_BOTH_ADDED_STRATEGIES`]
    pub strategy: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/peerdrive/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("peerdrive")
            .join("config.yaml")
    }

    /// Absolute location of the baseline file.
    pub fn baseline_path(&self) -> PathBuf {
        self.sync.root.join(&self.sync.baseline_file)
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

/// Default file name of the persisted baseline.
pub const DEFAULT_BASELINE_FILE: &str = ".peerdrive-baseline.json";

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("PeerDrive"),
            baseline_file: DEFAULT_BASELINE_FILE.to_string(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            case_sensitive: true,
            hash_concurrency: 8,
            ignore: Vec::new(),
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            both_added: "remote_wins".to_string(),
            rules: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"snapshot.hash_concurrency"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `conflicts.both_added`.
pub const VALID_BOTH_ADDED_STRATEGIES: &[&str] = &["remote_wins", "local_wins", "skip"];

/// Upper bound for `snapshot.hash_concurrency`.
const MAX_HASH_CONCURRENCY: usize = 64;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        let root_str = self.sync.root.to_string_lossy();
        if !root_str.starts_with('~') && !self.sync.root.exists() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: format!("directory does not exist: {}", self.sync.root.display()),
            });
        }
        let baseline = &self.sync.baseline_file;
        if baseline.is_empty()
            || baseline.contains('/')
            || baseline.contains('\\')
            || baseline == "."
            || baseline == ".."
        {
            errors.push(ValidationError {
                field: "sync.baseline_file".into(),
                message: format!("must be a plain file name, got '{baseline}'"),
            });
        }

        // --- snapshot ---
        if self.snapshot.hash_concurrency == 0
            || self.snapshot.hash_concurrency > MAX_HASH_CONCURRENCY
        {
            errors.push(ValidationError {
                field: "snapshot.hash_concurrency".into(),
                message: format!("must be in range 1..={MAX_HASH_CONCURRENCY}"),
            });
        }
        for pattern in &self.snapshot.ignore {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(ValidationError {
                    field: "snapshot.ignore".into(),
                    message: format!("invalid glob pattern '{pattern}': {e}"),
                });
            }
        }

        // --- conflicts ---
        if !VALID_BOTH_ADDED_STRATEGIES.contains(&self.conflicts.both_added.as_str()) {
            errors.push(ValidationError {
                field: "conflicts.both_added".into(),
                message: format!(
                    "invalid strategy '{}'; valid options: {}",
                    self.conflicts.both_added,
                    VALID_BOTH_ADDED_STRATEGIES.join(", ")
                ),
            });
        }

        for rule in &self.conflicts.rules {
            if let Err(e) = glob::Pattern::new(&rule.pattern) {
                errors.push(ValidationError {
                    field: "conflicts.rules".into(),
                    message: format!("invalid glob pattern '{}': {e}", rule.pattern),
                });
            }
            if !VALID_BOTH_ADDED_STRATEGIES.contains(&rule.strategy.as_str()) {
                errors.push(ValidationError {
                    field: "conflicts.rules".into(),
                    message: format!(
                        "invalid strategy '{}' for pattern '{}'",
                        rule.strategy, rule.pattern
                    ),
                });
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use peerdrive_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/home/user/PeerDrive"))
///     .snapshot_follow_symlinks(true)
///     .conflicts_both_added("local_wins")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn sync_baseline_file(mut self, name: impl Into<String>) -> Self {
        self.config.sync.baseline_file = name.into();
        self
    }

    // --- snapshot ---

    pub fn snapshot_follow_symlinks(mut self, follow: bool) -> Self {
        self.config.snapshot.follow_symlinks = follow;
        self
    }

    pub fn snapshot_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.config.snapshot.case_sensitive = case_sensitive;
        self
    }

    pub fn snapshot_hash_concurrency(mut self, n: usize) -> Self {
        self.config.snapshot.hash_concurrency = n;
        self
    }

    pub fn snapshot_ignore(mut self, pattern: impl Into<String>) -> Self {
        self.config.snapshot.ignore.push(pattern.into());
        self
    }

    // --- conflicts ---

    pub fn conflicts_both_added(mut self, strategy: impl Into<String>) -> Self {
        self.config.conflicts.both_added = strategy.into();
        self
    }

    pub fn conflicts_rule(
        mut self,
        pattern: impl Into<String>,
        strategy: impl Into<String>,
    ) -> Self {
        self.config.conflicts.rules.push(ConflictRule {
            pattern: pattern.into(),
            strategy: strategy.into(),
        });
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
