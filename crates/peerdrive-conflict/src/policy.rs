//! Policy engine for paths created independently on both sides
//!
//! Every other conflict row of the decision table has a fixed outcome. A
//! path absent from the baseline but present both locally and remotely with
//! different content has no observed history to break the tie, so the
//! outcome comes from configuration: a default strategy plus glob rules
//! evaluated in first-match-wins order.

use std::fmt;
use std::str::FromStr;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub use peerdrive_core::config::ConflictRule;
use peerdrive_core::config::ConflictsConfig;

use crate::error::ConflictError;

/// Outcome for a path created independently on both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BothAddedStrategy {
    /// Download the remote entry over the local one
    #[default]
    RemoteWins,
    /// Upload the local entry over the remote one
    LocalWins,
    /// Leave both sides alone for this cycle
    Skip,
}

impl fmt::Display for BothAddedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BothAddedStrategy::RemoteWins => "remote_wins",
            BothAddedStrategy::LocalWins => "local_wins",
            BothAddedStrategy::Skip => "skip",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for BothAddedStrategy {
    type Err = ConflictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote_wins" => Ok(BothAddedStrategy::RemoteWins),
            "local_wins" => Ok(BothAddedStrategy::LocalWins),
            "skip" => Ok(BothAddedStrategy::Skip),
            other => Err(ConflictError::InvalidStrategy {
                strategy: other.to_string(),
            }),
        }
    }
}

/// Engine that evaluates both-added rules
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    rules: Vec<(Pattern, BothAddedStrategy)>,
    default_strategy: BothAddedStrategy,
}

impl PolicyEngine {
    /// Builds a PolicyEngine from configuration, rejecting anything invalid
    pub fn from_config(config: &ConflictsConfig) -> Result<Self, ConflictError> {
        let default_strategy: BothAddedStrategy = config.both_added.parse()?;
        let mut rules = Vec::with_capacity(config.rules.len());
        for rule in &config.rules {
            let pattern = Pattern::new(&rule.pattern).map_err(|e| ConflictError::InvalidPattern {
                pattern: rule.pattern.clone(),
                reason: e.to_string(),
            })?;
            rules.push((pattern, rule.strategy.parse::<BothAddedStrategy>()?));
        }
        debug!(
            rules_count = rules.len(),
            default = %default_strategy,
            "PolicyEngine initialized"
        );
        Ok(Self {
            rules,
            default_strategy,
        })
    }

    /// A policy with a fixed strategy and no rules
    pub fn with_strategy(strategy: BothAddedStrategy) -> Self {
        Self {
            rules: Vec::new(),
            default_strategy: strategy,
        }
    }

    /// Evaluates the policy for a path relative to the namespace root
    ///
    /// The first rule whose glob matches decides; otherwise the default applies.
    pub fn evaluate(&self, relative_path: &str) -> BothAddedStrategy {
        for (pattern, strategy) in &self.rules {
            if pattern.matches(relative_path) {
                trace!(
                    path = %relative_path,
                    pattern = %pattern,
                    strategy = %strategy,
                    "Conflict rule matched"
                );
                return *strategy;
            }
        }

        trace!(
            path = %relative_path,
            default = %self.default_strategy,
            "No conflict rule matched, using default"
        );
        self.default_strategy
    }

    /// Returns the default strategy
    pub fn default_strategy(&self) -> BothAddedStrategy {
        self.default_strategy
    }

    /// Returns the number of compiled rules
    pub fn rules_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::with_strategy(BothAddedStrategy::RemoteWins)
    }
}
