use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::TaskError;

pub type RevId = u64;
pub type ModelName = String;

/// A computed score. Plain data so it can cross a process boundary.
pub type Score = serde_json::Value;

/// Pre-fetched context needed to score one revision.
pub type RootCache = serde_json::Value;

/// Models still lacking a score, grouped with every revision that lacks
/// exactly that set of models.
pub type MissingModelSetRevs = BTreeMap<BTreeSet<ModelName>, BTreeSet<RevId>>;

pub type RootCaches = HashMap<RevId, RootCache>;

pub type ScoreResults = BTreeMap<RevId, BTreeMap<ModelName, Score>>;

pub type ErrorResults = BTreeMap<RevId, BTreeMap<ModelName, TaskError>>;

/// Identifies a task's slot in the result maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskKey {
    pub rev_id: RevId,
    pub model_name: ModelName,
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.rev_id, self.model_name)
    }
}
