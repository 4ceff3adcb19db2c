use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ores_scoring::{
    ErrorResults, MissingModelSetRevs, ModelName, RevId, RootCache, RootCaches, ScoreRequest,
    ScoreResults,
};

#[derive(Debug, Deserialize)]
pub struct MissingEntry {
    pub models: BTreeSet<ModelName>,
    pub rev_ids: BTreeSet<RevId>,
}

/// A request to score, as read from a job file.
#[derive(Debug, Deserialize)]
pub struct Job {
    pub request: ScoreRequest,
    pub missing: Vec<MissingEntry>,
    #[serde(default)]
    pub root_caches: HashMap<RevId, RootCache>,
}

impl Job {
    pub fn from_path(path: &Path) -> Result<Self> {
        let job_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {}", path.display()))?;
        serde_json::from_str(&job_str).context("Failed to parse job file")
    }

    /// Entries sharing a model set are merged.
    pub fn missing_model_set_revs(&self) -> MissingModelSetRevs {
        let mut missing = MissingModelSetRevs::new();
        for entry in &self.missing {
            missing
                .entry(entry.models.clone())
                .or_default()
                .extend(entry.rev_ids.iter().copied());
        }
        missing
    }

    pub fn root_caches(&self) -> &RootCaches {
        &self.root_caches
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JobOutput {
    pub scores: ScoreResults,
    pub errors: BTreeMap<RevId, BTreeMap<ModelName, ErrorBody>>,
}

impl JobOutput {
    pub fn new(scores: ScoreResults, errors: ErrorResults) -> Self {
        let errors = errors
            .into_iter()
            .map(|(rev_id, models)| {
                let models = models
                    .into_iter()
                    .map(|(model_name, error)| {
                        let body = ErrorBody {
                            kind: error.kind().to_string(),
                            message: error.message(),
                        };
                        (model_name, body)
                    })
                    .collect();
                (rev_id, models)
            })
            .collect();
        Self { scores, errors }
    }
}
