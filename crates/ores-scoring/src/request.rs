use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ModelName, RevId};

/// Context of a scoring request.
///
/// Carries no computation logic itself; the engine only uses it to label
/// diagnostics and hands it to the [`Scorer`](crate::Scorer) untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub context_name: String,

    #[serde(default)]
    pub rev_ids: BTreeSet<RevId>,

    #[serde(default)]
    pub model_names: BTreeSet<ModelName>,

    #[serde(default)]
    pub precache: bool,

    #[serde(default)]
    pub include_features: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection_caches: Option<BTreeMap<RevId, serde_json::Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_info: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl ScoreRequest {
    pub fn new(context_name: impl Into<String>) -> Self {
        Self {
            context_name: context_name.into(),
            ..Default::default()
        }
    }

    pub fn with_rev_ids(mut self, rev_ids: impl IntoIterator<Item = RevId>) -> Self {
        self.rev_ids = rev_ids.into_iter().collect();
        self
    }

    pub fn with_model_names<S: Into<ModelName>>(
        mut self,
        model_names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.model_names = model_names.into_iter().map(Into::into).collect();
        self
    }

    /// Label for a single (revision, model) pair of this request.
    pub fn format(&self, rev_id: RevId, model_name: &str) -> String {
        format!(
            "'{}':{}:'{}'{}",
            self.context_name,
            rev_id,
            model_name,
            self.format_options()
        )
    }

    fn format_options(&self) -> String {
        let mut options = Vec::new();
        if self.precache {
            options.push("precache".to_string());
        }
        if self.include_features {
            options.push("features".to_string());
        }
        if let Some(caches) = self.injection_caches.as_ref().filter(|c| !c.is_empty()) {
            let caches = serde_json::to_string(caches).unwrap_or_default();
            options.push(format!("injection_caches={caches}"));
        }
        if let Some(model_info) = &self.model_info {
            options.push(format!("model_info={}", model_info.join(",")));
        }
        if let Some(ip) = &self.ip {
            options.push(format!("ip={ip}"));
        }
        format!("({})", options.join(", "))
    }
}

impl fmt::Display for ScoreRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rev_ids = self
            .rev_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let model_names = self
            .model_names
            .iter()
            .map(|m| format!("'{m}'"))
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "'{}':{{{}}}:{{{}}}{}",
            self.context_name,
            rev_ids,
            model_names,
            self.format_options()
        )
    }
}
