use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::{DispatchEvent, EventSink};
use crate::types::{MissingModelSetRevs, ModelName, RevId, RootCache, RootCaches, TaskKey};

/// One (revision, model) unit of work.
#[derive(Debug, Clone)]
pub struct Task {
    pub rev_id: RevId,
    pub model_name: ModelName,
    pub root_cache: Arc<RootCache>,
}

impl Task {
    pub fn key(&self) -> TaskKey {
        TaskKey {
            rev_id: self.rev_id,
            model_name: self.model_name.clone(),
        }
    }
}

/// Expand missing model sets into concrete tasks.
///
/// Revisions without a root cache are skipped, not failed. Every task of one
/// revision shares the same root cache allocation.
pub fn build_tasks(
    missing_model_set_revs: &MissingModelSetRevs,
    root_caches: &RootCaches,
    sink: &dyn EventSink,
) -> Result<Vec<Task>> {
    let mut seen = HashSet::new();
    let mut tasks = Vec::new();

    for (model_names, rev_ids) in missing_model_set_revs {
        for &rev_id in rev_ids {
            if !seen.insert(rev_id) {
                return Err(Error::OverlappingRevision(rev_id));
            }
            let Some(root_cache) = root_caches.get(&rev_id) else {
                sink.record(&DispatchEvent::RevisionSkipped { rev_id });
                continue;
            };
            let root_cache = Arc::new(root_cache.clone());
            tasks.extend(model_names.iter().map(|model_name| Task {
                rev_id,
                model_name: model_name.clone(),
                root_cache: root_cache.clone(),
            }));
        }
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use serde_json::json;

    use super::*;
    use crate::events::NoopSink;

    fn models(names: &[&str]) -> BTreeSet<ModelName> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_skips_revisions_without_root_cache() {
        let missing = MissingModelSetRevs::from([(models(&["wp10"]), BTreeSet::from([100, 101]))]);
        let root_caches = HashMap::from([(100, json!({"ctx": 1}))]);

        let tasks = build_tasks(&missing, &root_caches, &NoopSink).unwrap();

        let keys: Vec<_> = tasks.iter().map(Task::key).collect();
        assert_eq!(
            keys,
            vec![TaskKey {
                rev_id: 100,
                model_name: "wp10".into()
            }]
        );
        assert_eq!(*tasks[0].root_cache, json!({"ctx": 1}));
    }

    #[test]
    fn test_cross_product() {
        let missing = MissingModelSetRevs::from([
            (models(&["damaging", "goodfaith"]), BTreeSet::from([1, 2])),
            (models(&["wp10"]), BTreeSet::from([3])),
        ]);
        let root_caches = HashMap::from([(1, json!(1)), (2, json!(2)), (3, json!(3))]);

        let tasks = build_tasks(&missing, &root_caches, &NoopSink).unwrap();

        let keys: HashSet<_> = tasks.iter().map(|t| (t.rev_id, t.model_name.as_str())).collect();
        assert_eq!(tasks.len(), 5);
        assert_eq!(
            keys,
            HashSet::from([
                (1, "damaging"),
                (1, "goodfaith"),
                (2, "damaging"),
                (2, "goodfaith"),
                (3, "wp10"),
            ])
        );
        for task in &tasks {
            assert_eq!(*task.root_cache, json!(task.rev_id));
        }
    }

    #[test]
    fn test_overlapping_revision_is_rejected() {
        let missing = MissingModelSetRevs::from([
            (models(&["damaging"]), BTreeSet::from([1])),
            (models(&["wp10"]), BTreeSet::from([1])),
        ]);
        let root_caches = HashMap::from([(1, json!(null))]);

        let result = build_tasks(&missing, &root_caches, &NoopSink);
        assert!(matches!(result, Err(Error::OverlappingRevision(1))));
    }

    #[test]
    fn test_empty_input() {
        let tasks = build_tasks(&MissingModelSetRevs::new(), &RootCaches::new(), &NoopSink).unwrap();
        assert!(tasks.is_empty());
    }
}
