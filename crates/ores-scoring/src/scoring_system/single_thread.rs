use std::sync::Arc;

use tokio::time::Instant;

use crate::collector::Collector;
use crate::config::Timeout;
use crate::error::{Result, TaskError, TimeoutError};
use crate::events::{DispatchEvent, EventSink, TracingSink};
use crate::pool::{panic_message, TaskOutcome};
use crate::request::ScoreRequest;
use crate::scorer::Scorer;
use crate::scoring_system::ScoringSystem;
use crate::tasks::{build_tasks, Task};
use crate::types::{ErrorResults, MissingModelSetRevs, RootCaches, ScoreResults};

/// Scores tasks one at a time on the runtime's blocking threads.
///
/// No pool to manage, but also no isolation beyond catching panics. A call
/// that overruns the timeout is reported as timed out and left to finish in
/// the background while the next task starts.
pub struct SingleThread<S: Scorer> {
    scorer: Arc<S>,
    timeout: Timeout,
    sink: Arc<dyn EventSink>,
}

impl<S: Scorer> SingleThread<S> {
    pub fn new(scorer: S, timeout: Timeout) -> Self {
        Self {
            scorer: Arc::new(scorer),
            timeout,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    async fn run(&self, request: &Arc<ScoreRequest>, task: Task) -> TaskOutcome {
        let scorer = self.scorer.clone();
        let request = request.clone();
        let call = tokio::task::spawn_blocking(move || {
            scorer.score(&request, task.rev_id, &task.model_name, &task.root_cache)
        });

        match tokio::time::timeout(self.timeout.duration(), call).await {
            Ok(Ok(result)) => result.map_err(TaskError::Score),
            Ok(Err(join_error)) if join_error.is_panic() => Err(TaskError::WorkerCrashed(
                panic_message(&*join_error.into_panic()),
            )),
            Ok(Err(join_error)) => Err(TaskError::WorkerCrashed(join_error.to_string())),
            Err(_) => Err(TimeoutError {
                timeout: self.timeout.as_secs_f64(),
            }
            .into()),
        }
    }
}

impl<S: Scorer> ScoringSystem for SingleThread<S> {
    async fn process_missing_scores(
        &self,
        request: &ScoreRequest,
        missing_model_set_revs: &MissingModelSetRevs,
        root_caches: &RootCaches,
        _inprogress_results: Option<&ScoreResults>,
    ) -> Result<(ScoreResults, ErrorResults)> {
        let tasks = build_tasks(missing_model_set_revs, root_caches, &*self.sink)?;
        let request = Arc::new(request.clone());
        let mut collector = Collector::new(self.timeout, &*self.sink);

        for task in tasks {
            self.sink.record(&DispatchEvent::TaskSubmitted {
                label: request.format(task.rev_id, &task.model_name),
            });
            let key = task.key();
            let started = Instant::now();
            let outcome = self.run(&request, task).await;
            collector.record(key, outcome, started.elapsed());
        }

        Ok(collector.into_results())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::ScoreError;
    use crate::scorer::ScoreFn;
    use crate::types::{RevId, RootCache, Score};

    fn scorer(
        _: &ScoreRequest,
        rev_id: RevId,
        model_name: &str,
        _: &RootCache,
    ) -> std::result::Result<Score, ScoreError> {
        match model_name {
            "panics" => panic!("bad model"),
            "slow" => {
                std::thread::sleep(Duration::from_millis(400));
                Ok(json!("late"))
            }
            _ => Ok(json!(rev_id)),
        }
    }

    #[tokio::test]
    async fn test_single_thread_outcomes() {
        let system = SingleThread::new(ScoreFn::new(scorer), Timeout::from_secs_f64(0.1).unwrap());
        let missing = MissingModelSetRevs::from([(
            BTreeSet::from(["panics".to_string(), "slow".to_string(), "wp10".to_string()]),
            BTreeSet::from([7]),
        )]);
        let root_caches = HashMap::from([(7, json!(null))]);

        let (scores, errors) = system
            .process_missing_scores(&ScoreRequest::new("enwiki"), &missing, &root_caches, None)
            .await
            .unwrap();

        assert_eq!(scores[&7]["wp10"], json!(7));
        assert_eq!(
            errors[&7]["panics"],
            TaskError::WorkerCrashed("panicked: bad model".into())
        );
        assert_eq!(errors[&7]["slow"].to_string(), "Timed out after 0.1 seconds.");
        assert_eq!(scores[&7].len() + errors[&7].len(), 3);
    }
}
