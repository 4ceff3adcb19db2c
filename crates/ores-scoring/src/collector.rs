use std::time::Duration;

use tokio::time::Instant;

use crate::config::Timeout;
use crate::error::{TaskError, TimeoutError};
use crate::events::{DispatchEvent, EventSink};
use crate::pool::{PendingHandle, TaskOutcome};
use crate::types::{ErrorResults, ScoreResults, TaskKey};

/// Resolves pending handles under a per-task deadline and sorts the
/// outcomes into scores and errors.
pub struct Collector<'a> {
    timeout: Timeout,
    sink: &'a dyn EventSink,
    scores: ScoreResults,
    errors: ErrorResults,
}

impl<'a> Collector<'a> {
    /// `timeout` applies to each task separately.
    pub fn new(timeout: Timeout, sink: &'a dyn EventSink) -> Self {
        Self {
            timeout,
            sink,
            scores: ScoreResults::new(),
            errors: ErrorResults::new(),
        }
    }

    /// Wait on every handle in turn. Each deadline starts when waiting on
    /// that handle begins.
    pub async fn collect(
        mut self,
        handles: impl IntoIterator<Item = PendingHandle>,
    ) -> (ScoreResults, ErrorResults) {
        for handle in handles {
            let key = handle.key.clone();
            let started = Instant::now();
            let outcome = handle
                .wait(self.timeout.duration())
                .await
                .unwrap_or_else(|_| {
                    Err(TimeoutError {
                        timeout: self.timeout.as_secs_f64(),
                    }
                    .into())
                });
            self.record(key, outcome, started.elapsed());
        }
        (self.scores, self.errors)
    }

    /// Merge one outcome into the result maps.
    pub fn record(&mut self, key: TaskKey, outcome: TaskOutcome, elapsed: Duration) {
        let TaskKey { rev_id, model_name } = key;
        match outcome {
            Ok(score) => {
                self.sink.record(&DispatchEvent::TaskScored {
                    rev_id,
                    model_name: model_name.clone(),
                    elapsed,
                });
                self.scores.entry(rev_id).or_default().insert(model_name, score);
            }
            Err(error) => {
                let event = match &error {
                    TaskError::Timeout(TimeoutError { timeout }) => DispatchEvent::TaskTimedOut {
                        rev_id,
                        model_name: model_name.clone(),
                        timeout: *timeout,
                    },
                    other => DispatchEvent::TaskFailed {
                        rev_id,
                        model_name: model_name.clone(),
                        error: other.clone(),
                    },
                };
                self.sink.record(&event);
                self.errors.entry(rev_id).or_default().insert(model_name, error);
            }
        }
    }

    pub fn into_results(self) -> (ScoreResults, ErrorResults) {
        (self.scores, self.errors)
    }
}
