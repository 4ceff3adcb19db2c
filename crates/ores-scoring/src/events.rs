use std::time::Duration;

use crate::error::TaskError;
use crate::types::{ModelName, RevId};

/// Something worth reporting while a request is dispatched and collected.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    PoolStarted {
        pool: &'static str,
        workers: usize,
    },
    RevisionSkipped {
        rev_id: RevId,
    },
    TaskSubmitted {
        label: String,
    },
    TaskScored {
        rev_id: RevId,
        model_name: ModelName,
        elapsed: Duration,
    },
    TaskTimedOut {
        rev_id: RevId,
        model_name: ModelName,
        timeout: f64,
    },
    TaskFailed {
        rev_id: RevId,
        model_name: ModelName,
        error: TaskError,
    },
    PoolStopped {
        pool: &'static str,
    },
}

/// Receiver of [`DispatchEvent`]s. Passed explicitly to scoring systems.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &DispatchEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &DispatchEvent) {
        use DispatchEvent::*;

        match event {
            PoolStarted { pool, workers } => {
                tracing::debug!(pool, workers, "Worker pool started")
            }
            RevisionSkipped { rev_id } => {
                tracing::debug!(rev_id, "No root cache for revision, skipping")
            }
            TaskSubmitted { label } => tracing::debug!("Submitting score task for {}", label),
            TaskScored {
                rev_id,
                model_name,
                elapsed,
            } => tracing::trace!(
                rev_id,
                model = %model_name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Task scored"
            ),
            TaskTimedOut {
                rev_id,
                model_name,
                timeout,
            } => tracing::warn!(rev_id, model = %model_name, timeout, "Task timed out"),
            TaskFailed {
                rev_id,
                model_name,
                error,
            } => tracing::info!(rev_id, model = %model_name, %error, "Task failed"),
            PoolStopped { pool } => tracing::debug!(pool, "Worker pool stopped"),
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&self, _event: &DispatchEvent) {}
}
