//! Worker pools. A pool accepts tasks without blocking and hands back a
//! [`PendingHandle`] per task; the outcome arrives over a oneshot channel.
mod process;
mod thread;

pub use process::ProcessPool;
pub use thread::ThreadPool;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{error::Elapsed, Instant};
use uuid::Uuid;

use crate::error::TaskError;
use crate::request::ScoreRequest;
use crate::tasks::Task;
use crate::types::{Score, TaskKey};

pub type TaskId = Uuid;

/// Final outcome reported by a worker for one task.
pub type TaskOutcome = Result<Score, TaskError>;

/// Queue entry travelling from the submitting side to a worker.
#[derive(Debug)]
pub(crate) struct QueueEntry {
    pub id: TaskId,
    pub request: Arc<ScoreRequest>,
    pub task: Task,
    pub response_tx: oneshot::Sender<TaskOutcome>,
    /// Instant when this entry was queued
    pub queue_time: Instant,
}

impl QueueEntry {
    pub fn new(request: Arc<ScoreRequest>, task: Task) -> (Self, PendingHandle) {
        let (response_tx, response_rx) = oneshot::channel();
        let id = Uuid::new_v4();
        let handle = PendingHandle {
            id,
            key: task.key(),
            rx: response_rx,
        };
        let entry = Self {
            id,
            request,
            task,
            response_tx,
            queue_time: Instant::now(),
        };
        (entry, handle)
    }
}

/// In-flight handle for one submitted task.
#[derive(Debug)]
pub struct PendingHandle {
    pub id: TaskId,
    pub key: TaskKey,
    rx: oneshot::Receiver<TaskOutcome>,
}

impl PendingHandle {
    /// Wait for the task's outcome for at most `timeout`, counted from now.
    ///
    /// Dropping the handle (which happens on timeout) tells the worker side
    /// that nobody is interested in the result anymore.
    pub async fn wait(self, timeout: Duration) -> Result<TaskOutcome, Elapsed> {
        let outcome = tokio::time::timeout(timeout, self.rx).await?;
        Ok(outcome.unwrap_or_else(|_| {
            Err(TaskError::WorkerCrashed(
                "worker went away before reporting a result".into(),
            ))
        }))
    }
}

/// A bounded set of isolated workers, alive for one dispatch/collect cycle.
///
/// Dropping a pool must release its workers, so that an unexpected failure
/// while collecting never leaks them.
pub trait WorkerPool: Sized {
    /// Short name used in events.
    const NAME: &'static str;

    fn workers(&self) -> usize;

    /// Queue a task. Never blocks; if the pool cannot run the task anymore
    /// the handle resolves to a [`TaskError::WorkerCrashed`].
    fn submit(&self, request: &Arc<ScoreRequest>, task: Task) -> PendingHandle;

    /// Tear the pool down once every handle is resolved or abandoned.
    #[allow(async_fn_in_trait)]
    async fn shutdown(self);
}

/// Run `op`, turning a panic into its message.
pub(crate) fn catch_panic<T>(op: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(op)).map_err(|payload| panic_message(&*payload))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn task(rev_id: u64, model_name: &str) -> Task {
        Task {
            rev_id,
            model_name: model_name.into(),
            root_cache: Arc::new(json!(null)),
        }
    }

    #[tokio::test]
    async fn test_handle_resolves() {
        let request = Arc::new(ScoreRequest::new("enwiki"));
        let (entry, handle) = QueueEntry::new(request, task(100, "wp10"));
        assert_eq!(entry.id, handle.id);
        assert_eq!(handle.key, entry.task.key());

        entry.response_tx.send(Ok(json!(0.87))).unwrap();
        let outcome = handle.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(outcome, Ok(json!(0.87)));
    }

    #[tokio::test]
    async fn test_handle_elapses() {
        let request = Arc::new(ScoreRequest::new("enwiki"));
        let (entry, handle) = QueueEntry::new(request, task(100, "wp10"));

        assert!(handle.wait(Duration::from_millis(20)).await.is_err());
        // The worker side can tell that nobody is waiting anymore.
        assert!(entry.response_tx.is_closed());
    }

    #[tokio::test]
    async fn test_dropped_entry_is_a_crash() {
        let request = Arc::new(ScoreRequest::new("enwiki"));
        let (entry, handle) = QueueEntry::new(request, task(100, "wp10"));
        drop(entry);

        let outcome = handle.wait(Duration::from_secs(1)).await.unwrap();
        assert!(matches!(outcome, Err(TaskError::WorkerCrashed(_))));
    }

    #[test]
    fn test_catch_panic() {
        assert_eq!(catch_panic(|| 1), Ok(1));
        assert_eq!(
            catch_panic(|| -> i32 { panic!("boom") }),
            Err("panicked: boom".to_string())
        );
        let code = 7;
        assert_eq!(
            catch_panic(|| -> i32 { panic!("code {code}") }),
            Err("panicked: code 7".to_string())
        );
    }
}
