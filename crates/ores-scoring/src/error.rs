use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RevId;

/// Request-level failure. These abort the whole request and are returned to
/// the caller, as opposed to [`TaskError`]s, which are collected per task.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to start worker pool: {0}")]
    PoolStart(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Revision {0} is listed under more than one missing model set")]
    OverlappingRevision(RevId),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A failure raised by a [`Scorer`](crate::Scorer) implementation.
///
/// Serializable so that it survives the trip back from a worker process
/// without losing its identity.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ScoreError {
    pub kind: String,
    pub message: String,
}

impl ScoreError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Deadline expiry for a single task.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("Timed out after {timeout} seconds.")]
pub struct TimeoutError {
    /// Configured per-task timeout in seconds.
    pub timeout: f64,
}

/// Outcome of a task that did not produce a score.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("Worker protocol error: {0}")]
    Protocol(String),
}

impl TaskError {
    /// Error type name as reported to API consumers.
    pub fn kind(&self) -> &str {
        match self {
            TaskError::Timeout(_) => "TimeoutError",
            TaskError::Score(err) => &err.kind,
            TaskError::WorkerCrashed(_) => "WorkerCrashed",
            TaskError::Protocol(_) => crate::protocol::PROTOCOL_ERROR,
        }
    }

    /// Message without the type prefix.
    pub fn message(&self) -> String {
        match self {
            TaskError::Score(err) => err.message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = TaskError::from(TimeoutError { timeout: 5.0 });
        assert_eq!(error.to_string(), "Timed out after 5 seconds.");
        assert_eq!(error.kind(), "TimeoutError");

        let error = TaskError::from(TimeoutError { timeout: 0.25 });
        assert_eq!(error.to_string(), "Timed out after 0.25 seconds.");

        let error = TaskError::from(ScoreError::new("TextDeleted", "Text deleted"));
        assert_eq!(error.to_string(), "TextDeleted: Text deleted");
        assert_eq!(error.kind(), "TextDeleted");
        assert_eq!(error.message(), "Text deleted");

        let error = TaskError::WorkerCrashed("exit status: 1".into());
        assert_eq!(error.to_string(), "Worker crashed: exit status: 1");
        assert_eq!(error.kind(), "WorkerCrashed");

        let error = Error::OverlappingRevision(100);
        assert_eq!(
            error.to_string(),
            "Revision 100 is listed under more than one missing model set"
        );

        let error = Error::IO(std::io::Error::new(std::io::ErrorKind::Other, "test"));
        assert_eq!(error.to_string(), "IO error: test");
    }
}
