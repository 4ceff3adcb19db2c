//! Line protocol between a process pool and its worker processes.
//!
//! Each task is one JSON request line written to the worker's stdin,
//! answered by exactly one JSON response line on its stdout.
use serde::{Deserialize, Serialize};

use crate::error::{ScoreError, TaskError};
use crate::request::ScoreRequest;
use crate::types::{ModelName, RevId, RootCache, Score};

/// Error kind a worker answers with when it cannot read a request line.
pub const PROTOCOL_ERROR: &str = "ProtocolError";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub request: ScoreRequest,
    pub rev_id: RevId,
    pub model_name: ModelName,
    pub root_cache: RootCache,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerResponse {
    Ok(Score),
    Err(ScoreError),
}

impl From<Result<Score, ScoreError>> for WorkerResponse {
    fn from(result: Result<Score, ScoreError>) -> Self {
        match result {
            Ok(score) => WorkerResponse::Ok(score),
            Err(error) => WorkerResponse::Err(error),
        }
    }
}

impl WorkerResponse {
    /// Parse a response line as read from a worker.
    pub fn parse_line(line: &str) -> Result<Score, TaskError> {
        match serde_json::from_str(line) {
            Ok(WorkerResponse::Ok(score)) => Ok(score),
            Ok(WorkerResponse::Err(error)) if error.kind == PROTOCOL_ERROR => {
                Err(TaskError::Protocol(error.message))
            }
            Ok(WorkerResponse::Err(error)) => Err(TaskError::Score(error)),
            Err(e) => Err(TaskError::Protocol(format!("{e}: {line:?}"))),
        }
    }
}
