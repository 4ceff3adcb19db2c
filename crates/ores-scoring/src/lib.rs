#![doc = include_str!("../README.md")]

pub mod collector;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod pool;
pub mod protocol;
pub mod request;
pub mod scorer;
pub mod scoring_system;
pub mod tasks;
pub mod types;
pub mod worker;

pub use config::{Config, ScoringSystemConfig, ScoringSystemKind, Timeout, WorkerCommand};
pub use error::{Error, Result, ScoreError, TaskError, TimeoutError};
pub use events::{DispatchEvent, EventSink, NoopSink, TracingSink};
pub use request::ScoreRequest;
pub use scorer::{PrecachedScorer, ScoreFn, Scorer};
pub use scoring_system::{
    ConfiguredScoringSystem, ProcessPoolSystem, ScoringSystem, SingleThread, ThreadPoolSystem,
};
pub use types::{
    ErrorResults, MissingModelSetRevs, ModelName, RevId, RootCache, RootCaches, Score,
    ScoreResults, TaskKey,
};
