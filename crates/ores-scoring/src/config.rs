use std::collections::HashMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Settings shared by every scoring system section.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BaseConfig {
    pub timeout: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringSystemKind {
    SingleThread,
    ThreadPool,
    ProcessPool,
}

/// Program (and its arguments) that speaks the worker protocol on
/// stdin/stdout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new<S: Into<String>>(program: S, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// One named entry under `scoring_systems`, as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSystemSection {
    #[serde(rename = "type")]
    pub kind: ScoringSystemKind,
    pub workers: Option<NonZeroUsize>,
    pub timeout: Option<f64>,
    pub worker_command: Option<WorkerCommand>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: BaseConfig,
    pub scoring_systems: HashMap<String, ScoringSystemSection>,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        Self::from_json(&config_str)
    }

    pub fn from_json(config_str: &str) -> Result<Self> {
        Ok(serde_json::from_str(config_str)?)
    }

    /// Resolve a named section into a validated [`ScoringSystemConfig`].
    pub fn scoring_system(&self, name: &str) -> Result<ScoringSystemConfig> {
        tracing::info!("Loading scoring system '{}' from config.", name);

        let section = self
            .scoring_systems
            .get(name)
            .ok_or_else(|| Error::Config(format!("no scoring system named '{name}'")))?;

        let timeout = section
            .timeout
            .or(self.defaults.timeout)
            .ok_or_else(|| Error::Config(format!("scoring system '{name}' has no timeout")))?;

        if section.kind == ScoringSystemKind::ProcessPool && section.worker_command.is_none() {
            return Err(Error::Config(format!(
                "process pool '{name}' requires a worker_command"
            )));
        }

        Ok(ScoringSystemConfig::new(section.kind, timeout)?
            .with_workers(section.workers)
            .with_worker_command(section.worker_command.clone()))
    }
}

/// Per-task deadline, checked to be a positive number of seconds that fits
/// in a [`Duration`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeout {
    secs: f64,
    duration: Duration,
}

impl Timeout {
    pub fn from_secs_f64(secs: f64) -> Result<Self> {
        let invalid = || {
            Error::Config(format!(
                "timeout must be a positive number of seconds, got {secs}"
            ))
        };
        if secs.is_nan() || secs <= 0.0 {
            return Err(invalid());
        }
        let duration = Duration::try_from_secs_f64(secs).map_err(|_| invalid())?;
        if duration.is_zero() {
            return Err(invalid());
        }
        Ok(Self { secs, duration })
    }

    /// Seconds as configured; this is what timeout messages report.
    pub fn as_secs_f64(&self) -> f64 {
        self.secs
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl TryFrom<f64> for Timeout {
    type Error = Error;

    fn try_from(secs: f64) -> Result<Self> {
        Self::from_secs_f64(secs)
    }
}

/// Validated settings for one scoring system.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringSystemConfig {
    pub kind: ScoringSystemKind,
    /// Maximum number of concurrently active workers; `None` means one per
    /// available processing unit.
    pub workers: Option<NonZeroUsize>,
    pub timeout: Timeout,
    pub worker_command: Option<WorkerCommand>,
}

impl ScoringSystemConfig {
    pub fn new(kind: ScoringSystemKind, timeout: f64) -> Result<Self> {
        Ok(Self {
            kind,
            workers: None,
            timeout: Timeout::from_secs_f64(timeout)?,
            worker_command: None,
        })
    }

    pub fn with_workers(mut self, workers: Option<NonZeroUsize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_worker_command(mut self, worker_command: Option<WorkerCommand>) -> Self {
        self.worker_command = worker_command;
        self
    }

    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        self.workers
            .or_else(|| std::thread::available_parallelism().ok())
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }
}
