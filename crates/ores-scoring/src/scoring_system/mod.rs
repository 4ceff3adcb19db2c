//! Scoring systems: interchangeable strategies for turning missing scores
//! into results, selected by configuration.
mod pooled;
mod single_thread;

pub use pooled::{ProcessPoolSystem, ThreadPoolSystem};
pub use single_thread::SingleThread;

use std::sync::Arc;

use crate::config::{ScoringSystemConfig, ScoringSystemKind};
use crate::error::{Error, Result};
use crate::events::{EventSink, TracingSink};
use crate::request::ScoreRequest;
use crate::scorer::Scorer;
use crate::types::{ErrorResults, MissingModelSetRevs, RootCaches, ScoreResults};

/// Can process missing scores for a request, given the root caches.
pub trait ScoringSystem {
    /// Score every (revision, model) pair in `missing_model_set_revs` that has
    /// a root cache. Per-task failures land in the returned [`ErrorResults`];
    /// only request-level failures are returned as `Err`.
    ///
    /// `inprogress_results` is only meaningful for systems that can join work
    /// already running on behalf of other requests.
    #[allow(async_fn_in_trait)]
    async fn process_missing_scores(
        &self,
        request: &ScoreRequest,
        missing_model_set_revs: &MissingModelSetRevs,
        root_caches: &RootCaches,
        inprogress_results: Option<&ScoreResults>,
    ) -> Result<(ScoreResults, ErrorResults)>;
}

/// A scoring system picked at runtime from a [`ScoringSystemConfig`].
pub enum ConfiguredScoringSystem<S: Scorer> {
    SingleThread(SingleThread<S>),
    ThreadPool(ThreadPoolSystem<S>),
    ProcessPool(ProcessPoolSystem),
}

impl<S: Scorer> ConfiguredScoringSystem<S> {
    /// Build the configured system. `scorer` runs in-process for the single
    /// thread and thread pool kinds; a process pool runs whatever its
    /// worker command serves instead.
    pub fn from_config(config: &ScoringSystemConfig, scorer: S) -> Result<Self> {
        Self::with_sink(config, scorer, Arc::new(TracingSink))
    }

    pub fn with_sink(
        config: &ScoringSystemConfig,
        scorer: S,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let system = match config.kind {
            ScoringSystemKind::SingleThread => {
                Self::SingleThread(SingleThread::new(scorer, config.timeout).with_sink(sink))
            }
            ScoringSystemKind::ThreadPool => Self::ThreadPool(
                ThreadPoolSystem::new(scorer, config.timeout)
                    .with_workers(config.worker_count())
                    .with_sink(sink),
            ),
            ScoringSystemKind::ProcessPool => {
                let command = config.worker_command.clone().ok_or_else(|| {
                    Error::Config("process pool requires a worker_command".to_string())
                })?;
                Self::ProcessPool(
                    ProcessPoolSystem::new(command, config.timeout)
                        .with_workers(config.worker_count())
                        .with_sink(sink),
                )
            }
        };
        Ok(system)
    }
}

impl<S: Scorer> ScoringSystem for ConfiguredScoringSystem<S> {
    async fn process_missing_scores(
        &self,
        request: &ScoreRequest,
        missing_model_set_revs: &MissingModelSetRevs,
        root_caches: &RootCaches,
        inprogress_results: Option<&ScoreResults>,
    ) -> Result<(ScoreResults, ErrorResults)> {
        match self {
            Self::SingleThread(system) => {
                system
                    .process_missing_scores(
                        request,
                        missing_model_set_revs,
                        root_caches,
                        inprogress_results,
                    )
                    .await
            }
            Self::ThreadPool(system) => {
                system
                    .process_missing_scores(
                        request,
                        missing_model_set_revs,
                        root_caches,
                        inprogress_results,
                    )
                    .await
            }
            Self::ProcessPool(system) => {
                system
                    .process_missing_scores(
                        request,
                        missing_model_set_revs,
                        root_caches,
                        inprogress_results,
                    )
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::config::WorkerCommand;
    use crate::scorer::PrecachedScorer;

    #[test]
    fn test_selected_by_kind() {
        let config = ScoringSystemConfig::new(ScoringSystemKind::ThreadPool, 5.0)
            .unwrap()
            .with_workers(NonZeroUsize::new(3));
        let system = ConfiguredScoringSystem::from_config(&config, PrecachedScorer).unwrap();
        assert!(matches!(&system, ConfiguredScoringSystem::ThreadPool(s) if s.workers() == 3));

        let config = ScoringSystemConfig::new(ScoringSystemKind::SingleThread, 5.0).unwrap();
        let system = ConfiguredScoringSystem::from_config(&config, PrecachedScorer).unwrap();
        assert!(matches!(system, ConfiguredScoringSystem::SingleThread(_)));

        let config = ScoringSystemConfig::new(ScoringSystemKind::ProcessPool, 5.0)
            .unwrap()
            .with_worker_command(Some(WorkerCommand::new("ores-scoring", ["worker"])));
        let system = ConfiguredScoringSystem::from_config(&config, PrecachedScorer).unwrap();
        assert!(matches!(system, ConfiguredScoringSystem::ProcessPool(_)));
    }

    #[test]
    fn test_process_pool_without_command() {
        let config = ScoringSystemConfig::new(ScoringSystemKind::ProcessPool, 5.0).unwrap();
        let result = ConfiguredScoringSystem::from_config(&config, PrecachedScorer);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
