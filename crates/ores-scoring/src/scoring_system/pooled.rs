use std::sync::Arc;

use crate::config::{Timeout, WorkerCommand};
use crate::dispatch::dispatch_and_collect;
use crate::error::Result;
use crate::events::{EventSink, TracingSink};
use crate::pool::{ProcessPool, ThreadPool};
use crate::request::ScoreRequest;
use crate::scorer::Scorer;
use crate::scoring_system::ScoringSystem;
use crate::tasks::build_tasks;
use crate::types::{ErrorResults, MissingModelSetRevs, RootCaches, ScoreResults};

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Scores each task on a pool of dedicated threads created per request.
pub struct ThreadPoolSystem<S: Scorer> {
    scorer: Arc<S>,
    timeout: Timeout,
    workers: usize,
    sink: Arc<dyn EventSink>,
}

impl<S: Scorer> ThreadPoolSystem<S> {
    pub fn new(scorer: S, timeout: Timeout) -> Self {
        Self {
            scorer: Arc::new(scorer),
            timeout,
            workers: default_workers(),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl<S: Scorer> ScoringSystem for ThreadPoolSystem<S> {
    async fn process_missing_scores(
        &self,
        request: &ScoreRequest,
        missing_model_set_revs: &MissingModelSetRevs,
        root_caches: &RootCaches,
        _inprogress_results: Option<&ScoreResults>,
    ) -> Result<(ScoreResults, ErrorResults)> {
        let tasks = build_tasks(missing_model_set_revs, root_caches, &*self.sink)?;
        if tasks.is_empty() {
            return Ok(Default::default());
        }

        let pool = ThreadPool::start(self.scorer.clone(), self.workers.min(tasks.len()))?;
        Ok(dispatch_and_collect(pool, request, tasks, self.timeout, &*self.sink).await)
    }
}

/// Scores each task in a worker process created per request.
pub struct ProcessPoolSystem {
    command: WorkerCommand,
    timeout: Timeout,
    workers: usize,
    sink: Arc<dyn EventSink>,
}

impl ProcessPoolSystem {
    pub fn new(command: WorkerCommand, timeout: Timeout) -> Self {
        Self {
            command,
            timeout,
            workers: default_workers(),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl ScoringSystem for ProcessPoolSystem {
    async fn process_missing_scores(
        &self,
        request: &ScoreRequest,
        missing_model_set_revs: &MissingModelSetRevs,
        root_caches: &RootCaches,
        _inprogress_results: Option<&ScoreResults>,
    ) -> Result<(ScoreResults, ErrorResults)> {
        let tasks = build_tasks(missing_model_set_revs, root_caches, &*self.sink)?;
        if tasks.is_empty() {
            return Ok(Default::default());
        }

        let pool = ProcessPool::start(&self.command, self.workers.min(tasks.len()))?;
        Ok(dispatch_and_collect(pool, request, tasks, self.timeout, &*self.sink).await)
    }
}
