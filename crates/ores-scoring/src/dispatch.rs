use std::sync::Arc;

use crate::collector::Collector;
use crate::config::Timeout;
use crate::events::{DispatchEvent, EventSink};
use crate::pool::WorkerPool;
use crate::request::ScoreRequest;
use crate::tasks::Task;
use crate::types::{ErrorResults, ScoreResults};

/// Submit every task to `pool`, collect the outcomes and tear the pool down.
///
/// The pool is owned for the whole cycle; if this future is dropped or
/// unwinds before reaching the explicit shutdown, the pool's `Drop` releases
/// its workers instead.
pub async fn dispatch_and_collect<P: WorkerPool>(
    pool: P,
    request: &ScoreRequest,
    tasks: Vec<Task>,
    timeout: Timeout,
    sink: &dyn EventSink,
) -> (ScoreResults, ErrorResults) {
    sink.record(&DispatchEvent::PoolStarted {
        pool: P::NAME,
        workers: pool.workers(),
    });

    let request = Arc::new(request.clone());
    let handles = tasks
        .into_iter()
        .map(|task| {
            sink.record(&DispatchEvent::TaskSubmitted {
                label: request.format(task.rev_id, &task.model_name),
            });
            pool.submit(&request, task)
        })
        .collect::<Vec<_>>();

    let results = Collector::new(timeout, sink).collect(handles).await;

    pool.shutdown().await;
    sink.record(&DispatchEvent::PoolStopped { pool: P::NAME });

    results
}
