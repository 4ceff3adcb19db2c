use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{unbounded, Receiver, Sender};
use uuid::Uuid;

use crate::error::{Error, Result, TaskError};
use crate::pool::{catch_panic, PendingHandle, QueueEntry, WorkerPool};
use crate::request::ScoreRequest;
use crate::scorer::Scorer;
use crate::tasks::Task;

#[derive(Debug, Default)]
struct PoolState {
    closed: AtomicBool,
    busy: AtomicUsize,
}

/// Dedicated OS threads pulling tasks off one shared queue.
///
/// A panicking scorer only fails the task it was running. Running calls
/// cannot be interrupted: on shutdown, queued tasks are dropped and busy
/// threads are left to finish their current call before exiting.
#[derive(Debug)]
pub struct ThreadPool {
    tx: Option<Sender<QueueEntry>>,
    state: Arc<PoolState>,
    join_handles: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn start<S: Scorer>(scorer: Arc<S>, workers: usize) -> Result<Self> {
        let (tx, rx) = unbounded();
        let state = Arc::new(PoolState::default());

        let join_handles = (0..workers.max(1))
            .map(|_| {
                let rx = rx.clone();
                let scorer = scorer.clone();
                let state = state.clone();
                std::thread::Builder::new()
                    .name(format!("score-worker-{}", Uuid::new_v4()))
                    .spawn(move || worker_loop(&*scorer, rx, &state))
                    .map_err(|e| Error::PoolStart(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tx: Some(tx),
            state,
            join_handles,
        })
    }

    fn close(&mut self) -> usize {
        self.state.closed.store(true, Ordering::SeqCst);
        self.tx.take();
        self.state.busy.load(Ordering::SeqCst)
    }
}

fn worker_loop<S: Scorer>(scorer: &S, rx: Receiver<QueueEntry>, state: &PoolState) {
    while let Ok(entry) = rx.recv() {
        state.busy.fetch_add(1, Ordering::SeqCst);
        if state.closed.load(Ordering::SeqCst) {
            state.busy.fetch_sub(1, Ordering::SeqCst);
            break;
        }
        if entry.response_tx.is_closed() {
            tracing::trace!("Skipping task {}, nobody is waiting for it", entry.id);
            state.busy.fetch_sub(1, Ordering::SeqCst);
            continue;
        }

        tracing::trace!(
            "Processing task {}, added {}ms ago",
            entry.id,
            entry.queue_time.elapsed().as_millis()
        );

        let task = &entry.task;
        let outcome = catch_panic(|| {
            scorer.score(&entry.request, task.rev_id, &task.model_name, &task.root_cache)
        })
        .map_err(TaskError::WorkerCrashed)
        .and_then(|result| result.map_err(TaskError::Score));
        state.busy.fetch_sub(1, Ordering::SeqCst);

        if entry.response_tx.send(outcome).is_err() {
            tracing::trace!("Result of task {} discarded, collector stopped waiting", entry.id)
        }
    }
}

impl WorkerPool for ThreadPool {
    const NAME: &'static str = "thread_pool";

    fn workers(&self) -> usize {
        self.join_handles.len()
    }

    fn submit(&self, request: &Arc<ScoreRequest>, task: Task) -> PendingHandle {
        let (entry, handle) = QueueEntry::new(request.clone(), task);
        if let Some(tx) = &self.tx {
            if tx.send(entry).is_err() {
                tracing::error!("Failed to queue task {}, all workers are gone", handle.id);
            }
        }
        handle
    }

    async fn shutdown(mut self) {
        let busy = self.close();
        let join_handles = std::mem::take(&mut self.join_handles);

        if busy > 0 {
            tracing::warn!(
                "{} worker thread(s) still running abandoned tasks, detaching them",
                busy
            );
            return;
        }

        // Idle workers see the closed queue and exit right away.
        let joined = tokio::task::spawn_blocking(move || {
            join_handles
                .into_iter()
                .filter_map(|handle| handle.join().err())
                .count()
        })
        .await;
        if !matches!(joined, Ok(0)) {
            tracing::error!("Worker thread failed while shutting down the pool");
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.close();
    }
}
