use std::process::Stdio;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::WorkerCommand;
use crate::error::{Error, Result, TaskError};
use crate::pool::{PendingHandle, QueueEntry, TaskOutcome, WorkerPool};
use crate::protocol::{WorkerRequest, WorkerResponse};
use crate::request::ScoreRequest;
use crate::tasks::Task;

type SharedQueue = Arc<Mutex<UnboundedReceiver<QueueEntry>>>;

/// One worker child process and its protocol pipes.
struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl WorkerProcess {
    fn spawn(command: &WorkerCommand) -> std::io::Result<Self> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("worker stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("worker stdout not captured"))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    /// Write one request line and read one response line.
    async fn call(&mut self, line: &str) -> std::io::Result<Option<String>> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        self.stdout.next_line().await
    }

    fn describe_exit(&mut self) -> String {
        match self.child.try_wait() {
            Ok(Some(status)) => format!("worker process exited ({status})"),
            _ => "worker process closed its output".to_string(),
        }
    }
}

/// Child processes speaking the worker protocol, each driven by its own
/// tokio task.
///
/// A worker that dies mid-task fails that task only and is replaced. When
/// the collector stops waiting on a task, the process running it is killed
/// and replaced as well. Dropping the pool kills every child.
pub struct ProcessPool {
    tx: Option<UnboundedSender<QueueEntry>>,
    drivers: Vec<JoinHandle<()>>,
}

impl ProcessPool {
    /// Spawn `workers` processes. Failing to spawn any of them fails the
    /// whole pool.
    pub fn start(command: &WorkerCommand, workers: usize) -> Result<Self> {
        let (tx, rx) = unbounded_channel();
        let queue: SharedQueue = Arc::new(Mutex::new(rx));

        let mut pool = Self {
            tx: Some(tx),
            drivers: Vec::with_capacity(workers),
        };

        for index in 0..workers.max(1) {
            let process = WorkerProcess::spawn(command).map_err(|e| {
                Error::PoolStart(format!("could not spawn `{}`: {e}", command.program))
            })?;
            pool.drivers.push(tokio::spawn(drive_worker(
                index,
                command.clone(),
                process,
                queue.clone(),
            )));
        }

        Ok(pool)
    }

    fn close(&mut self) -> Vec<JoinHandle<()>> {
        self.tx.take();
        let drivers = std::mem::take(&mut self.drivers);
        for driver in &drivers {
            driver.abort();
        }
        drivers
    }
}

async fn drive_worker(
    index: usize,
    command: WorkerCommand,
    mut process: WorkerProcess,
    queue: SharedQueue,
) {
    loop {
        let entry = { queue.lock().await.recv().await };
        let Some(entry) = entry else {
            break;
        };
        let QueueEntry {
            id,
            request,
            task,
            mut response_tx,
            queue_time,
        } = entry;

        if response_tx.is_closed() {
            continue;
        }
        tracing::trace!(
            "Worker {} processing task {}, added {}ms ago",
            index,
            id,
            queue_time.elapsed().as_millis()
        );

        let worker_request = WorkerRequest {
            request: ScoreRequest::clone(&request),
            rev_id: task.rev_id,
            model_name: task.model_name,
            root_cache: (*task.root_cache).clone(),
        };
        let line = match serde_json::to_string(&worker_request) {
            Ok(line) => line,
            Err(e) => {
                let _ = response_tx.send(Err(TaskError::Protocol(e.to_string())));
                continue;
            }
        };

        let response = tokio::select! {
            response = process.call(&line) => Some(response),
            _ = response_tx.closed() => None,
        };
        let outcome: Option<TaskOutcome> = response.map(|response| match response {
            Ok(Some(response)) => WorkerResponse::parse_line(&response),
            Ok(None) => Err(TaskError::WorkerCrashed(process.describe_exit())),
            Err(e) => Err(TaskError::WorkerCrashed(e.to_string())),
        });

        let restart = match outcome {
            Some(outcome) => {
                // After a line that is not a response, the pipe can no longer
                // be trusted to pair the next line with the next request.
                let crashed = matches!(
                    outcome,
                    Err(TaskError::WorkerCrashed(_) | TaskError::Protocol(_))
                );
                if response_tx.send(outcome).is_err() {
                    tracing::trace!("Result of task {} discarded, collector stopped waiting", id);
                }
                crashed
            }
            None => {
                tracing::debug!("Task {} abandoned by the collector, killing worker {}", id, index);
                true
            }
        };

        if restart {
            // The old child is killed when dropped.
            process = match WorkerProcess::spawn(&command) {
                Ok(process) => process,
                Err(e) => {
                    tracing::error!("Failed to respawn worker {}: {}", index, e);
                    break;
                }
            };
        }
    }
}

impl WorkerPool for ProcessPool {
    const NAME: &'static str = "process_pool";

    fn workers(&self) -> usize {
        self.drivers.len()
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
        let drivers = self.close();
        // Aborted drivers drop their child processes, which kills them.
        join_all(drivers).await;
    }
}

impl Drop for ProcessPool {
    fn drop(&mut self) {
        self.close();
    }
}
