//! Typed task queue and the retrying worker pool.
//!
//! The synchronous ingest stage enqueues a [`ProcessTask`] and returns; a
//! pool of workers drains the shared queue and runs the asynchronous stage.
//! Execution is at-least-once: a transient failure re-runs the whole task
//! after backoff, so everything the task does must be idempotent or
//! duplicate-tolerant. Ordering holds per producer only up to the queue;
//! workers of different speeds may complete a device's tasks out of order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::pipeline::IngestionPipeline;

// ---

/// Unit of asynchronous work: one persisted reading to post-process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTask {
    // ---
    pub device_id: String,
    pub reading_id: Uuid,
    /// Retries already consumed; 0 on first delivery.
    pub attempt: u32,
}

impl ProcessTask {
    pub fn new(device_id: impl Into<String>, reading_id: Uuid) -> Self {
        // ---
        Self {
            device_id: device_id.into(),
            reading_id,
            attempt: 0,
        }
    }
}

/// Retry behavior for the worker pool.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Exponential backoff before the given retry attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // ---
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

// ---

/// Producer handle to the bounded task channel.
///
/// Cheap to clone; a full channel applies backpressure to ingestion rather
/// than dropping tasks.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<ProcessTask>,
}

impl TaskQueue {
    // ---
    pub fn bounded(depth: usize) -> (Self, mpsc::Receiver<ProcessTask>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { tx }, rx)
    }

    pub async fn enqueue(&self, task: ProcessTask) -> Result<()> {
        // ---
        self.tx
            .send(task)
            .await
            .map_err(|_| PipelineError::transient("task queue is closed"))
    }
}

/// Spawn `count` workers draining `receiver`.
///
/// Each worker classifies failures through the error taxonomy: transient
/// errors are retried in place with exponential backoff up to
/// `policy.max_retries`, then surfaced at error level for operator
/// visibility; validation and not-found failures terminate the task at
/// once. The already-persisted reading is never rolled back.
pub fn spawn_workers(
    count: usize,
    receiver: mpsc::Receiver<ProcessTask>,
    pipeline: Arc<IngestionPipeline>,
    policy: RetryPolicy,
) -> Vec<JoinHandle<()>> {
    // ---
    let receiver = Arc::new(Mutex::new(receiver));

    (0..count)
        .map(|worker| {
            let receiver = Arc::clone(&receiver);
            let pipeline = Arc::clone(&pipeline);

            tokio::spawn(async move {
                info!(worker, "Pipeline worker started");
                loop {
                    // Hold the receiver lock only for the handoff so idle
                    // workers don't starve each other.
                    let task = { receiver.lock().await.recv().await };
                    let Some(task) = task else {
                        info!(worker, "Task queue closed, worker exiting");
                        break;
                    };
                    run_task(worker, task, &pipeline, policy).await;
                }
            })
        })
        .collect()
}

async fn run_task(worker: usize, mut task: ProcessTask, pipeline: &IngestionPipeline, policy: RetryPolicy) {
    // ---
    loop {
        match pipeline.process(&task).await {
            Ok(()) => return,
            Err(err) if err.is_retryable() && task.attempt < policy.max_retries => {
                task.attempt += 1;
                warn!(
                    worker,
                    device_id = %task.device_id,
                    reading_id = %task.reading_id,
                    attempt = task.attempt,
                    "Retrying task after transient failure: {err}"
                );
                tokio::time::sleep(policy.backoff_for(task.attempt)).await;
            }
            Err(err) if err.is_retryable() => {
                error!(
                    worker,
                    device_id = %task.device_id,
                    reading_id = %task.reading_id,
                    "Task failed after {} retries: {err}",
                    policy.max_retries
                );
                return;
            }
            Err(err) => {
                // NotFound and validation failures never heal; log and move on.
                warn!(
                    worker,
                    device_id = %task.device_id,
                    reading_id = %task.reading_id,
                    "Task terminated without retry: {err}"
                );
                return;
            }
        }
    }
}
