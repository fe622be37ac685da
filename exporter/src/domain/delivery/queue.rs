//! Bounded delivery queue with a fixed worker pool
//!
//! All workers share one receiver, so each batch is owned by exactly one
//! worker. Submitters get a [`DeliveryHandle`] that resolves once the batch
//! reaches a terminal state.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::DeliveryError;
use super::sender::{DeliveryReport, RetryingSender};
use crate::core::config::QueueConfig;
use crate::data::remote_write::EncodedBatch;

type DeliveryResult = Result<DeliveryReport, DeliveryError>;

struct Job {
    batch: EncodedBatch,
    reply: oneshot::Sender<DeliveryResult>,
}

enum HandleState {
    Pending(oneshot::Receiver<DeliveryResult>),
    Ready(DeliveryResult),
}

/// Resolves to the terminal outcome of one submitted batch
pub struct DeliveryHandle {
    state: HandleState,
}

impl DeliveryHandle {
    pub(crate) fn ready(result: DeliveryResult) -> Self {
        Self {
            state: HandleState::Ready(result),
        }
    }

    pub async fn outcome(self) -> DeliveryResult {
        match self.state {
            HandleState::Ready(result) => result,
            // Worker dropped the job without replying
            HandleState::Pending(rx) => rx.await.unwrap_or(Err(DeliveryError::QueueClosed)),
        }
    }
}

pub struct DeliveryQueue {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    block_on_full: bool,
    cancel: CancellationToken,
}

impl DeliveryQueue {
    /// Spawn `num_consumers` workers behind a queue of `queue_size` slots.
    pub fn start(sender: RetryingSender, config: &QueueConfig, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(config.queue_size.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let workers = (0..config.num_consumers.max(1))
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&rx),
                    sender.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        tracing::debug!(
            num_consumers = config.num_consumers,
            queue_size = config.queue_size,
            block_on_full = config.block_on_full,
            "Delivery queue started"
        );

        Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            block_on_full: config.block_on_full,
            cancel,
        }
    }

    /// Enqueue a batch. Blocks while the queue is full unless configured to fail fast.
    pub async fn submit(&self, batch: EncodedBatch) -> Result<DeliveryHandle, DeliveryError> {
        let Some(tx) = self.tx.lock().clone() else {
            return Err(DeliveryError::QueueClosed);
        };
        let (reply, rx) = oneshot::channel();
        let job = Job { batch, reply };

        if self.block_on_full {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(DeliveryError::Cancelled),
                sent = tx.send(job) => sent.map_err(|_| DeliveryError::QueueClosed)?,
            }
        } else {
            tx.try_send(job).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::warn!("Delivery queue full, dropping batch");
                    DeliveryError::QueueFull
                }
                mpsc::error::TrySendError::Closed(_) => DeliveryError::QueueClosed,
            })?;
        }

        Ok(DeliveryHandle {
            state: HandleState::Pending(rx),
        })
    }

    /// Close the queue and wait for workers to drain what is already queued.
    pub async fn shutdown(&self) {
        drop(self.tx.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        tracing::debug!(count = workers.len(), "Waiting for delivery workers to drain");
        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Delivery worker panicked");
            }
        }
        tracing::debug!("Delivery queue shutdown complete");
    }
}

async fn run_worker(
    id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    sender: RetryingSender,
    cancel: CancellationToken,
) {
    loop {
        let job = rx.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        let result = if cancel.is_cancelled() {
            Err(DeliveryError::Cancelled)
        } else {
            sender.deliver(&job.batch, &cancel).await
        };
        // Submitter may have stopped waiting
        let _ = job.reply.send(result);
    }
    tracing::debug!(worker = id, "Delivery worker stopped");
}
