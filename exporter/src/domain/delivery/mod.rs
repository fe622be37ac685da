//! Delivery pipeline
//!
//! - `sender` - per-batch retry state machine
//! - `queue` - bounded queue and worker pool
//! - `error` - terminal delivery failures

mod error;
mod queue;
mod sender;

pub use error::DeliveryError;
pub use queue::{DeliveryHandle, DeliveryQueue};
pub use sender::{DeliveryReport, RetryingSender};

#[cfg(test)]
pub(crate) use sender::tests as testing;

use tokio_util::sync::CancellationToken;

use crate::core::config::QueueConfig;
use crate::data::remote_write::EncodedBatch;

/// Queued delivery through the worker pool, or direct delivery in the caller's task
pub enum DeliveryPipeline {
    Direct {
        sender: RetryingSender,
        cancel: CancellationToken,
    },
    Queued(DeliveryQueue),
}

impl DeliveryPipeline {
    pub fn new(sender: RetryingSender, config: &QueueConfig, cancel: CancellationToken) -> Self {
        if config.enabled {
            Self::Queued(DeliveryQueue::start(sender, config, cancel))
        } else {
            tracing::debug!("Delivery queue disabled, sending in caller task");
            Self::Direct { sender, cancel }
        }
    }

    /// Hand a batch to the pipeline. In direct mode this runs the whole
    /// delivery before returning.
    pub async fn submit(&self, batch: EncodedBatch) -> Result<DeliveryHandle, DeliveryError> {
        match self {
            Self::Direct { sender, cancel } => {
                Ok(DeliveryHandle::ready(sender.deliver(&batch, cancel).await))
            }
            Self::Queued(queue) => queue.submit(batch).await,
        }
    }

    pub async fn shutdown(&self) {
        if let Self::Queued(queue) = self {
            queue.shutdown().await;
        }
    }
}
