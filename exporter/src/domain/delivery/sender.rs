//! Retrying sender
//!
//! Drives one encoded batch through `InFlight -> {Succeeded, RetryScheduled,
//! Failed}`. Each call owns its own backoff state.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::error::DeliveryError;
use crate::core::config::RetryConfig;
use crate::data::remote_write::{EncodedBatch, RemoteWriteTransport, TransportError};
use crate::utils::retry::retry_with_backoff_async;

/// Outcome of a delivered batch
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub attempts: u32,
    pub elapsed: Duration,
    pub series: usize,
    pub samples: usize,
}

#[derive(Clone)]
pub struct RetryingSender {
    transport: Arc<dyn RemoteWriteTransport>,
    retry: RetryConfig,
    attempt_timeout: Duration,
}

impl RetryingSender {
    pub fn new(
        transport: Arc<dyn RemoteWriteTransport>,
        retry: RetryConfig,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            retry,
            attempt_timeout,
        }
    }

    pub async fn deliver(
        &self,
        batch: &EncodedBatch,
        cancel: &CancellationToken,
    ) -> Result<DeliveryReport, DeliveryError> {
        let transport = &self.transport;
        let attempt_timeout = self.attempt_timeout;

        let result = retry_with_backoff_async(
            &self.retry,
            cancel,
            TransportError::is_retryable,
            move || async move {
                match tokio::time::timeout(attempt_timeout, transport.send(batch)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout),
                }
            },
        )
        .await;

        match result {
            Ok(done) => {
                tracing::debug!(
                    series = batch.series,
                    samples = batch.samples,
                    attempts = done.attempts,
                    elapsed_ms = done.elapsed.as_millis(),
                    "Batch delivered"
                );
                Ok(DeliveryReport {
                    attempts: done.attempts,
                    elapsed: done.elapsed,
                    series: batch.series,
                    samples: batch.samples,
                })
            }
            Err(e) => {
                let err = DeliveryError::from(e);
                if err != DeliveryError::Cancelled {
                    tracing::error!(
                        series = batch.series,
                        samples = batch.samples,
                        error = %err,
                        "Batch delivery failed"
                    );
                }
                Err(err)
            }
        }
    }
}
