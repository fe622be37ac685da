use std::time::Duration;

use thiserror::Error;

use crate::data::remote_write::TransportError;
use crate::utils::retry::RetryError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("Remote write rejected batch after {attempts} attempt(s): {error}")]
    Permanent { error: TransportError, attempts: u32 },

    #[error("Retries exhausted after {attempts} attempt(s) in {elapsed:?}: {last_error}")]
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last_error: TransportError,
    },

    #[error("Delivery cancelled")]
    Cancelled,

    #[error("Delivery queue is full")]
    QueueFull,

    #[error("Delivery queue is closed")]
    QueueClosed,
}

impl From<RetryError<TransportError>> for DeliveryError {
    fn from(e: RetryError<TransportError>) -> Self {
        match e {
            RetryError::Permanent { error, attempts } => Self::Permanent { error, attempts },
            RetryError::Exhausted {
                error,
                attempts,
                elapsed,
            } => Self::Exhausted {
                attempts,
                elapsed,
                last_error: error,
            },
            RetryError::Cancelled { .. } => Self::Cancelled,
        }
    }
}
