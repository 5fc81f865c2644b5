//! Job queue capability.
//!
//! ## Contract
//!
//! - `receive` long-polls for at most `wait` and yields at most one job.
//!   An empty poll is `None`, never an error; transport failures are retried
//!   a bounded number of times and then also surface as `None`.
//! - `acknowledge` consumes the delivery handle. Failures are logged only:
//!   an unacknowledged message simply becomes visible again later.
//!
//! Delivery is at-least-once; consumers must tolerate duplicates.

pub mod in_memory;
pub mod sqs;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use signer_core::{DeliveryAttempt, DeliveryHandle, SignerError, SigningJob};

pub use in_memory::InMemoryQueue;
pub use sqs::SqsQueue;

/// One received job, bound to the delivery that carried it.
#[derive(Debug)]
pub struct Delivery {
    pub job: SigningJob,
    pub handle: DeliveryHandle,
    pub attempt: DeliveryAttempt,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn receive(&self, wait: Duration) -> Option<Delivery>;

    async fn acknowledge(&self, handle: DeliveryHandle);
}

/// A message body that cannot be turned into a job.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("message has no body")]
    EmptyBody,
    #[error("malformed job message: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<CodecError> for SignerError {
    fn from(err: CodecError) -> Self {
        SignerError::invalid_job(err.to_string())
    }
}
