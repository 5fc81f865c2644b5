//! SQS job queue.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::Client as SqsClient;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};
use tracing::{debug, error, info, warn};

use signer_core::{DeliveryAttempt, DeliveryHandle, JobDefaults, JobMessage, SigningJob};

use super::{CodecError, Delivery, JobQueue};
use crate::retry::TransportRetry;

/// Longest long-poll SQS accepts.
pub const MAX_WAIT_SECONDS: u64 = 20;

/// Queue adapter over a single SQS queue URL.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: SqsClient,
    queue_url: String,
    defaults: JobDefaults,
    retry: TransportRetry,
}

impl SqsQueue {
    pub fn new(client: SqsClient, queue_url: impl Into<String>, defaults: JobDefaults) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            defaults,
            retry: TransportRetry::default(),
        }
    }

    pub fn with_retry(mut self, retry: TransportRetry) -> Self {
        self.retry = retry;
        self
    }

    async fn receive_one(&self, wait_seconds: i32) -> Result<Option<Message>, String> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(wait_seconds)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| DisplayErrorContext(&e).to_string())?;
        Ok(output.messages().first().cloned())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), String> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| DisplayErrorContext(&e).to_string())
    }
}

/// Decode an SQS body into a job, filling optional fields from `defaults`.
pub fn decode_body(body: Option<&str>, defaults: &JobDefaults) -> Result<SigningJob, CodecError> {
    let body = body.filter(|b| !b.trim().is_empty()).ok_or(CodecError::EmptyBody)?;
    let message = JobMessage::from_json(body)?;
    Ok(SigningJob::from_message(message, defaults))
}

fn receive_count(message: &Message) -> Option<&str> {
    message
        .attributes()
        .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
        .map(String::as_str)
}

#[async_trait]
impl JobQueue for SqsQueue {
    async fn receive(&self, wait: Duration) -> Option<Delivery> {
        let wait_seconds = wait.as_secs().min(MAX_WAIT_SECONDS) as i32;
        let message = match self
            .retry
            .run("sqs.receive_message", || self.receive_one(wait_seconds))
            .await
        {
            Ok(Some(message)) => message,
            Ok(None) => return None,
            Err(err) => {
                error!(error = %err, "receive failed after retries");
                return None;
            }
        };

        let Some(receipt_handle) = message.receipt_handle() else {
            warn!(message_id = ?message.message_id(), "message without receipt handle, skipping");
            return None;
        };

        match decode_body(message.body(), &self.defaults) {
            Ok(job) => {
                let attempt = DeliveryAttempt::from_receive_count(receive_count(&message));
                info!(run_id = %job.run_id, %attempt, files = job.files.len(), "received job");
                Some(Delivery {
                    job,
                    handle: DeliveryHandle::new(receipt_handle),
                    attempt,
                })
            }
            Err(err) => {
                // Never processable and carries no destination for a status.
                error!(message_id = ?message.message_id(), error = %err, "discarding undecodable message");
                self.acknowledge(DeliveryHandle::new(receipt_handle)).await;
                None
            }
        }
    }

    async fn acknowledge(&self, handle: DeliveryHandle) {
        let receipt_handle = handle.into_inner();
        match self
            .retry
            .run("sqs.delete_message", || self.delete(&receipt_handle))
            .await
        {
            Ok(()) => debug!("message deleted"),
            Err(err) => warn!(error = %err, "failed to delete message; it will be redelivered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> JobDefaults {
        JobDefaults {
            cert_identity: "Wordgate LLC".into(),
            timestamp_authority: "http://timestamp.sectigo.com".into(),
        }
    }

    #[test]
    fn decodes_body_with_defaults() {
        let job = decode_body(
            Some(r#"{"run_id":"42","s3_prefix":"p/42/","files":["a.exe"],"completed_prefix":"c/42/"}"#),
            &defaults(),
        )
        .unwrap();

        assert_eq!(job.run_id.as_str(), "42");
        assert_eq!(job.source_key("a.exe"), "p/42/a.exe");
        assert_eq!(job.cert_identity, "Wordgate LLC");
    }

    #[test]
    fn rejects_empty_and_garbled_bodies() {
        assert!(matches!(decode_body(None, &defaults()), Err(CodecError::EmptyBody)));
        assert!(matches!(decode_body(Some("  "), &defaults()), Err(CodecError::EmptyBody)));
        assert!(matches!(
            decode_body(Some("{not json"), &defaults()),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn reads_receive_count_attribute() {
        let message = Message::builder()
            .receipt_handle("rh")
            .attributes(MessageSystemAttributeName::ApproximateReceiveCount, "2")
            .build();
        assert_eq!(receive_count(&message), Some("2"));
        assert_eq!(
            DeliveryAttempt::from_receive_count(receive_count(&Message::builder().build())),
            DeliveryAttempt::FIRST
        );
    }
}
