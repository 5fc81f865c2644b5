//! Receive-process loop with the retry/terminal state machine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use signer_core::{
    AttemptId, Command, DeliveryAttempt, DeliveryHandle, FailureDisposition, JobOutcome,
    RetryPolicy, SignerError, SignerResult, SigningJob, StatusEvent,
};
use signer_events::{CommandReceiver, EventBus, publish_best_effort};

use crate::queue::{Delivery, JobQueue};
use crate::session::AuthSession;
use crate::signing::{SigningExecutor, SigningParams};
use crate::storage::ObjectStore;

/// Job processor configuration.
#[derive(Debug, Clone)]
pub struct JobProcessorConfig {
    /// Long-poll wait per receive.
    pub poll_wait: Duration,
    pub retry: RetryPolicy,
    /// Root of per-attempt scratch directories.
    pub temp_dir: PathBuf,
    /// Pause after an unexpected loop failure.
    pub error_pause: Duration,
}

impl Default for JobProcessorConfig {
    fn default() -> Self {
        Self {
            poll_wait: Duration::from_secs(20),
            retry: RetryPolicy::default(),
            temp_dir: std::env::temp_dir().join("signer"),
            error_pause: Duration::from_secs(5),
        }
    }
}

/// How one delivery was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobDisposition {
    /// Status written, delivery acknowledged.
    Completed,
    /// Attempt failed with budget left; delivery left for redelivery.
    RetryPending { error: String },
    /// Budget exhausted; failure status written, delivery acknowledged.
    Failed { error: String },
    /// Budget exhausted but the failure status could not be written; the
    /// delivery is left unacknowledged so the terminal path runs again.
    FailedUnreported { error: String },
}

impl JobDisposition {
    pub fn acknowledged(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

/// Capabilities the processor drives.
pub struct JobProcessor<B> {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ObjectStore>,
    executor: Arc<dyn SigningExecutor>,
    session: Arc<AuthSession>,
    events: B,
    config: JobProcessorConfig,
}

impl<B> JobProcessor<B>
where
    B: EventBus<StatusEvent> + 'static,
{
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn ObjectStore>,
        executor: Arc<dyn SigningExecutor>,
        session: Arc<AuthSession>,
        events: B,
        config: JobProcessorConfig,
    ) -> Self {
        Self {
            queue,
            store,
            executor,
            session,
            events,
            config,
        }
    }

    pub fn config(&self) -> &JobProcessorConfig {
        &self.config
    }

    /// The session preflight runs against. The keeper must share it.
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// Drive one delivery through download/sign/verify/upload and resolve it.
    ///
    /// Never returns an error: every failure is classified by delivery
    /// attempt. Status is always written before the acknowledgement, and the
    /// attempt's scratch directory is removed whatever the outcome.
    pub async fn process(&self, delivery: Delivery) -> JobDisposition {
        let attempt_id = AttemptId::new();
        let span = info_span!(
            "job",
            run_id = %delivery.job.run_id,
            attempt = %delivery.attempt,
            max_attempts = self.config.retry.max_attempts,
            attempt_id = %attempt_id,
        );
        self.process_inner(delivery, attempt_id).instrument(span).await
    }

    async fn process_inner(&self, delivery: Delivery, attempt_id: AttemptId) -> JobDisposition {
        let Delivery {
            job,
            handle,
            attempt,
        } = delivery;

        info!(files = ?job.files, "job started");
        publish_best_effort(
            &self.events,
            StatusEvent::JobStarted {
                run_id: job.run_id.clone(),
                files: job.files.clone(),
            },
        );

        let workdir = self.config.temp_dir.join(attempt_id.to_string());
        let mut signed = Vec::with_capacity(job.files.len());
        let result = self.run_attempt(&job, &workdir, &mut signed).await;

        let disposition = match result {
            Ok(()) => {
                let outcome = JobOutcome::succeeded(job.run_id.clone(), signed.clone(), attempt);
                match self.store.put_status(&job.destination_prefix, &outcome).await {
                    Ok(()) => {
                        self.queue.acknowledge(handle).await;
                        info!(files = signed.len(), "job completed");
                        JobDisposition::Completed
                    }
                    Err(err) => self.resolve_failure(&job, handle, attempt, &signed, err).await,
                }
            }
            Err(err) => self.resolve_failure(&job, handle, attempt, &signed, err).await,
        };

        remove_workdir(&workdir).await;

        let error = match &disposition {
            JobDisposition::Completed => None,
            JobDisposition::RetryPending { error }
            | JobDisposition::Failed { error }
            | JobDisposition::FailedUnreported { error } => Some(error.clone()),
        };
        if let JobDisposition::Failed { error } = &disposition {
            publish_best_effort(
                &self.events,
                StatusEvent::error(format!("job {} failed: {error}", job.run_id)),
            );
        }
        publish_best_effort(
            &self.events,
            StatusEvent::JobCompleted {
                run_id: job.run_id.clone(),
                success: disposition == JobDisposition::Completed,
                files: signed,
                error,
            },
        );

        disposition
    }

    /// Preflight then each file in order; stops at the first failure.
    async fn run_attempt(
        &self,
        job: &SigningJob,
        workdir: &Path,
        signed: &mut Vec<String>,
    ) -> SignerResult<()> {
        job.validate()?;
        self.session.ensure_connected("preflight").await?;

        let params = SigningParams::for_job(job);
        for file in &job.files {
            let local = workdir.join(file);
            debug!(file = %file, "processing file");

            self.store.download(&job.source_key(file), &local).await?;
            self.executor.sign(&local, &params).await?;
            self.executor.verify(&local).await?;
            self.store.upload(&local, &job.destination_key(file)).await?;

            info!(file = %file, key = %job.destination_key(file), "file signed and uploaded");
            signed.push(file.clone());
        }
        Ok(())
    }

    async fn resolve_failure(
        &self,
        job: &SigningJob,
        handle: DeliveryHandle,
        attempt: DeliveryAttempt,
        signed: &[String],
        err: SignerError,
    ) -> JobDisposition {
        let error = err.to_string();

        match self.config.retry.classify(attempt) {
            FailureDisposition::Transient => {
                // Dropping the handle leaves the message to reappear after
                // its visibility timeout.
                warn!(error = %error, signed = signed.len(), "attempt failed, awaiting redelivery");
                JobDisposition::RetryPending { error }
            }
            FailureDisposition::Terminal => {
                let outcome =
                    JobOutcome::failed(job.run_id.clone(), signed.to_vec(), error.clone(), attempt);
                match self.store.put_status(&job.destination_prefix, &outcome).await {
                    Ok(()) => {
                        self.queue.acknowledge(handle).await;
                        error!(error = %error, "job failed permanently");
                        JobDisposition::Failed { error }
                    }
                    Err(status_err) => {
                        error!(
                            error = %error,
                            status_error = %status_err,
                            "could not record terminal failure, leaving message for redelivery"
                        );
                        JobDisposition::FailedUnreported { error }
                    }
                }
            }
        }
    }

    /// Receive and process until `cancel` fires.
    ///
    /// Cancellation interrupts only the idle long-poll; a received delivery
    /// is always resolved before the loop exits. `force_login` commands are
    /// drained between polls and run the preflight sequence proactively.
    pub async fn run(self, commands: CommandReceiver, cancel: CancellationToken) {
        info!(poll_wait_secs = self.config.poll_wait.as_secs(), "job processor started");

        loop {
            for command in commands.drain() {
                match command {
                    Command::ForceLogin => {
                        info!("force login requested");
                        if let Err(err) = self.session.ensure_connected("force_login").await {
                            publish_best_effort(&self.events, StatusEvent::error(err.to_string()));
                        }
                    }
                }
            }

            // The receive runs in its own task so a panicking adapter costs
            // one iteration, not the loop.
            let queue = Arc::clone(&self.queue);
            let wait = self.config.poll_wait;
            let mut receive = tokio::spawn(async move { queue.receive(wait).await });

            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    // A receive that already returned has taken the message
                    // off the queue; finish it rather than drop it.
                    receive.abort();
                    if let Ok(Some(delivery)) = receive.await {
                        info!(run_id = %delivery.job.run_id, "delivery received during shutdown");
                        self.process(delivery).await;
                    }
                    break;
                }
                joined = &mut receive => joined,
            };

            match received {
                Ok(Some(delivery)) => {
                    self.process(delivery).await;
                }
                Ok(None) => {}
                Err(err) => {
                    error!(error = %err, "job loop error");
                    publish_best_effort(&self.events, StatusEvent::error(format!("receive failed: {err}")));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.error_pause) => {}
                    }
                }
            }
        }

        info!("job processor stopped");
    }

    /// Spawn [`JobProcessor::run`] on the current runtime.
    pub fn spawn(self, commands: CommandReceiver, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(commands, cancel))
    }
}

async fn remove_workdir(workdir: &Path) {
    match tokio::fs::remove_dir_all(workdir).await {
        Ok(()) => debug!(dir = %workdir.display(), "scratch directory removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(dir = %workdir.display(), error = %err, "failed to remove scratch directory"),
    }
}
