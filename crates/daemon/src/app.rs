//! Builds the concrete adapters and starts the orchestrator.

use std::sync::Arc;

use tracing::info;

use signer_core::StatusEvent;
use signer_events::InMemoryEventBus;
use signer_infra::queue::SqsQueue;
use signer_infra::session::HelperSessionDriver;
use signer_infra::signing::SigntoolExecutor;
use signer_infra::storage::S3ObjectStore;
use signer_infra::{
    AuthSession, JobProcessor, JobProcessorConfig, Orchestrator, OrchestratorHandle,
    SessionKeeper, SignerConfig,
};

use crate::aws;

pub type Events = Arc<InMemoryEventBus<StatusEvent>>;

pub fn processor_config(config: &SignerConfig) -> JobProcessorConfig {
    JobProcessorConfig {
        poll_wait: config.poll_wait,
        retry: config.retry,
        temp_dir: config.temp_dir.clone(),
        ..JobProcessorConfig::default()
    }
}

pub async fn start(config: &SignerConfig, events: Events) -> OrchestratorHandle {
    let sdk = aws::load_sdk_config(config).await;

    let queue = SqsQueue::new(aws::sqs_client(&sdk), &config.queue_url, config.job_defaults());
    let store = S3ObjectStore::new(aws::s3_client(&sdk), &config.bucket);
    let executor = SigntoolExecutor::new(config.signtool_path.clone(), &config.sign_description);
    let session = Arc::new(AuthSession::new(
        Box::new(HelperSessionDriver::new(&config.helper_program)),
        config.credentials.clone(),
    ));

    info!(
        queue_url = %config.queue_url,
        bucket = %config.bucket,
        region = %config.region,
        max_attempts = config.retry.max_attempts,
        "adapters ready"
    );

    let processor = JobProcessor::new(
        Arc::new(queue),
        Arc::new(store),
        Arc::new(executor),
        session,
        Arc::clone(&events),
        processor_config(config),
    );
    Orchestrator::start(SessionKeeper::new(config.check_interval), processor, events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn processor_config_follows_settings() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SIMPLISIGN_TOTP_URI", "otpauth://totp/Certum:me?secret=JBSWY3DPEHPK3PXP"),
            ("SIMPLISIGN_USERNAME", "me@example.com"),
            ("SQS_QUEUE_URL", "https://sqs.ap-northeast-1.amazonaws.com/1/signing"),
            ("S3_BUCKET", "builds"),
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("SQS_POLL_WAIT_SECONDS", "5"),
            ("SIGNER_MAX_ATTEMPTS", "4"),
            ("SIGN_TEMP_DIR", "/var/tmp/signer"),
        ]);
        let config = SignerConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();

        let processor = processor_config(&config);
        assert_eq!(processor.poll_wait, Duration::from_secs(5));
        assert_eq!(processor.retry.max_attempts, 4);
        assert_eq!(processor.temp_dir, std::path::PathBuf::from("/var/tmp/signer"));
        assert_eq!(processor.error_pause, Duration::from_secs(5));
    }
}
