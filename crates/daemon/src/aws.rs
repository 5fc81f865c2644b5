//! AWS client construction from validated configuration.

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::config::Credentials;

use signer_infra::SignerConfig;

/// Attempts the S3 client makes per call (SDK standard retry mode).
pub const S3_MAX_ATTEMPTS: u32 = 3;

/// Shared SDK config with the configured region and static keys.
pub async fn load_sdk_config(config: &SignerConfig) -> SdkConfig {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "signer-config",
    );
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials)
        .load()
        .await
}

pub fn s3_client(sdk: &SdkConfig) -> aws_sdk_s3::Client {
    let conf = aws_sdk_s3::config::Builder::from(sdk)
        .retry_config(RetryConfig::standard().with_max_attempts(S3_MAX_ATTEMPTS))
        .build();
    aws_sdk_s3::Client::from_conf(conf)
}

/// SQS calls are retried by the queue adapter itself, so SDK retries are off.
pub fn sqs_client(sdk: &SdkConfig) -> aws_sdk_sqs::Client {
    let conf = aws_sdk_sqs::config::Builder::from(sdk)
        .retry_config(RetryConfig::disabled())
        .build();
    aws_sdk_sqs::Client::from_conf(conf)
}
