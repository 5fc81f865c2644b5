//! Configuration loading and validation.
//!
//! Settings come from the process environment. Loading is fail-closed: every
//! missing required key is collected and reported in one error so an operator
//! can fix them all at once.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use signer_core::{Credentials, JobDefaults, RetryPolicy, SignerError};

pub const DEFAULT_REGION: &str = "ap-northeast-1";
pub const DEFAULT_CERT_NAME: &str = "Wordgate LLC";
pub const DEFAULT_TIMESTAMP_URL: &str = "http://timestamp.sectigo.com";
pub const DEFAULT_SIGN_DESCRIPTION: &str = "Kaitu Desktop";
pub const DEFAULT_HELPER_PROGRAM: &str = "simplisign-helper";
pub const DEFAULT_POLL_WAIT_SECS: u64 = 20;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// Long-poll ceiling imposed by the queue service.
pub const MAX_POLL_WAIT_SECS: u64 = 20;

const REQUIRED_KEYS: [&str; 6] = [
    "SIMPLISIGN_TOTP_URI",
    "SIMPLISIGN_USERNAME",
    "SQS_QUEUE_URL",
    "S3_BUCKET",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required config: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl From<ConfigError> for SignerError {
    fn from(err: ConfigError) -> Self {
        SignerError::configuration(err.to_string())
    }
}

/// Validated process configuration.
#[derive(Clone)]
pub struct SignerConfig {
    pub credentials: Credentials,
    /// Executable that automates the authentication client.
    pub helper_program: PathBuf,

    pub queue_url: String,
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,

    pub cert_identity: String,
    pub timestamp_authority: String,
    pub sign_description: String,
    /// Explicit signtool path; `None` means discover from the Windows SDK.
    pub signtool_path: Option<PathBuf>,

    pub poll_wait: Duration,
    pub check_interval: Duration,
    pub retry: RetryPolicy,
    /// Root for per-job scratch directories.
    pub temp_dir: PathBuf,
}

impl core::fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SignerConfig")
            .field("credentials", &self.credentials)
            .field("helper_program", &self.helper_program)
            .field("queue_url", &self.queue_url)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("cert_identity", &self.cert_identity)
            .field("timestamp_authority", &self.timestamp_authority)
            .field("sign_description", &self.sign_description)
            .field("signtool_path", &self.signtool_path)
            .field("poll_wait", &self.poll_wait)
            .field("check_interval", &self.check_interval)
            .field("retry", &self.retry)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

impl SignerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|&&key| get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        let required = |key: &str| get(key).unwrap_or_default();

        let totp_uri = required("SIMPLISIGN_TOTP_URI");
        validate_otpauth_uri(&totp_uri)?;

        let queue_url = required("SQS_QUEUE_URL");
        validate_http_url("SQS_QUEUE_URL", &queue_url)?;

        let timestamp_authority =
            get("TIMESTAMP_URL").unwrap_or_else(|| DEFAULT_TIMESTAMP_URL.to_string());
        validate_http_url("TIMESTAMP_URL", &timestamp_authority)?;

        let poll_wait_secs = parse_or(
            "SQS_POLL_WAIT_SECONDS",
            get("SQS_POLL_WAIT_SECONDS"),
            DEFAULT_POLL_WAIT_SECS,
        )?
        .min(MAX_POLL_WAIT_SECS);

        let check_interval_secs = parse_or(
            "SIMPLISIGN_CHECK_INTERVAL",
            get("SIMPLISIGN_CHECK_INTERVAL"),
            DEFAULT_CHECK_INTERVAL_SECS,
        )?;
        if check_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "SIMPLISIGN_CHECK_INTERVAL".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }

        let max_attempts: u32 = parse_or("SIGNER_MAX_ATTEMPTS", get("SIGNER_MAX_ATTEMPTS"), 3)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "SIGNER_MAX_ATTEMPTS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            credentials: Credentials {
                totp_uri,
                username: required("SIMPLISIGN_USERNAME"),
            },
            helper_program: get("SIMPLISIGN_HELPER")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HELPER_PROGRAM)),
            queue_url,
            bucket: required("S3_BUCKET"),
            region: get("AWS_DEFAULT_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            access_key_id: required("AWS_ACCESS_KEY_ID"),
            secret_access_key: required("AWS_SECRET_ACCESS_KEY"),
            cert_identity: get("CERT_NAME").unwrap_or_else(|| DEFAULT_CERT_NAME.to_string()),
            timestamp_authority,
            sign_description: get("SIGN_DESCRIPTION")
                .unwrap_or_else(|| DEFAULT_SIGN_DESCRIPTION.to_string()),
            signtool_path: get("SIGNTOOL_PATH").map(PathBuf::from),
            poll_wait: Duration::from_secs(poll_wait_secs),
            check_interval: Duration::from_secs(check_interval_secs),
            retry: RetryPolicy::new(max_attempts),
            temp_dir: get("SIGN_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("signer")),
        })
    }

    /// Fallbacks for optional job-message fields.
    pub fn job_defaults(&self) -> JobDefaults {
        JobDefaults {
            cert_identity: self.cert_identity.clone(),
            timestamp_authority: self.timestamp_authority.clone(),
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("{raw:?}: {e}"),
        }),
    }
}

fn validate_otpauth_uri(uri: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: "SIMPLISIGN_TOTP_URI".to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(uri).map_err(|_| invalid("expected an otpauth:// URI"))?;
    if parsed.scheme() != "otpauth" {
        return Err(invalid("expected an otpauth:// URI"));
    }
    let has_secret = parsed
        .query_pairs()
        .any(|(k, v)| k == "secret" && !v.is_empty());
    if !has_secret {
        return Err(invalid("missing 'secret' parameter"));
    }
    Ok(())
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("unsupported scheme {:?}", url.scheme()),
        }),
        Err(e) => Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}
