//! Signing jobs as received from the queue.

use serde::{Deserialize, Serialize};

use crate::error::{SignerError, SignerResult};
use crate::id::RunId;
use crate::outcome::STATUS_OBJECT_NAME;

/// Wire format of a job message body.
///
/// Every field is optional on the wire; [`SigningJob::from_message`] fills
/// the gaps from process-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_prefix: Option<String>,
}

impl JobMessage {
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Process-wide fallbacks for optional message fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefaults {
    pub cert_identity: String,
    pub timestamp_authority: String,
}

/// A signing job. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningJob {
    pub run_id: RunId,
    pub source_prefix: String,
    /// Processed strictly in this order.
    pub files: Vec<String>,
    pub cert_identity: String,
    pub timestamp_authority: String,
    pub destination_prefix: String,
}

impl SigningJob {
    pub fn from_message(message: JobMessage, defaults: &JobDefaults) -> Self {
        Self {
            run_id: message.run_id.map(RunId::new).unwrap_or_else(RunId::unknown),
            source_prefix: message.s3_prefix.unwrap_or_default(),
            files: message.files.unwrap_or_default(),
            cert_identity: message
                .cert_name
                .unwrap_or_else(|| defaults.cert_identity.clone()),
            timestamp_authority: message
                .timestamp_url
                .unwrap_or_else(|| defaults.timestamp_authority.clone()),
            destination_prefix: message.completed_prefix.unwrap_or_default(),
        }
    }

    /// Re-encode as a wire message (all fields explicit).
    pub fn to_message(&self) -> JobMessage {
        JobMessage {
            run_id: Some(self.run_id.as_str().to_string()),
            s3_prefix: Some(self.source_prefix.clone()),
            files: Some(self.files.clone()),
            cert_name: Some(self.cert_identity.clone()),
            timestamp_url: Some(self.timestamp_authority.clone()),
            completed_prefix: Some(self.destination_prefix.clone()),
        }
    }

    pub fn source_key(&self, file: &str) -> String {
        format!("{}{}", self.source_prefix, file)
    }

    pub fn destination_key(&self, file: &str) -> String {
        format!("{}{}", self.destination_prefix, file)
    }

    pub fn status_key(&self) -> String {
        format!("{}{}", self.destination_prefix, STATUS_OBJECT_NAME)
    }

    /// Reject file names that would escape the job's local scratch directory.
    ///
    /// The run_id is opaque and never touches the filesystem, so it is not checked.
    pub fn validate(&self) -> SignerResult<()> {
        for file in &self.files {
            check_path_component("file", file)?;
        }
        Ok(())
    }
}

fn check_path_component(what: &str, value: &str) -> SignerResult<()> {
    if value.is_empty() {
        return Err(SignerError::invalid_job(format!("empty {what} name")));
    }
    if value == "." || value == ".." {
        return Err(SignerError::invalid_job(format!("{what} {value:?} is not a file name")));
    }
    if value.contains(['/', '\\', ':', '\0']) {
        return Err(SignerError::invalid_job(format!(
            "{what} {value:?} must not contain path separators"
        )));
    }
    Ok(())
}

/// Token bound to one queue delivery.
///
/// Deliberately neither `Clone` nor `Copy`: acknowledging consumes it, so a
/// handle can be used at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct DeliveryHandle(String);

impl DeliveryHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Approximate redelivery count reported by the queue (always >= 1).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryAttempt(u32);

impl DeliveryAttempt {
    pub const FIRST: DeliveryAttempt = DeliveryAttempt(1);

    pub fn new(count: u32) -> Self {
        Self(count.max(1))
    }

    /// Parse the queue's receive-count attribute; absent or garbled means first delivery.
    pub fn from_receive_count(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse::<u32>().ok())
            .map(Self::new)
            .unwrap_or(Self::FIRST)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for DeliveryAttempt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> JobDefaults {
        JobDefaults {
            cert_identity: "Wordgate LLC".to_string(),
            timestamp_authority: "http://timestamp.sectigo.com".to_string(),
        }
    }

    #[test]
    fn decodes_full_message() {
        let body = r#"{
            "run_id": "12345678",
            "s3_prefix": "kaitu/signing/pending/12345678/",
            "files": ["Kaitu_0.4.0_x64-setup.exe", "helper.dll"],
            "cert_name": "Other Corp",
            "timestamp_url": "http://ts.example.com",
            "completed_prefix": "kaitu/signing/completed/12345678/"
        }"#;

        let job = SigningJob::from_message(JobMessage::from_json(body).unwrap(), &defaults());

        assert_eq!(job.run_id.as_str(), "12345678");
        assert_eq!(job.files, vec!["Kaitu_0.4.0_x64-setup.exe", "helper.dll"]);
        assert_eq!(job.cert_identity, "Other Corp");
        assert_eq!(job.timestamp_authority, "http://ts.example.com");
        assert_eq!(
            job.source_key("helper.dll"),
            "kaitu/signing/pending/12345678/helper.dll"
        );
        assert_eq!(
            job.status_key(),
            "kaitu/signing/completed/12345678/status.json"
        );
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let job = SigningJob::from_message(
            JobMessage::from_json(r#"{"run_id": "7", "files": ["a.exe"]}"#).unwrap(),
            &defaults(),
        );

        assert_eq!(job.cert_identity, "Wordgate LLC");
        assert_eq!(job.timestamp_authority, "http://timestamp.sectigo.com");
        assert_eq!(job.source_prefix, "");
        assert_eq!(job.destination_prefix, "");
    }

    #[test]
    fn missing_run_id_is_unknown() {
        let job = SigningJob::from_message(JobMessage::default(), &defaults());
        assert_eq!(job.run_id.as_str(), RunId::UNKNOWN);
        assert!(job.files.is_empty());
    }

    #[test]
    fn non_object_body_fails_to_decode() {
        assert!(JobMessage::from_json("not json").is_err());
        assert!(JobMessage::from_json(r#"{"files": "a.exe"}"#).is_err());
    }

    #[test]
    fn validate_rejects_traversal() {
        let mut job = SigningJob::from_message(JobMessage::default(), &defaults());
        job.files = vec!["ok.exe".into(), "../escape.exe".into()];
        assert!(matches!(job.validate(), Err(SignerError::InvalidJob(_))));

        job.files = vec!["..".into()];
        assert!(job.validate().is_err());

        job.files = vec![r"C:\abs.exe".into()];
        assert!(job.validate().is_err());

        job.files = vec!["".into()];
        assert!(job.validate().is_err());

        job.files = vec!["a.exe".into(), "b.msi".into()];
        assert!(job.validate().is_ok());
    }

    #[test]
    fn validate_accepts_any_run_id() {
        let mut job = SigningJob::from_message(JobMessage::default(), &defaults());
        job.files = vec!["a.exe".into()];
        for run_id in ["release:42", "ci/build/42", r#"win""#, ""] {
            job.run_id = RunId::new(run_id);
            assert!(job.validate().is_ok(), "run_id {run_id:?}");
        }
    }

    #[test]
    fn delivery_attempt_parsing() {
        assert_eq!(DeliveryAttempt::from_receive_count(Some("3")).get(), 3);
        assert_eq!(DeliveryAttempt::from_receive_count(Some(" 2 ")).get(), 2);
        assert_eq!(DeliveryAttempt::from_receive_count(Some("0")).get(), 1);
        assert_eq!(DeliveryAttempt::from_receive_count(Some("x")).get(), 1);
        assert_eq!(DeliveryAttempt::from_receive_count(None).get(), 1);
    }
}
