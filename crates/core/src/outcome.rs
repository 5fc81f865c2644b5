//! Job outcomes and the status object written next to signed artifacts.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::id::RunId;
use crate::job::DeliveryAttempt;

/// Name of the status object under a job's destination prefix.
pub const STATUS_OBJECT_NAME: &str = "status.json";

/// Result of one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub run_id: RunId,
    pub success: bool,
    /// Prefix of the job's files that were fully signed and uploaded.
    pub signed_files: Vec<String>,
    pub error: Option<String>,
    pub attempts: DeliveryAttempt,
    pub timestamp: DateTime<Utc>,
}

impl JobOutcome {
    pub fn succeeded(run_id: RunId, signed_files: Vec<String>, attempts: DeliveryAttempt) -> Self {
        Self {
            run_id,
            success: true,
            signed_files,
            error: None,
            attempts,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(
        run_id: RunId,
        signed_files: Vec<String>,
        error: impl Into<String>,
        attempts: DeliveryAttempt,
    ) -> Self {
        Self {
            run_id,
            success: false,
            signed_files,
            error: Some(error.into()),
            attempts,
            timestamp: Utc::now(),
        }
    }

    /// Project onto the persisted status schema.
    ///
    /// Success records list the signed files; failure records carry the error
    /// and attempt count instead.
    pub fn to_status_record(&self) -> StatusRecord {
        let signed_at = self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        if self.success {
            StatusRecord {
                success: true,
                signed_at,
                run_id: self.run_id.clone(),
                verified: Some(true),
                files: Some(self.signed_files.clone()),
                error: None,
                attempts: None,
            }
        } else {
            StatusRecord {
                success: false,
                signed_at,
                run_id: self.run_id.clone(),
                verified: None,
                files: None,
                error: Some(self.error.clone().unwrap_or_default()),
                attempts: Some(self.attempts.get()),
            }
        }
    }
}

/// Persisted status object (`<completed_prefix>status.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub success: bool,
    /// ISO-8601 UTC.
    pub signed_at: String,
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl StatusRecord {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}
