//! Outward status events and inbound commands.

use serde::{Deserialize, Serialize};

use crate::id::RunId;

/// Coarse status broadcast to the presentation layer.
///
/// Best-effort: consumers must tolerate loss and reordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    Ready,
    JobStarted {
        run_id: RunId,
        files: Vec<String>,
    },
    JobCompleted {
        run_id: RunId,
        success: bool,
        files: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Error {
        message: String,
    },
}

impl StatusEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Commands accepted from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Run the check-then-login sequence now instead of waiting for the keeper.
    ForceLogin,
}
