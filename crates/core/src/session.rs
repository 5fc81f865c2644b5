//! Authentication session vocabulary shared by the keeper and the job path.

use serde::{Deserialize, Serialize};

/// Observed state of the external authentication session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Unknown,
    Connected,
    Disconnected,
    LoginInProgress,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Unknown => "unknown",
            SessionStatus::Connected => "connected",
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::LoginInProgress => "login_in_progress",
            SessionStatus::Error => "error",
        }
    }
}

impl core::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the session guard is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Checking,
    LoggingIn,
}

/// Opaque locator for the authentication client's login surface.
///
/// Returned by a probe and handed to the following login so the driver can
/// skip re-discovering it. Never cached between probes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHint(String);

impl WindowHint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of a cheap session probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProbe {
    pub status: SessionStatus,
    pub hint: Option<WindowHint>,
}

impl SessionProbe {
    pub fn new(status: SessionStatus) -> Self {
        Self { status, hint: None }
    }

    pub fn with_hint(mut self, hint: WindowHint) -> Self {
        self.hint = Some(hint);
        self
    }
}

/// Login material for the authentication client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// `otpauth://` URI the one-time code is derived from.
    pub totp_uri: String,
    pub username: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("totp_uri", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_secret() {
        let creds = Credentials {
            totp_uri: "otpauth://totp/Certum:me?secret=ABCDEF".to_string(),
            username: "me".to_string(),
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("ABCDEF"));
        assert!(rendered.contains("me"));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::LoginInProgress).unwrap(),
            "\"login_in_progress\""
        );
    }
}
