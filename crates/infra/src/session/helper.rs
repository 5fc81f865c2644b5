//! Session driver backed by an external helper executable.
//!
//! The helper owns the UI automation of the authentication client and speaks a
//! one-line protocol:
//!
//! - `helper check` prints `connected`, `disconnected [<hint>]` or
//!   `error <message>`
//! - `helper login [--hint <hint>]` exits 0 once logged in; credentials are
//!   passed through `SIGNER_TOTP_URI` / `SIGNER_USERNAME`

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use signer_core::{Credentials, SessionProbe, SessionStatus, WindowHint};

use super::SessionDriver;

pub const CHECK_TIMEOUT: Duration = Duration::from_secs(30);
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct HelperSessionDriver {
    program: PathBuf,
    check_timeout: Duration,
    login_timeout: Duration,
}

impl HelperSessionDriver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            check_timeout: CHECK_TIMEOUT,
            login_timeout: LOGIN_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, check: Duration, login: Duration) -> Self {
        self.check_timeout = check;
        self.login_timeout = login;
        self
    }
}

/// Interpret the first line a `check` run printed.
pub fn parse_check_output(stdout: &str) -> SessionProbe {
    let line = stdout.lines().next().unwrap_or("").trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "connected" => SessionProbe::new(SessionStatus::Connected),
        "disconnected" if rest.is_empty() => SessionProbe::new(SessionStatus::Disconnected),
        "disconnected" => SessionProbe::new(SessionStatus::Disconnected).with_hint(WindowHint::new(rest)),
        "error" => {
            warn!(message = rest, "session helper reported an error");
            SessionProbe::new(SessionStatus::Error)
        }
        _ => SessionProbe::new(SessionStatus::Unknown),
    }
}

#[async_trait]
impl SessionDriver for HelperSessionDriver {
    async fn check(&mut self) -> SessionProbe {
        let child = Command::new(&self.program)
            .arg("check")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.check_timeout, child).await {
            Ok(Ok(output)) if output.status.success() => {
                let probe = parse_check_output(&String::from_utf8_lossy(&output.stdout));
                debug!(status = %probe.status, "session probe");
                probe
            }
            Ok(Ok(output)) => {
                warn!(
                    code = ?output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "session helper check failed"
                );
                SessionProbe::new(SessionStatus::Error)
            }
            Ok(Err(err)) => {
                warn!(program = %self.program.display(), error = %err, "cannot run session helper");
                SessionProbe::new(SessionStatus::Error)
            }
            Err(_) => {
                warn!(timeout = ?self.check_timeout, "session helper check timed out");
                SessionProbe::new(SessionStatus::Error)
            }
        }
    }

    async fn login(&mut self, credentials: &Credentials, hint: Option<&WindowHint>) -> bool {
        let mut command = Command::new(&self.program);
        command
            .arg("login")
            .env("SIGNER_TOTP_URI", &credentials.totp_uri)
            .env("SIGNER_USERNAME", &credentials.username)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(hint) = hint {
            command.arg("--hint").arg(hint.as_str());
        }

        match tokio::time::timeout(self.login_timeout, command.output()).await {
            Ok(Ok(output)) if output.status.success() => true,
            Ok(Ok(output)) => {
                warn!(
                    code = ?output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "session helper login failed"
                );
                false
            }
            Ok(Err(err)) => {
                warn!(program = %self.program.display(), error = %err, "cannot run session helper");
                false
            }
            Err(_) => {
                warn!(timeout = ?self.login_timeout, "session helper login timed out");
                false
            }
        }
    }
}
