//! Authentication session capability and the lock that serialises it.
//!
//! The driver is owned by [`AuthSession`] behind a single async mutex, so the
//! only way to reach `check()`/`login()` is through the guarded sequence in
//! [`AuthSession::ensure_connected`]. The keeper and the job preflight both go
//! through it; neither ever holds the lock across queue or storage I/O.

pub mod helper;

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use signer_core::{
    Credentials, SessionPhase, SessionProbe, SessionStatus, SignerError, SignerResult, WindowHint,
};

pub use helper::HelperSessionDriver;

/// Drives the third-party authentication client.
///
/// Methods take `&mut self`: a driver is never entered by two callers at once.
#[async_trait]
pub trait SessionDriver: Send {
    /// Cheap probe of the current session.
    async fn check(&mut self) -> SessionProbe;

    /// Expensive login; `hint` is whatever the preceding probe returned.
    async fn login(&mut self, credentials: &Credentials, hint: Option<&WindowHint>) -> bool;
}

/// Counters and timestamps kept alongside the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub status: SessionStatus,
    pub phase: SessionPhase,
    pub last_check: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub check_count: u64,
    pub login_count: u64,
    pub error_count: u64,
}

/// The shared lock plus the driver it guards.
pub struct AuthSession {
    driver: Mutex<Box<dyn SessionDriver>>,
    credentials: Credentials,
    stats: RwLock<SessionStats>,
}

impl core::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthSession")
            .field("credentials", &self.credentials)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl AuthSession {
    pub fn new(driver: Box<dyn SessionDriver>, credentials: Credentials) -> Self {
        Self {
            driver: Mutex::new(driver),
            credentials,
            stats: RwLock::new(SessionStats::default()),
        }
    }

    /// Snapshot of the bookkeeping; never waits on the session lock.
    pub fn stats(&self) -> SessionStats {
        self.stats.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn status(&self) -> SessionStatus {
        self.stats().status
    }

    fn record(&self, f: impl FnOnce(&mut SessionStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }

    /// Check the session and log in if it is disconnected.
    ///
    /// Holds the lock for the whole check-then-login sequence and releases it
    /// before returning. `caller` only labels the log lines.
    pub async fn ensure_connected(&self, caller: &'static str) -> SignerResult<()> {
        let mut driver = self.driver.lock().await;

        self.record(|s| s.phase = SessionPhase::Checking);
        let probe = driver.check().await;
        self.record(|s| {
            s.status = probe.status;
            s.last_check = Some(Utc::now());
            s.check_count += 1;
        });

        let result = match probe.status {
            SessionStatus::Connected => Ok(()),
            SessionStatus::Disconnected => {
                info!(caller, "session disconnected, logging in");
                self.record(|s| {
                    s.phase = SessionPhase::LoggingIn;
                    s.status = SessionStatus::LoginInProgress;
                });
                if driver.login(&self.credentials, probe.hint.as_ref()).await {
                    info!(caller, "login succeeded");
                    self.record(|s| {
                        s.status = SessionStatus::Connected;
                        s.last_login = Some(Utc::now());
                        s.login_count += 1;
                    });
                    Ok(())
                } else {
                    self.record(|s| {
                        s.status = SessionStatus::Disconnected;
                        s.error_count += 1;
                    });
                    Err(SignerError::authentication("login failed"))
                }
            }
            other => {
                self.record(|s| s.error_count += 1);
                Err(SignerError::authentication(format!(
                    "session status {other}; will retry next interval"
                )))
            }
        };

        self.record(|s| s.phase = SessionPhase::Idle);
        drop(driver);

        if let Err(err) = &result {
            warn!(caller, error = %err, "session not usable");
        }
        result
    }
}
