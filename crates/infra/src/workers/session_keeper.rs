//! Session keep-alive loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::{AuthSession, SessionStats};

/// Keeper configuration.
#[derive(Debug, Clone)]
pub struct SessionKeeper {
    pub interval: Duration,
}

impl Default for SessionKeeper {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
        }
    }
}

/// Handle for the running keeper (trigger + shutdown).
#[derive(Debug)]
pub struct SessionKeeperHandle {
    trigger: mpsc::Sender<()>,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
    session: Arc<AuthSession>,
}

impl SessionKeeperHandle {
    /// Request an out-of-schedule check.
    ///
    /// Triggers are coalesced: if one is already pending this is a no-op.
    pub fn force_check(&self) {
        let _ = self.trigger.try_send(());
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    /// Stop the loop and wait for it. A tick already running is finished
    /// first, so the session lock is never abandoned mid-sequence.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                warn!(error = %err, "session keeper task ended abnormally");
            }
        }
    }
}

impl SessionKeeper {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Spawn the keeper on the current runtime.
    ///
    /// - Schedule: one check immediately, then every `interval`
    /// - Trigger: `handle.force_check()`
    /// - Failures: logged and counted; the next tick tries again
    pub fn spawn(&self, session: Arc<AuthSession>, cancel: CancellationToken) -> SessionKeeperHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);
        let join = tokio::spawn(keeper_loop(
            self.interval,
            Arc::clone(&session),
            trigger_rx,
            cancel.clone(),
        ));

        SessionKeeperHandle {
            trigger: trigger_tx,
            cancel,
            join: Some(join),
            session,
        }
    }
}

async fn keeper_loop(
    period: Duration,
    session: Arc<AuthSession>,
    mut trigger_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    info!(interval_secs = period.as_secs(), "session keeper started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
            Some(()) = trigger_rx.recv() => debug!("forced session check"),
        }

        // Not raced against `cancel`: a check/login runs to completion.
        if session.ensure_connected("keeper").await.is_ok() {
            debug!("session alive");
        }
    }

    let stats = session.stats();
    info!(
        checks = stats.check_count,
        logins = stats.login_count,
        errors = stats.error_count,
        "session keeper stopped"
    );
}
