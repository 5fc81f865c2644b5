//! Owns the keeper and the processor and wires their channels.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use signer_core::{Command, StatusEvent};
use signer_events::{CommandError, CommandSender, EventBus, command_channel, publish_best_effort};

use super::job_processor::JobProcessor;
use super::session_keeper::{SessionKeeper, SessionKeeperHandle};
use crate::session::SessionStats;

/// Pending commands the processor buffers between polls.
pub const COMMAND_CAPACITY: usize = 8;

#[derive(Debug)]
pub struct Orchestrator;

impl Orchestrator {
    /// Start both units and publish `Ready`.
    ///
    /// The keeper and the processor share only the session (and its lock)
    /// and the outward status bus. The keeper is handed the processor's own
    /// session, so the two can never drive different locks.
    pub fn start<B>(keeper: SessionKeeper, processor: JobProcessor<B>, events: B) -> OrchestratorHandle
    where
        B: EventBus<StatusEvent> + 'static,
    {
        let cancel = CancellationToken::new();
        let (commands, command_rx) = command_channel(COMMAND_CAPACITY);

        let session = Arc::clone(processor.session());
        let keeper = keeper.spawn(session, cancel.child_token());
        let processor = processor.spawn(command_rx, cancel.child_token());

        info!("orchestrator started");
        publish_best_effort(&events, StatusEvent::Ready);

        OrchestratorHandle {
            commands,
            cancel,
            keeper: Some(keeper),
            processor: Some(processor),
        }
    }
}

/// Control surface for a running orchestrator.
#[derive(Debug)]
pub struct OrchestratorHandle {
    commands: CommandSender,
    cancel: CancellationToken,
    keeper: Option<SessionKeeperHandle>,
    processor: Option<JoinHandle<()>>,
}

impl OrchestratorHandle {
    /// Queue a proactive check-then-login, run between processing iterations.
    pub fn force_login(&self) -> Result<(), CommandError> {
        self.commands.send(Command::ForceLogin)
    }

    /// Sender for the inbound command channel (presentation layer side).
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    pub fn session_stats(&self) -> Option<SessionStats> {
        self.keeper.as_ref().map(SessionKeeperHandle::stats)
    }

    /// Token that fires once shutdown has been requested.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop both units and wait for them.
    ///
    /// An in-flight job is resolved (acknowledged or left for redelivery)
    /// before this returns.
    pub async fn stop(mut self) {
        info!("orchestrator stopping");
        self.cancel.cancel();

        if let Some(processor) = self.processor.take() {
            if let Err(err) = processor.await {
                warn!(error = %err, "job processor task ended abnormally");
            }
        }
        if let Some(keeper) = self.keeper.take() {
            keeper.stop().await;
        }
        info!("orchestrator stopped");
    }
}

impl Drop for OrchestratorHandle {
    fn drop(&mut self) {
        // Without an explicit stop, at least do not leave the units running.
        self.cancel.cancel();
    }
}
