//! Inbound command channel (presentation layer -> worker).

use std::sync::mpsc;

use signer_core::Command;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The worker has not drained earlier commands yet.
    #[error("command queue full")]
    Full,
    /// The worker is gone.
    #[error("command queue closed")]
    Closed,
}

/// Sending half; cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::SyncSender<Command>,
}

impl CommandSender {
    pub fn send(&self, command: Command) -> Result<(), CommandError> {
        self.tx.try_send(command).map_err(|e| match e {
            mpsc::TrySendError::Full(_) => CommandError::Full,
            mpsc::TrySendError::Disconnected(_) => CommandError::Closed,
        })
    }
}

/// Receiving half, drained opportunistically by the worker between polls.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<Command>,
}

impl CommandReceiver {
    /// Take every pending command without waiting.
    pub fn drain(&self) -> Vec<Command> {
        self.rx.try_iter().collect()
    }
}

/// Bounded channel; a full queue rejects instead of blocking the sender.
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (CommandSender { tx }, CommandReceiver { rx })
}
