//! Status publishing/subscription abstraction (mechanics only).
//!
//! The worker publishes coarse [`StatusEvent`](signer_core::StatusEvent)s; a
//! presentation layer (tray icon, log reporter, tests) subscribes. Delivery is
//! best-effort:
//!
//! - a publish never blocks on consumers
//! - events may be dropped if a consumer has gone away
//! - consumers must tolerate gaps and reordering
//!
//! Durable job state lives in the status object, never on this bus.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use tracing::debug;

/// A subscription to the status stream.
///
/// Each subscription gets its own copy of every event published after it was
/// created (broadcast semantics). Intended for a single consuming thread.
///
/// ```ignore
/// let sub = bus.subscribe();
/// loop {
///     match sub.recv_timeout(Duration::from_millis(250)) {
///         Ok(event) => render(event),
///         Err(RecvTimeoutError::Timeout) => continue, // check for shutdown
///         Err(RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered, without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Broadcast bus for outward status.
///
/// `publish` must return promptly regardless of subscriber state. Errors are
/// reserved for the bus itself being unusable.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

/// Publish and swallow failures; status is loss-tolerant.
pub fn publish_best_effort<M, B>(bus: &B, message: M)
where
    B: EventBus<M> + ?Sized,
{
    if let Err(err) = bus.publish(message) {
        debug!(error = ?err, "status event dropped");
    }
}
