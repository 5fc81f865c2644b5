//! In-process status bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, Subscription};

#[derive(Debug, thiserror::Error)]
pub enum InMemoryBusError {
    /// Internal lock poisoned by a panicking publisher.
    #[error("status bus lock poisoned")]
    Poisoned,
}

/// In-memory fan-out bus backed by unbounded channels.
///
/// - No IO / no async; `publish` only clones into each live channel
/// - Subscribers that hung up are pruned on the next publish
/// - Publishing with zero subscribers is not an error (events are simply lost)
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
    published: AtomicU64,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions as of the last publish/subscribe.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|subs| subs.len()).unwrap_or(0)
    }

    /// Total events accepted by `publish`.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            published: AtomicU64::new(0),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        subs.retain(|tx| tx.send(message.clone()).is_ok());
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still yields a subscription; it just stays silent.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signer_core::StatusEvent;

    #[test]
    fn every_subscriber_sees_every_event() {
        let bus = InMemoryEventBus::<StatusEvent>::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(StatusEvent::Ready).unwrap();
        bus.publish(StatusEvent::error("boom")).unwrap();

        assert_eq!(a.drain(), vec![StatusEvent::Ready, StatusEvent::error("boom")]);
        assert_eq!(b.drain().len(), 2);
        assert_eq!(bus.published(), 2);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = InMemoryEventBus::<StatusEvent>::new();
        assert!(bus.publish(StatusEvent::Ready).is_ok());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = InMemoryEventBus::<StatusEvent>::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(StatusEvent::Ready).unwrap();

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.drain(), vec![StatusEvent::Ready]);
    }
}
