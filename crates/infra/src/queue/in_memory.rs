//! In-memory queue for tests/dev.
//!
//! Models the parts of SQS the worker relies on: a receive count that grows on
//! every delivery, receipt handles that die on acknowledgement, and
//! redelivery of unacknowledged messages once their visibility lapses
//! (simulated explicitly with [`InMemoryQueue::expire_in_flight`]).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::warn;

use signer_core::{DeliveryAttempt, DeliveryHandle, RunId, SigningJob};

use super::{Delivery, JobQueue};

#[derive(Debug, Clone)]
struct Entry {
    id: u64,
    job: SigningJob,
    receive_count: u32,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    visible: VecDeque<Entry>,
    in_flight: HashMap<String, Entry>,
    acknowledged: Vec<RunId>,
    stale_acks: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<State>,
    arrivals: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a fresh message.
    pub fn push(&self, job: SigningJob) {
        self.push_redelivered(job, 0);
    }

    /// Enqueue a message that has already been received `previous_receives` times.
    pub fn push_redelivered(&self, job: SigningJob, previous_receives: u32) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.visible.push_back(Entry {
            id,
            job,
            receive_count: previous_receives,
        });
        drop(state);
        self.arrivals.notify_one();
    }

    /// Make every unacknowledged delivery receivable again.
    pub fn expire_in_flight(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let mut expired: Vec<Entry> = state.in_flight.drain().map(|(_, e)| e).collect();
        expired.sort_by_key(|e| e.id);
        let n = expired.len();
        state.visible.extend(expired);
        drop(state);
        if n > 0 {
            self.arrivals.notify_one();
        }
        n
    }

    pub fn visible_len(&self) -> usize {
        self.state.lock().unwrap().visible.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.state.lock().unwrap().in_flight.len()
    }

    /// Run ids of every successful acknowledgement, in order.
    pub fn acknowledged(&self) -> Vec<RunId> {
        self.state.lock().unwrap().acknowledged.clone()
    }

    /// Acknowledgements that arrived with a dead handle.
    pub fn stale_acks(&self) -> usize {
        self.state.lock().unwrap().stale_acks
    }

    fn try_take(&self) -> Option<Delivery> {
        let mut state = self.state.lock().unwrap();
        let mut entry = state.visible.pop_front()?;
        entry.receive_count += 1;
        let token = format!("rh-{}-{}", entry.id, entry.receive_count);
        let delivery = Delivery {
            job: entry.job.clone(),
            handle: DeliveryHandle::new(token.clone()),
            attempt: DeliveryAttempt::new(entry.receive_count),
        };
        state.in_flight.insert(token, entry);
        Some(delivery)
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn receive(&self, wait: Duration) -> Option<Delivery> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(delivery) = self.try_take() {
                return Some(delivery);
            }
            if tokio::time::timeout_at(deadline, self.arrivals.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }

    async fn acknowledge(&self, handle: DeliveryHandle) {
        let mut state = self.state.lock().unwrap();
        match state.in_flight.remove(handle.as_str()) {
            Some(entry) => state.acknowledged.push(entry.job.run_id),
            None => {
                state.stale_acks += 1;
                warn!(handle = handle.as_str(), "acknowledge with unknown receipt handle");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signer_core::{JobDefaults, JobMessage};

    fn job(run_id: &str) -> SigningJob {
        let defaults = JobDefaults {
            cert_identity: "c".into(),
            timestamp_authority: "http://t".into(),
        };
        SigningJob::from_message(
            JobMessage {
                run_id: Some(run_id.into()),
                files: Some(vec!["a.exe".into()]),
                ..JobMessage::default()
            },
            &defaults,
        )
    }

    #[tokio::test]
    async fn empty_poll_returns_none() {
        let queue = InMemoryQueue::new();
        assert!(queue.receive(Duration::from_millis(10)).await.is_none());
    }

    #[tokio::test]
    async fn redelivery_increments_attempt() {
        let queue = InMemoryQueue::new();
        queue.push(job("1"));

        let first = queue.receive(Duration::ZERO).await.unwrap();
        assert_eq!(first.attempt, DeliveryAttempt::FIRST);
        assert!(queue.receive(Duration::ZERO).await.is_none());

        assert_eq!(queue.expire_in_flight(), 1);
        let second = queue.receive(Duration::ZERO).await.unwrap();
        assert_eq!(second.attempt, DeliveryAttempt::new(2));

        // The first handle died with the redelivery.
        queue.acknowledge(first.handle).await;
        assert_eq!(queue.stale_acks(), 1);

        queue.acknowledge(second.handle).await;
        assert_eq!(queue.acknowledged(), vec![RunId::new("1")]);
        assert_eq!(queue.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn receive_wakes_on_push() {
        let queue = std::sync::Arc::new(InMemoryQueue::new());
        let q = queue.clone();
        let waiter = tokio::spawn(async move { q.receive(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push_redelivered(job("9"), 2);

        let delivery = waiter.await.unwrap().unwrap();
        assert_eq!(delivery.job.run_id.as_str(), "9");
        assert_eq!(delivery.attempt, DeliveryAttempt::new(3));
    }
}
