//! In-memory JobQueue implementation.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::{QueueError, SubtaskJob};
use crate::ports::{FailureDisposition, JobLease, JobQueue};
use crate::retry::RequeuePolicy;

type DeliveryId = u64;

/// Entry in the retry heap. `Ord` is reversed so the `BinaryHeap` acts as a
/// min-heap (earliest redelivery first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledDelivery {
    next_run_at: Instant,
    delivery_id: DeliveryId,
}

impl PartialOrd for ScheduledDelivery {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledDelivery {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.next_run_at.cmp(&self.next_run_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryState {
    Ready,
    Running,
    Acked,
    RetryScheduled,
    Dead,
}

/// One enqueued job plus its delivery bookkeeping.
#[derive(Debug, Clone)]
struct DeliveryRecord {
    job: SubtaskJob,
    state: DeliveryState,

    /// Deliveries made so far (including the in-flight one when Running).
    attempts: u32,
}

struct QueueState {
    records: HashMap<DeliveryId, DeliveryRecord>,
    ready: VecDeque<DeliveryId>,
    scheduled: BinaryHeap<ScheduledDelivery>,
    next_delivery_id: DeliveryId,
    policy: RequeuePolicy,
}

impl QueueState {
    fn new(policy: RequeuePolicy) -> Self {
        Self {
            records: HashMap::new(),
            ready: VecDeque::new(),
            scheduled: BinaryHeap::new(),
            next_delivery_id: 1,
            policy,
        }
    }

    /// Move deliveries whose backoff has elapsed back to the ready queue.
    fn promote_scheduled(&mut self) {
        let now = Instant::now();
        while let Some(entry) = self.scheduled.peek() {
            if entry.next_run_at > now {
                break; // heap is sorted, nothing else is due
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            if let Some(record) = self.records.get_mut(&entry.delivery_id)
                && record.state == DeliveryState::RetryScheduled
            {
                record.state = DeliveryState::Ready;
                self.ready.push_back(entry.delivery_id);
            }
        }
    }
}

/// In-memory queue for development and tests.
///
/// At-least-once by construction: a failed delivery is redelivered with an
/// increasing delay until the policy's budget runs out, at which point it is
/// dead and the worker is told so via [`FailureDisposition::Dead`].
pub struct InMemoryJobQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

impl InMemoryJobQueue {
    pub fn new(policy: RequeuePolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::new(policy))),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Total deliveries ever enqueued (observability, tests).
    pub async fn total_enqueued(&self) -> u64 {
        let state = self.state.lock().await;
        state.next_delivery_id - 1
    }

    /// Deliveries not yet acked or dead.
    pub async fn pending(&self) -> usize {
        let state = self.state.lock().await;
        state
            .records
            .values()
            .filter(|r| {
                matches!(
                    r.state,
                    DeliveryState::Ready | DeliveryState::Running | DeliveryState::RetryScheduled
                )
            })
            .count()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: SubtaskJob) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().await;
            let delivery_id = state.next_delivery_id;
            state.next_delivery_id += 1;
            state.records.insert(
                delivery_id,
                DeliveryRecord {
                    job,
                    state: DeliveryState::Ready,
                    attempts: 0,
                },
            );
            state.ready.push_back(delivery_id);
        }
        // Notify outside the lock.
        self.notify.notify_one();
        Ok(())
    }

    async fn lease(&self) -> Option<Box<dyn JobLease>> {
        loop {
            let next_wake = {
                let mut state = self.state.lock().await;
                state.promote_scheduled();

                if let Some(delivery_id) = state.ready.pop_front() {
                    let policy = state.policy.clone();
                    if let Some(record) = state.records.get_mut(&delivery_id) {
                        record.state = DeliveryState::Running;
                        record.attempts += 1;
                        return Some(Box::new(InMemoryLease {
                            delivery_id,
                            job: record.job.clone(),
                            attempt: record.attempts,
                            queue: Arc::clone(&self.state),
                            policy,
                            notify: Arc::clone(&self.notify),
                        }));
                    }
                    continue;
                }

                state.scheduled.peek().map(|entry| entry.next_run_at)
            };

            // Wait for a new enqueue or for the next scheduled redelivery.
            if let Some(wake_time) = next_wake {
                tokio::select! {
                    _ = self.notify.notified() => {}
                    _ = tokio::time::sleep_until(wake_time.into()) => {}
                }
            } else {
                self.notify.notified().await;
            }
        }
    }
}

struct InMemoryLease {
    delivery_id: DeliveryId,
    job: SubtaskJob,
    attempt: u32,
    queue: Arc<Mutex<QueueState>>,
    policy: RequeuePolicy,
    notify: Arc<Notify>,
}

#[async_trait]
impl JobLease for InMemoryLease {
    fn job(&self) -> &SubtaskJob {
        &self.job
    }

    fn attempt(&self) -> u32 {
        self.attempt
    }

    async fn ack(self: Box<Self>) -> Result<(), QueueError> {
        let mut state = self.queue.lock().await;
        if let Some(record) = state.records.get_mut(&self.delivery_id) {
            record.state = DeliveryState::Acked;
        }
        Ok(())
    }

    async fn fail(self: Box<Self>, error: String) -> Result<FailureDisposition, QueueError> {
        let disposition = {
            let mut state = self.queue.lock().await;
            let Some(record) = state.records.get_mut(&self.delivery_id) else {
                return Ok(FailureDisposition::Dead);
            };

            if record.attempts >= self.policy.max_attempts {
                tracing::error!(
                    task_id = %self.job.task_id,
                    index = self.job.index,
                    attempts = record.attempts,
                    error,
                    "delivery budget exhausted, job is dead"
                );
                record.state = DeliveryState::Dead;
                FailureDisposition::Dead
            } else {
                let delay = self.policy.next_delay(record.attempts);
                tracing::warn!(
                    task_id = %self.job.task_id,
                    index = self.job.index,
                    attempts = record.attempts,
                    delay_ms = delay.as_millis() as u64,
                    error,
                    "delivery failed, scheduling redelivery"
                );
                record.state = DeliveryState::RetryScheduled;
                state.scheduled.push(ScheduledDelivery {
                    next_run_at: Instant::now() + delay,
                    delivery_id: self.delivery_id,
                });
                FailureDisposition::RetryScheduled
            }
        }; // lock released before waking a worker

        if disposition == FailureDisposition::RetryScheduled {
            self.notify.notify_one();
        }
        Ok(disposition)
    }
}
