//! JobQueue port: at-least-once delivery of subtask jobs to workers.
//!
//! Delivery semantics are at-least-once, so every state transition downstream
//! must be safe under duplicates (idempotent result writes, race-safe
//! barrier). Retry of a failed delivery is the queue's decision, not the
//! worker's: the worker reports `ack`/`fail` and the queue applies its own
//! bounded, increasing-delay requeue policy.

use async_trait::async_trait;

use crate::domain::{QueueError, SubtaskJob};

/// What the queue decided after a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The job will be redelivered after a backoff delay.
    RetryScheduled,

    /// The delivery budget is exhausted; the job will never be redelivered.
    /// The worker reacts by marking the whole task `error`.
    Dead,
}

/// A leased job. The worker owns the lease and must `ack` or `fail` it.
#[async_trait]
pub trait JobLease: Send {
    fn job(&self) -> &SubtaskJob;

    /// Delivery attempt number (1 for the first delivery).
    fn attempt(&self) -> u32;

    /// Mark the delivery processed.
    async fn ack(self: Box<Self>) -> Result<(), QueueError>;

    /// Mark the delivery failed; the queue schedules a retry or gives up.
    async fn fail(self: Box<Self>, error: String) -> Result<FailureDisposition, QueueError>;
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: SubtaskJob) -> Result<(), QueueError>;

    /// Lease one deliverable job, waiting until one is available.
    async fn lease(&self) -> Option<Box<dyn JobLease>>;
}
