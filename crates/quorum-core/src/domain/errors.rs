//! Error taxonomy.
//!
//! Each failure mode of a collaborator gets its own type so the retry and
//! propagation policy can differ per kind:
//! - `StoreError`: transient; retried with a fixed pause, then fatal to the
//!   calling operation.
//! - `AnalysisError`: retried at job level, then downgraded to a degraded
//!   result; never blocks the completion barrier.
//! - `AggregationError`: fatal to the task (status `failed`).
//! - `DispatchError`: the task never reaches `processing` (status `error`).

use thiserror::Error;

use super::TaskId;

/// Transient infrastructure failure from the task store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unknown task {0}")]
    TaskNotFound(TaskId),
}

/// Failure from the job queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue operation failed: {0}")]
    OperationFailed(String),
}

/// Failure from the external analyzer for one subtask.
#[derive(Debug, Error)]
#[error("analysis failed: {0}")]
pub struct AnalysisError(pub String);

/// Failure from the external aggregator during synthesis.
#[derive(Debug, Error)]
#[error("aggregation failed: {0}")]
pub struct AggregationError(pub String);

/// Failure while decomposing the work source into subtasks.
#[derive(Debug, Error)]
#[error("dispatch failed: {0}")]
pub struct DispatchError(pub String);

/// Failure of the submit operation as seen by the caller.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Fatal failure while processing one dequeued job.
///
/// Surfacing this hands the job back to the queue layer, which retries the
/// delivery a bounded number of times before declaring it dead. Analysis
/// errors never become a `JobError`; they are absorbed into a degraded result.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
