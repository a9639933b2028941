//! TaskStore port: the durable shared store all workers coordinate through.
//!
//! This is the only channel between workers; there is no worker-to-worker
//! communication and no shared in-process memory in the protocol. The store
//! must provide per-key read-after-write visibility and one genuinely atomic
//! conditional primitive (`try_acquire_flag`). Everything else is independent
//! writes keyed by distinct `(task_id, index)` pairs and needs no locking at
//! the protocol level.

use async_trait::async_trait;

use crate::domain::{FinalReport, ResultStatus, StoreError, SubtaskJob, SubtaskResult, TaskMeta, TaskStatus};
use crate::domain::TaskId;

/// Durable key-value store for task metadata, per-subtask results, the final
/// report, and the single-writer-wins completion flag.
///
/// Any operation may fail with a transient [`StoreError`]; callers apply the
/// bounded retry policy from [`crate::retry`].
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create the task with status `pending`, clearing any stale jobs,
    /// results, flag, or report left under the same id.
    async fn init_task(&self, meta: TaskMeta) -> Result<(), StoreError>;

    /// Unconditional status overwrite; last write wins. Creates the record if
    /// it does not exist yet, so a task can still be marked `error` when
    /// `init_task` itself kept failing.
    async fn set_status(&self, task_id: TaskId, status: TaskStatus) -> Result<(), StoreError>;

    /// Fetch task metadata; `None` for an unknown id.
    async fn get_task(&self, task_id: TaskId) -> Result<Option<TaskMeta>, StoreError>;

    /// Persist the expected subtask count and ordering.
    ///
    /// Must happen-before any of these jobs is enqueued, otherwise a fast
    /// worker could observe a completion count with no registered target.
    async fn register_jobs(&self, task_id: TaskId, jobs: &[SubtaskJob]) -> Result<(), StoreError>;

    /// Number of jobs registered for the task.
    async fn job_count(&self, task_id: TaskId) -> Result<usize, StoreError>;

    /// Idempotent upsert keyed by `(task_id, index)`. A duplicate write for
    /// the same key overwrites with identical or newer content and must not
    /// corrupt the completion count.
    async fn set_result(
        &self,
        task_id: TaskId,
        index: u32,
        payload: serde_json::Value,
        status: ResultStatus,
    ) -> Result<(), StoreError>;

    /// All results currently stored for the task, sorted by `index`.
    async fn list_results(&self, task_id: TaskId) -> Result<Vec<SubtaskResult>, StoreError>;

    /// The atomic primitive of the completion barrier.
    ///
    /// In one indivisible round-trip: read the flag and set it to "acquired"
    /// only if it was previously unset. Returns whether *this* call was the
    /// one that set it; across all concurrent attempts for a given task, at
    /// most one caller ever observes `true`.
    ///
    /// Implementations must use a true atomic conditional update (versioned
    /// compare-and-swap, transactional script, or a single critical section).
    /// A separate read followed by a separate write reintroduces the race
    /// this primitive exists to eliminate.
    ///
    /// The flag is never released: if its holder crashes mid-synthesis the
    /// task stalls in `processing` and must be resubmitted under a fresh id.
    async fn try_acquire_flag(&self, task_id: TaskId) -> Result<bool, StoreError>;

    /// Persist the final report. Written once per task.
    async fn set_report(&self, report: FinalReport) -> Result<(), StoreError>;

    /// Fetch the final report, if synthesis has produced one.
    async fn get_report(&self, task_id: TaskId) -> Result<Option<FinalReport>, StoreError>;
}
