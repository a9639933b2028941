//! Task metadata and status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;

/// Task status (one submitted change set).
///
/// Transitions:
/// - Pending -> Processing -> Completed (synthesis succeeded)
/// - Pending -> Processing -> Failed (aggregation failed; terminal)
/// - Pending -> Error (dispatch failed, or a job exhausted its delivery budget)
/// - Pending -> Completed (empty decomposition short-circuit)
///
/// Monotonic: nothing in the core ever moves a task out of a terminal state.
/// Operator-driven resets go through a fresh `init_task` with a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted; subtasks not yet enqueued.
    Pending,

    /// Subtasks enqueued; workers are reporting results.
    Processing,

    /// Final report persisted.
    Completed,

    /// Aggregation failed after all subtasks reported.
    Failed,

    /// Dispatch failed, or a subtask delivery died; no report will ever exist.
    Error,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Error
        )
    }
}

/// Metadata for a task, as stored by the TaskStore.
///
/// Created by the dispatcher, mutated by workers and the synthesis step, never
/// deleted by the core (retention is an external concern).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    pub id: TaskId,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl TaskMeta {
    pub fn new(id: TaskId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TaskStatus::Pending, false)]
    #[case(TaskStatus::Processing, false)]
    #[case(TaskStatus::Completed, true)]
    #[case(TaskStatus::Failed, true)]
    #[case(TaskStatus::Error, true)]
    fn terminal_states(#[case] status: TaskStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn status_serializes_snake_case() {
        let s = serde_json::to_string(&TaskStatus::Processing).unwrap();
        assert_eq!(s, "\"processing\"");
    }
}
