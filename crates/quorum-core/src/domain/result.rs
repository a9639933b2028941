//! Subtask results and the final report.

use serde::{Deserialize, Serialize};

use super::TaskId;

/// Classification of a persisted subtask result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// The analyzer produced a payload.
    Ok,

    /// The analyzer kept failing past its retry budget; the payload records
    /// the terminal error instead. Degraded results still count toward
    /// completion so the barrier stays satisfiable.
    Degraded,
}

/// One subtask's persisted outcome, keyed by `(task_id, index)`.
///
/// Writes are idempotent: re-delivering the same job overwrites this record
/// with identical content and must not disturb the completion count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskResult {
    pub task_id: TaskId,
    pub index: u32,
    pub payload: serde_json::Value,
    pub status: ResultStatus,
}

impl SubtaskResult {
    pub fn ok(task_id: TaskId, index: u32, payload: serde_json::Value) -> Self {
        Self {
            task_id,
            index,
            payload,
            status: ResultStatus::Ok,
        }
    }

    /// A degraded result; the payload records the analysis error.
    pub fn degraded(task_id: TaskId, index: u32, error: impl Into<String>) -> Self {
        Self {
            task_id,
            index,
            payload: serde_json::json!({ "error": error.into() }),
            status: ResultStatus::Degraded,
        }
    }
}

/// The aggregated report, written exactly once per task by the synthesis
/// step (or directly by the dispatcher for an empty decomposition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub task_id: TaskId,
    pub payload: serde_json::Value,
}

impl FinalReport {
    pub fn new(task_id: TaskId, payload: serde_json::Value) -> Self {
        Self { task_id, payload }
    }

    /// Report for a task whose decomposition produced no subtasks.
    pub fn empty(task_id: TaskId) -> Self {
        Self::new(task_id, serde_json::json!({}))
    }
}
