//! Subtask job: one unit of dispatched work.

use serde::{Deserialize, Serialize};

use super::TaskId;

/// One independently processable unit of a change set.
///
/// Immutable once created. `index` is assigned at dispatch time and is the
/// canonical order used when the results are reassembled, independent of the
/// order in which workers happen to finish.
///
/// `input_ref` is opaque to the core: the splitter produces it and only the
/// analyzer interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskJob {
    pub task_id: TaskId,
    pub index: u32,
    pub input_ref: serde_json::Value,
}

impl SubtaskJob {
    pub fn new(task_id: TaskId, index: u32, input_ref: serde_json::Value) -> Self {
        Self {
            task_id,
            index,
            input_ref,
        }
    }
}
