//! In-memory TaskStore implementation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    FinalReport, ResultStatus, StoreError, SubtaskJob, SubtaskResult, TaskId, TaskMeta, TaskStatus,
};
use crate::ports::TaskStore;

/// All task state, guarded by one mutex (single source of truth).
///
/// Results are held in a `BTreeMap` keyed by index, so `list_results` comes
/// back sorted for free and a duplicate write is a plain overwrite of the same
/// key: the map length (the completion count) cannot be disturbed by
/// redelivery.
#[derive(Default)]
struct StoreState {
    tasks: HashMap<TaskId, TaskMeta>,
    jobs: HashMap<TaskId, Vec<SubtaskJob>>,
    results: HashMap<TaskId, BTreeMap<u32, SubtaskResult>>,
    acquired_flags: HashSet<TaskId>,
    reports: HashMap<TaskId, FinalReport>,
}

/// In-memory store for development and tests.
///
/// The completion flag is implemented as a check-and-set inside a single
/// critical section, which is the in-process equivalent of a versioned
/// compare-and-swap: no other caller can interleave between the read and the
/// write.
pub struct InMemoryTaskStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn init_task(&self, meta: TaskMeta) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let task_id = meta.id;

        // A re-initialized id must not observe leftovers from a previous run.
        state.jobs.remove(&task_id);
        state.results.remove(&task_id);
        state.acquired_flags.remove(&task_id);
        state.reports.remove(&task_id);

        state.tasks.insert(task_id, meta);
        Ok(())
    }

    async fn set_status(&self, task_id: TaskId, status: TaskStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        // Upsert: a status write must stick even when init_task never landed
        // (e.g. marking a task `error` after init exhausted its retries).
        // The creation time lives in the ULID, so the record can be rebuilt.
        let meta = state.tasks.entry(task_id).or_insert_with(|| TaskMeta {
            id: task_id,
            status,
            created_at: chrono::DateTime::from_timestamp_millis(
                task_id.as_ulid().timestamp_ms() as i64
            )
            .unwrap_or_default(),
        });
        meta.status = status;
        Ok(())
    }

    async fn get_task(&self, task_id: TaskId) -> Result<Option<TaskMeta>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.tasks.get(&task_id).cloned())
    }

    async fn register_jobs(&self, task_id: TaskId, jobs: &[SubtaskJob]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.tasks.contains_key(&task_id) {
            return Err(StoreError::TaskNotFound(task_id));
        }
        state.jobs.insert(task_id, jobs.to_vec());
        Ok(())
    }

    async fn job_count(&self, task_id: TaskId) -> Result<usize, StoreError> {
        let state = self.state.lock().await;
        state
            .jobs
            .get(&task_id)
            .map(Vec::len)
            .ok_or(StoreError::TaskNotFound(task_id))
    }

    async fn set_result(
        &self,
        task_id: TaskId,
        index: u32,
        payload: serde_json::Value,
        status: ResultStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let result = SubtaskResult {
            task_id,
            index,
            payload,
            status,
        };
        state
            .results
            .entry(task_id)
            .or_default()
            .insert(index, result);
        Ok(())
    }

    async fn list_results(&self, task_id: TaskId) -> Result<Vec<SubtaskResult>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .results
            .get(&task_id)
            .map(|by_index| by_index.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn try_acquire_flag(&self, task_id: TaskId) -> Result<bool, StoreError> {
        // Read and conditional set under one guard: callers can race on the
        // *decision* to attempt this, but not on the flag itself.
        let mut state = self.state.lock().await;
        Ok(state.acquired_flags.insert(task_id))
    }

    async fn set_report(&self, report: FinalReport) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.reports.insert(report.task_id, report);
        Ok(())
    }

    async fn get_report(&self, task_id: TaskId) -> Result<Option<FinalReport>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.reports.get(&task_id).cloned())
    }
}
