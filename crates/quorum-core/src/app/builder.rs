//! App construction and the exposed operations.

use std::sync::Arc;

use crate::app::{dispatcher, worker::WorkerPool};
use crate::domain::{FinalReport, StoreError, SubmitError, TaskId, TaskStatus};
use crate::ports::{
    Aggregator, Analyzer, Clock, IdGenerator, JobQueue, Splitter, SystemClock, TaskStore,
    UlidIdGenerator,
};
use crate::retry::RetryPolicy;

/// Missing wiring detected at build time, before anything runs.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing component: {0}")]
    MissingComponent(&'static str),
}

/// Builds an [`App`] from its collaborators.
///
/// The store, queue, splitter, analyzer, and aggregator have no sensible
/// defaults and must be provided; clock, id generation, and retry budgets
/// default to the production values.
pub struct AppBuilder {
    store: Option<Arc<dyn TaskStore>>,
    queue: Option<Arc<dyn JobQueue>>,
    splitter: Option<Arc<dyn Splitter>>,
    analyzer: Option<Arc<dyn Analyzer>>,
    aggregator: Option<Arc<dyn Aggregator>>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    store_retry: RetryPolicy,
    analysis_retry: RetryPolicy,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            queue: None,
            splitter: None,
            analyzer: None,
            aggregator: None,
            ids: Arc::new(UlidIdGenerator::new(SystemClock)),
            clock: Arc::new(SystemClock),
            store_retry: RetryPolicy::store_default(),
            analysis_retry: RetryPolicy::analysis_default(),
        }
    }

    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn splitter(mut self, splitter: Arc<dyn Splitter>) -> Self {
        self.splitter = Some(splitter);
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn aggregator(mut self, aggregator: Arc<dyn Aggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store_retry(mut self, policy: RetryPolicy) -> Self {
        self.store_retry = policy;
        self
    }

    pub fn analysis_retry(mut self, policy: RetryPolicy) -> Self {
        self.analysis_retry = policy;
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        Ok(App {
            store: self.store.ok_or(BuildError::MissingComponent("store"))?,
            queue: self.queue.ok_or(BuildError::MissingComponent("queue"))?,
            splitter: self
                .splitter
                .ok_or(BuildError::MissingComponent("splitter"))?,
            analyzer: self
                .analyzer
                .ok_or(BuildError::MissingComponent("analyzer"))?,
            aggregator: self
                .aggregator
                .ok_or(BuildError::MissingComponent("aggregator"))?,
            ids: self.ids,
            clock: self.clock,
            store_retry: self.store_retry,
            analysis_retry: self.analysis_retry,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The wired pipeline: owns the collaborator handles and exposes the three
/// operations of the contract (`submit`, `get_status`, `get_result`).
///
/// All handles are explicitly constructed and passed by reference; nothing in
/// the core reaches for ambient global state.
pub struct App {
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) queue: Arc<dyn JobQueue>,
    pub(crate) splitter: Arc<dyn Splitter>,
    pub(crate) analyzer: Arc<dyn Analyzer>,
    pub(crate) aggregator: Arc<dyn Aggregator>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) store_retry: RetryPolicy,
    pub(crate) analysis_retry: RetryPolicy,
}

impl App {
    /// Accept one work source: decompose it and fan the subtasks out.
    pub async fn submit(&self, work_source: &serde_json::Value) -> Result<TaskId, SubmitError> {
        dispatcher::submit(self, work_source).await
    }

    /// Current status; `None` for an unknown task id.
    pub async fn get_status(&self, task_id: TaskId) -> Result<Option<TaskStatus>, StoreError> {
        Ok(self.store.get_task(task_id).await?.map(|meta| meta.status))
    }

    /// The final report. Defined only when the task is `completed`; any other
    /// state (including unknown ids) yields `None`.
    pub async fn get_result(&self, task_id: TaskId) -> Result<Option<FinalReport>, StoreError> {
        match self.get_status(task_id).await? {
            Some(TaskStatus::Completed) => self.store.get_report(task_id).await,
            _ => Ok(None),
        }
    }

    /// Spawn `n` workers against this app's queue.
    pub fn spawn_workers(self: &Arc<Self>, n: usize) -> WorkerPool {
        WorkerPool::spawn(n, Arc::clone(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryJobQueue, InMemoryTaskStore};
    use crate::retry::RequeuePolicy;
    use async_trait::async_trait;
    use crate::domain::{AggregationError, AnalysisError, DispatchError};

    struct NoopSplitter;

    #[async_trait]
    impl Splitter for NoopSplitter {
        async fn decompose(
            &self,
            _work_source: &serde_json::Value,
        ) -> Result<Vec<serde_json::Value>, DispatchError> {
            Ok(Vec::new())
        }
    }

    struct NoopAnalyzer;

    #[async_trait]
    impl Analyzer for NoopAnalyzer {
        async fn run(
            &self,
            _input_ref: &serde_json::Value,
        ) -> Result<serde_json::Value, AnalysisError> {
            Ok(serde_json::json!({}))
        }
    }

    struct NoopAggregator;

    #[async_trait]
    impl Aggregator for NoopAggregator {
        async fn summarize(
            &self,
            _payloads: &[serde_json::Value],
        ) -> Result<serde_json::Value, AggregationError> {
            Ok(serde_json::json!({}))
        }
    }

    #[test]
    fn build_fails_fast_on_missing_component() {
        let result = AppBuilder::new()
            .store(Arc::new(InMemoryTaskStore::new()))
            .queue(Arc::new(InMemoryJobQueue::new(RequeuePolicy::default_v1())))
            .splitter(Arc::new(NoopSplitter))
            .analyzer(Arc::new(NoopAnalyzer))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingComponent("aggregator"))
        ));
    }

    #[test]
    fn build_succeeds_with_full_wiring() {
        let app = AppBuilder::new()
            .store(Arc::new(InMemoryTaskStore::new()))
            .queue(Arc::new(InMemoryJobQueue::new(RequeuePolicy::default_v1())))
            .splitter(Arc::new(NoopSplitter))
            .analyzer(Arc::new(NoopAnalyzer))
            .aggregator(Arc::new(NoopAggregator))
            .build();
        assert!(app.is_ok());
    }
}
