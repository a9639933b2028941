//! Worker pool, job processing, and the completion barrier.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::{App, synthesis};
use crate::domain::{JobError, SubtaskJob, SubtaskResult, TaskId, TaskStatus};
use crate::ports::FailureDisposition;
use crate::retry::with_retry;

/// Worker group handle.
/// - `request_shutdown()` stops the workers taking new leases
/// - `shutdown_and_join()` additionally waits for in-flight jobs to finish
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `n` workers against the app's queue.
    pub fn spawn(n: usize, app: Arc<App>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let app = Arc::clone(&app);
            let mut rx = shutdown_rx.clone();
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, app, &mut rx).await;
            }));
        }

        Self { shutdown_tx, joins }
    }

    /// Stop taking new leases. In-flight handler execution is not cancelled.
    pub fn request_shutdown(&self) {
        // a send error only means every worker already exited
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn worker_loop(worker_id: usize, app: Arc<App>, shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // Leasing can wait indefinitely, so race it against shutdown.
        let lease = tokio::select! {
            _ = shutdown_rx.changed() => continue,
            lease = app.queue.lease() => lease,
        };
        let Some(lease) = lease else {
            tokio::task::yield_now().await;
            continue;
        };

        let job = lease.job().clone();
        tracing::debug!(
            worker_id,
            task_id = %job.task_id,
            index = job.index,
            attempt = lease.attempt(),
            "job leased"
        );

        match process_job(&app, &job).await {
            Ok(()) => {
                if let Err(error) = lease.ack().await {
                    tracing::error!(worker_id, %error, "ack failed");
                }
            }
            Err(error) => match lease.fail(error.to_string()).await {
                Ok(FailureDisposition::RetryScheduled) => {}
                Ok(FailureDisposition::Dead) => {
                    // The completion count can never be satisfied now; the
                    // task is terminally broken.
                    mark_task_error(&app, job.task_id).await;
                }
                Err(error) => {
                    tracing::error!(worker_id, %error, "failure report to queue failed");
                }
            },
        }
    }
}

/// One delivery: analyze, persist, then run the barrier check.
///
/// Analysis failures are absorbed here: after the job-level retry budget the
/// result is persisted as `degraded` instead of propagating, which keeps the
/// completion count satisfiable. Only store/queue failures escape, handing
/// the delivery back to the queue's requeue policy.
pub(crate) async fn process_job(app: &App, job: &SubtaskJob) -> Result<(), JobError> {
    let result = match with_retry(&app.analysis_retry, "analyzer.run", || {
        app.analyzer.run(&job.input_ref)
    })
    .await
    {
        Ok(payload) => SubtaskResult::ok(job.task_id, job.index, payload),
        Err(error) => {
            tracing::warn!(
                task_id = %job.task_id,
                index = job.index,
                %error,
                "analysis retries exhausted, persisting degraded result"
            );
            SubtaskResult::degraded(job.task_id, job.index, error.to_string())
        }
    };

    with_retry(&app.store_retry, "set_result", || {
        app.store
            .set_result(result.task_id, result.index, result.payload.clone(), result.status)
    })
    .await?;

    check_completion(app, job.task_id).await
}

/// The completion barrier.
///
/// Any number of workers may observe `results == expected` at the same
/// moment; that read race is benign. The atomic conditional set on the flag
/// is what admits exactly one of them into synthesis. Losing the flag race is
/// a success path, not an error.
async fn check_completion(app: &App, task_id: TaskId) -> Result<(), JobError> {
    let results = with_retry(&app.store_retry, "list_results", || {
        app.store.list_results(task_id)
    })
    .await?;
    let expected = with_retry(&app.store_retry, "job_count", || {
        app.store.job_count(task_id)
    })
    .await?;

    if results.len() < expected {
        tracing::debug!(%task_id, done = results.len(), expected, "subtasks outstanding");
        return Ok(());
    }

    if with_retry(&app.store_retry, "try_acquire_flag", || {
        app.store.try_acquire_flag(task_id)
    })
    .await?
    {
        tracing::info!(%task_id, "completion barrier released, running synthesis");
        synthesis::run(app, task_id).await?;
    } else {
        tracing::debug!(%task_id, "synthesis already owned by another worker");
    }
    Ok(())
}

async fn mark_task_error(app: &App, task_id: TaskId) {
    // A dead delivery can be a duplicate arriving after the task already
    // finished; a finished task never leaves its terminal state.
    match with_retry(&app.store_retry, "get_task", || app.store.get_task(task_id)).await {
        Ok(Some(meta)) if meta.status.is_terminal() => {
            tracing::debug!(%task_id, status = ?meta.status, "dead delivery for a finished task, status kept");
            return;
        }
        Ok(_) => {}
        Err(error) => {
            tracing::error!(%task_id, %error, "could not read status before error write");
            return;
        }
    }
    if let Err(error) = with_retry(&app.store_retry, "set_status", || {
        app.store.set_status(task_id, TaskStatus::Error)
    })
    .await
    {
        tracing::error!(%task_id, %error, "could not record error status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppBuilder;
    use crate::domain::{AggregationError, AnalysisError, DispatchError, TaskMeta};
    use crate::impls::{InMemoryJobQueue, InMemoryTaskStore};
    use crate::ports::{Aggregator, Analyzer, Clock, Splitter, SystemClock, TaskStore};
    use crate::retry::{RequeuePolicy, RetryPolicy};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;
    use ulid::Ulid;

    struct UnusedSplitter;

    #[async_trait]
    impl Splitter for UnusedSplitter {
        async fn decompose(
            &self,
            _work_source: &serde_json::Value,
        ) -> Result<Vec<serde_json::Value>, DispatchError> {
            Err(DispatchError("not under test".into()))
        }
    }

    /// Echoes the input back; optionally fails the first `failures` calls.
    struct EchoAnalyzer {
        remaining_failures: AtomicU32,
    }

    impl EchoAnalyzer {
        fn new(failures: u32) -> Self {
            Self {
                remaining_failures: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl Analyzer for EchoAnalyzer {
        async fn run(
            &self,
            input_ref: &serde_json::Value,
        ) -> Result<serde_json::Value, AnalysisError> {
            let left = self.remaining_failures.load(Ordering::Relaxed);
            if left > 0 {
                self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
                return Err(AnalysisError(format!("intentional failure (left={left})")));
            }
            Ok(serde_json::json!({ "echo": input_ref }))
        }
    }

    /// Counts invocations and remembers the payload sequence it was given.
    struct RecordingAggregator {
        calls: AtomicU32,
        seen: Mutex<Vec<serde_json::Value>>,
    }

    impl RecordingAggregator {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Aggregator for RecordingAggregator {
        async fn summarize(
            &self,
            payloads: &[serde_json::Value],
        ) -> Result<serde_json::Value, AggregationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().await = payloads.to_vec();
            Ok(serde_json::json!({ "subtasks": payloads.len() }))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(2, Duration::ZERO)
    }

    fn test_app(
        analyzer: Arc<dyn Analyzer>,
        aggregator: Arc<dyn Aggregator>,
    ) -> (Arc<App>, Arc<InMemoryTaskStore>) {
        let store = Arc::new(InMemoryTaskStore::new());
        let app = AppBuilder::new()
            .store(store.clone())
            .queue(Arc::new(InMemoryJobQueue::new(RequeuePolicy::default_v1())))
            .splitter(Arc::new(UnusedSplitter))
            .analyzer(analyzer)
            .aggregator(aggregator)
            .store_retry(fast_retry())
            .analysis_retry(fast_retry())
            .build()
            .unwrap();
        (Arc::new(app), store)
    }

    async fn registered_task(store: &InMemoryTaskStore, jobs: u32) -> (TaskId, Vec<SubtaskJob>) {
        let task_id = TaskId::from_ulid(Ulid::new());
        store
            .init_task(TaskMeta::new(task_id, SystemClock.now()))
            .await
            .unwrap();
        let jobs: Vec<SubtaskJob> = (0..jobs)
            .map(|index| SubtaskJob::new(task_id, index, serde_json::json!({ "file": index })))
            .collect();
        store.register_jobs(task_id, &jobs).await.unwrap();
        (task_id, jobs)
    }

    #[tokio::test]
    async fn report_reflects_dispatch_order_not_completion_order() {
        let aggregator = Arc::new(RecordingAggregator::new());
        let (app, store) = test_app(Arc::new(EchoAnalyzer::new(0)), aggregator.clone());
        let (task_id, jobs) = registered_task(&store, 3).await;

        // Indices 1 and 2 finish before index 0.
        for job in [&jobs[1], &jobs[2], &jobs[0]] {
            process_job(&app, job).await.unwrap();
        }

        assert_eq!(aggregator.calls.load(Ordering::SeqCst), 1);
        let seen = aggregator.seen.lock().await;
        let files: Vec<u64> = seen
            .iter()
            .map(|p| p["echo"]["file"].as_u64().unwrap())
            .collect();
        assert_eq!(files, vec![0, 1, 2]);
        drop(seen);

        assert_eq!(
            store.get_task(task_id).await.unwrap().unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn duplicate_delivery_neither_bumps_count_nor_retriggers_synthesis() {
        let aggregator = Arc::new(RecordingAggregator::new());
        let (app, store) = test_app(Arc::new(EchoAnalyzer::new(0)), aggregator.clone());
        let (task_id, jobs) = registered_task(&store, 2).await;

        process_job(&app, &jobs[0]).await.unwrap();
        process_job(&app, &jobs[0]).await.unwrap(); // redelivery before completion
        assert_eq!(store.list_results(task_id).await.unwrap().len(), 1);
        assert_eq!(aggregator.calls.load(Ordering::SeqCst), 0);

        process_job(&app, &jobs[1]).await.unwrap();
        assert_eq!(aggregator.calls.load(Ordering::SeqCst), 1);

        process_job(&app, &jobs[0]).await.unwrap(); // redelivery after completion
        assert_eq!(store.list_results(task_id).await.unwrap().len(), 2);
        assert_eq!(aggregator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn analysis_failure_degrades_but_still_satisfies_the_barrier() {
        let aggregator = Arc::new(RecordingAggregator::new());
        // Fails more times than the 2-attempt budget allows for job 0.
        let (app, store) = test_app(Arc::new(EchoAnalyzer::new(2)), aggregator.clone());
        let (task_id, jobs) = registered_task(&store, 1).await;

        process_job(&app, &jobs[0]).await.unwrap();

        let results = store.list_results(task_id).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, crate::domain::ResultStatus::Degraded);
        assert!(results[0].payload["error"].is_string());

        assert_eq!(aggregator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.get_task(task_id).await.unwrap().unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn aggregation_failure_marks_task_failed_and_keeps_the_flag() {
        struct FailingAggregator;

        #[async_trait]
        impl Aggregator for FailingAggregator {
            async fn summarize(
                &self,
                _payloads: &[serde_json::Value],
            ) -> Result<serde_json::Value, AggregationError> {
                Err(AggregationError("model unavailable".into()))
            }
        }

        let (app, store) = test_app(Arc::new(EchoAnalyzer::new(0)), Arc::new(FailingAggregator));
        let (task_id, jobs) = registered_task(&store, 1).await;

        process_job(&app, &jobs[0]).await.unwrap();

        assert_eq!(
            store.get_task(task_id).await.unwrap().unwrap().status,
            TaskStatus::Failed
        );
        assert!(store.get_report(task_id).await.unwrap().is_none());
        // Fail-closed: the flag stays set, so a redelivery cannot restart
        // synthesis for this task id.
        assert!(!store.try_acquire_flag(task_id).await.unwrap());
    }

    #[tokio::test]
    async fn dead_duplicate_delivery_cannot_downgrade_a_completed_task() {
        let aggregator = Arc::new(RecordingAggregator::new());
        let (app, store) = test_app(Arc::new(EchoAnalyzer::new(0)), aggregator.clone());
        let (task_id, jobs) = registered_task(&store, 1).await;

        process_job(&app, &jobs[0]).await.unwrap();
        assert_eq!(
            store.get_task(task_id).await.unwrap().unwrap().status,
            TaskStatus::Completed
        );

        // A duplicate delivery of the same job dies in the queue after the
        // task finished; the worker's reaction must not touch the status.
        mark_task_error(&app, task_id).await;

        assert_eq!(
            store.get_task(task_id).await.unwrap().unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn dead_delivery_on_an_unfinished_task_marks_it_error() {
        let aggregator = Arc::new(RecordingAggregator::new());
        let (app, store) = test_app(Arc::new(EchoAnalyzer::new(0)), aggregator.clone());
        let (task_id, _jobs) = registered_task(&store, 2).await;

        mark_task_error(&app, task_id).await;

        assert_eq!(
            store.get_task(task_id).await.unwrap().unwrap().status,
            TaskStatus::Error
        );
    }
}
