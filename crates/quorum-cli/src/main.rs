//! Demo binary: wires the in-memory store and queue with stub collaborators,
//! submits one change set, and polls it to completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::{Duration, sleep};

use quorum_core::domain::{AggregationError, AnalysisError, DispatchError};
use quorum_core::ports::{Aggregator, Analyzer, Splitter};
use quorum_core::{
    AppBuilder, InMemoryJobQueue, InMemoryTaskStore, RequeuePolicy, RetryPolicy,
};

/// One input ref per file named in the change set.
struct ChangeSetSplitter;

#[async_trait]
impl Splitter for ChangeSetSplitter {
    async fn decompose(
        &self,
        work_source: &serde_json::Value,
    ) -> Result<Vec<serde_json::Value>, DispatchError> {
        let files = work_source["files"]
            .as_array()
            .ok_or_else(|| DispatchError("work source has no files".into()))?;
        Ok(files
            .iter()
            .map(|file| serde_json::json!({ "file": file }))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct FileRef {
    file: String,
}

/// Pretend reviewer: fails its first few calls so the retry/degrade path is
/// visible in the logs, then returns one finding per file.
struct DemoAnalyzer {
    remaining_failures: AtomicU32,
}

impl DemoAnalyzer {
    fn new(failures: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl Analyzer for DemoAnalyzer {
    async fn run(&self, input_ref: &serde_json::Value) -> Result<serde_json::Value, AnalysisError> {
        let file_ref: FileRef = serde_json::from_value(input_ref.clone())
            .map_err(|e| AnalysisError(format!("json decode: {e}")))?;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(AnalysisError(format!("intentional failure (left={left})")));
        }
        sleep(Duration::from_millis(50)).await; // simulated model latency
        Ok(serde_json::json!({
            "file": file_ref.file,
            "issues": [
                { "type": "style", "line": 1, "description": "demo finding" }
            ],
        }))
    }
}

struct DemoAggregator;

#[async_trait]
impl Aggregator for DemoAggregator {
    async fn summarize(
        &self,
        payloads: &[serde_json::Value],
    ) -> Result<serde_json::Value, AggregationError> {
        let total_issues: usize = payloads
            .iter()
            .map(|p| p["issues"].as_array().map_or(0, Vec::len))
            .sum();
        Ok(serde_json::json!({
            "files": payloads,
            "summary": {
                "total_files": payloads.len(),
                "total_issues": total_issues,
            },
        }))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let app = Arc::new(
        AppBuilder::new()
            .store(Arc::new(InMemoryTaskStore::new()))
            .queue(Arc::new(InMemoryJobQueue::new(RequeuePolicy::default_v1())))
            .splitter(Arc::new(ChangeSetSplitter))
            .analyzer(Arc::new(DemoAnalyzer::new(2)))
            .aggregator(Arc::new(DemoAggregator))
            .analysis_retry(RetryPolicy::new(3, Duration::from_millis(200)))
            .build()
            .expect("wiring is complete"),
    );

    let pool = app.spawn_workers(4);

    let change_set = serde_json::json!({
        "repo": "acme/widget",
        "change": 4217,
        "files": ["src/lib.rs", "src/parser.rs", "src/worker.rs", "README.md"],
    });
    let task_id = app.submit(&change_set).await.expect("submit");
    println!("submitted: {task_id}");

    // Poll until terminal, like a status endpoint client would.
    loop {
        let status = app
            .get_status(task_id)
            .await
            .expect("status query")
            .expect("task exists");
        if status.is_terminal() {
            println!("final status: {status:?}");
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    if let Some(report) = app.get_result(task_id).await.expect("result query") {
        println!(
            "report:\n{}",
            serde_json::to_string_pretty(&report.payload).expect("report is json")
        );
    }

    pool.shutdown_and_join().await;
}
