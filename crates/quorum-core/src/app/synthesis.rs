//! Synthesis: the exactly-once aggregation step.

use crate::app::App;
use crate::domain::{FinalReport, JobError, TaskId, TaskStatus};
use crate::retry::with_retry;

/// Run the aggregation for a task whose completion flag this caller owns.
///
/// Executed at most once per task by construction of the barrier. The flag is
/// never released, even on failure: fail-closed, so a later redelivery cannot
/// start a second synthesis racing a partially completed one. A failed task
/// is retried only as a whole, through a fresh `init_task` with a new id.
pub(crate) async fn run(app: &App, task_id: TaskId) -> Result<(), JobError> {
    let results = with_retry(&app.store_retry, "list_results", || {
        app.store.list_results(task_id)
    })
    .await?;

    // list_results is index-sorted: the report reflects dispatch order, not
    // the order in which workers happened to finish.
    let payloads: Vec<serde_json::Value> = results.into_iter().map(|r| r.payload).collect();

    match app.aggregator.summarize(&payloads).await {
        Ok(report) => {
            with_retry(&app.store_retry, "set_report", || {
                app.store.set_report(FinalReport::new(task_id, report.clone()))
            })
            .await?;
            with_retry(&app.store_retry, "set_status", || {
                app.store.set_status(task_id, TaskStatus::Completed)
            })
            .await?;
            tracing::info!(%task_id, "final report persisted, task completed");
        }
        Err(error) => {
            tracing::error!(%task_id, %error, "aggregation failed, task failed");
            with_retry(&app.store_retry, "set_status", || {
                app.store.set_status(task_id, TaskStatus::Failed)
            })
            .await?;
        }
    }
    Ok(())
}
