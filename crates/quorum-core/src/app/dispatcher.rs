//! Dispatch: turn one work source into registered, enqueued subtasks.

use crate::app::App;
use crate::domain::{FinalReport, SubmitError, SubtaskJob, TaskId, TaskMeta, TaskStatus};
use crate::retry::with_retry;

/// Submit path.
///
/// Ordering matters here:
/// - the task record is created before decomposition, so a splitter failure
///   has a record to mark `error` on;
/// - `register_jobs` lands before the first enqueue, so a worker that
///   finishes the first job immediately still finds an authoritative
///   expected count for the barrier;
/// - the `processing` write also lands before the first enqueue: a fast
///   worker can drive the task to `completed` before submit returns, and a
///   status write arriving after that would overwrite the terminal state.
pub(crate) async fn submit(
    app: &App,
    work_source: &serde_json::Value,
) -> Result<TaskId, SubmitError> {
    let task_id = app.ids.next_task_id();
    let meta = TaskMeta::new(task_id, app.clock.now());

    if let Err(error) = with_retry(&app.store_retry, "init_task", || {
        app.store.init_task(meta.clone())
    })
    .await
    {
        mark_error(app, task_id).await;
        return Err(error.into());
    }
    tracing::info!(%task_id, "task accepted");

    let input_refs = match app.splitter.decompose(work_source).await {
        Ok(refs) => refs,
        Err(error) => {
            tracing::error!(%task_id, %error, "decomposition failed");
            mark_error(app, task_id).await;
            return Err(error.into());
        }
    };

    if input_refs.is_empty() {
        // No subtask will ever run the barrier, so nothing downstream can
        // complete this task; it has to complete here, with an empty report.
        with_retry(&app.store_retry, "set_report", || {
            app.store.set_report(FinalReport::empty(task_id))
        })
        .await?;
        with_retry(&app.store_retry, "set_status", || {
            app.store.set_status(task_id, TaskStatus::Completed)
        })
        .await?;
        tracing::info!(%task_id, "empty decomposition, completed with empty report");
        return Ok(task_id);
    }

    let jobs: Vec<SubtaskJob> = input_refs
        .into_iter()
        .enumerate()
        .map(|(index, input_ref)| SubtaskJob::new(task_id, index as u32, input_ref))
        .collect();

    with_retry(&app.store_retry, "register_jobs", || {
        app.store.register_jobs(task_id, &jobs)
    })
    .await?;

    with_retry(&app.store_retry, "set_status", || {
        app.store.set_status(task_id, TaskStatus::Processing)
    })
    .await?;

    for job in &jobs {
        app.queue.enqueue(job.clone()).await?;
    }

    tracing::info!(%task_id, subtasks = jobs.len(), "dispatched");
    Ok(task_id)
}

/// Best effort: the caller already gets the submit error; a failure to record
/// the terminal status on top of that is only logged.
async fn mark_error(app: &App, task_id: TaskId) {
    if let Err(error) = with_retry(&app.store_retry, "set_status", || {
        app.store.set_status(task_id, TaskStatus::Error)
    })
    .await
    {
        tracing::error!(%task_id, %error, "could not record error status");
    }
}
