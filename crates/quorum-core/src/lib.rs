//! quorum-core
//!
//! Fan-out/fan-in core for change-set analysis: split one large work item into
//! independent subtasks, run them on a concurrent worker pool, and trigger the
//! downstream synthesis step exactly once after every subtask has reported.
//!
//! # Module layout
//! - **domain**: ids, task metadata, jobs, results, error taxonomy
//! - **ports**: abstraction seams (TaskStore, JobQueue, Splitter, Analyzer,
//!   Aggregator, Clock, IdGenerator)
//! - **impls**: in-memory implementations for development and tests
//! - **retry**: bounded retry policies shared by store and analysis calls
//! - **app**: wiring (builder), dispatch, worker pool + completion barrier,
//!   synthesis, status queries

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod retry;

pub use app::{App, AppBuilder, WorkerPool};
pub use domain::{
    AggregationError, AnalysisError, DispatchError, FinalReport, QueueError, ResultStatus,
    StoreError, SubmitError, SubtaskJob, SubtaskResult, TaskId, TaskMeta, TaskStatus,
};
pub use impls::{InMemoryJobQueue, InMemoryTaskStore};
pub use retry::{RequeuePolicy, RetryPolicy};
