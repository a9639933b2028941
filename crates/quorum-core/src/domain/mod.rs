//! Domain model (ids, task metadata, jobs, results, errors).

pub mod errors;
pub mod ids;
pub mod job;
pub mod result;
pub mod task;

pub use self::errors::{
    AggregationError, AnalysisError, DispatchError, JobError, QueueError, StoreError, SubmitError,
};
pub use self::ids::TaskId;
pub use self::job::SubtaskJob;
pub use self::result::{FinalReport, ResultStatus, SubtaskResult};
pub use self::task::{TaskMeta, TaskStatus};
