//! Ports: abstraction seams toward external collaborators.
//!
//! Each trait hides one collaborator (store, queue, splitter, analyzer,
//! aggregator, wall clock). The app layer only talks to these traits; the
//! in-memory implementations live in `impls`, production ones in their own
//! crates.

pub mod aggregator;
pub mod analyzer;
pub mod clock;
pub mod id_generator;
pub mod job_queue;
pub mod splitter;
pub mod task_store;

pub use self::aggregator::Aggregator;
pub use self::analyzer::Analyzer;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidIdGenerator};
pub use self::job_queue::{FailureDisposition, JobLease, JobQueue};
pub use self::splitter::Splitter;
pub use self::task_store::TaskStore;
