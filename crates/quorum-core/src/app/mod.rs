//! Application layer: wiring and the three pipeline stages.
//!
//! - **builder**: fail-fast construction of the [`App`] handle
//! - **dispatcher**: submit path (decompose, register, enqueue)
//! - **worker**: worker pool, job processing, completion barrier
//! - **synthesis**: the exactly-once aggregation step

pub mod builder;
pub mod dispatcher;
pub mod synthesis;
pub mod worker;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::worker::WorkerPool;
