//! In-memory implementations of the ports (development and tests).
//!
//! Production implementations (e.g. a Redis-backed store where
//! `try_acquire_flag` becomes a server-side atomic script, a broker-backed
//! queue) belong in their own crates behind the same traits.

pub mod inmem_queue;
pub mod inmem_store;

pub use self::inmem_queue::InMemoryJobQueue;
pub use self::inmem_store::InMemoryTaskStore;
