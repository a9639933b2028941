//! Id generation port.
//!
//! Abstracted behind a trait so tests can mint predictable ids; the default
//! implementation builds ULIDs from the injected clock plus randomness, so a
//! `FixedClock` still yields unique ids with a deterministic timestamp part.

use ulid::Ulid;

use crate::domain::TaskId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn next_task_id(&self) -> TaskId;
}

/// ULID-based generator: time-sortable, coordination-free.
pub struct UlidIdGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidIdGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidIdGenerator<C> {
    fn next_task_id(&self) -> TaskId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        TaskId::from_ulid(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
