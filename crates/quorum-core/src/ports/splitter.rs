//! Splitter port: decomposes a work source into subtask inputs.

use async_trait::async_trait;

use crate::domain::DispatchError;

/// Decomposes one work source (e.g. a change-set reference) into an ordered
/// sequence of opaque subtask inputs.
///
/// The returned order is canonical: the dispatcher assigns indices from it and
/// the final report is assembled in the same order.
#[async_trait]
pub trait Splitter: Send + Sync {
    async fn decompose(
        &self,
        work_source: &serde_json::Value,
    ) -> Result<Vec<serde_json::Value>, DispatchError>;
}
