//! Aggregator port: consolidates all subtask payloads into the final report.

use async_trait::async_trait;

use crate::domain::AggregationError;

/// Summarizes the ordered subtask payloads into one final report payload.
///
/// Payloads arrive in dispatch-index order, never arrival order. Degraded
/// payloads are not marked specially by this contract; they carry the
/// analysis error string, so an implementation *can* notice them, but is not
/// required to treat them differently.
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn summarize(
        &self,
        payloads: &[serde_json::Value],
    ) -> Result<serde_json::Value, AggregationError>;
}
