//! Analyzer port: processes one subtask input.

use async_trait::async_trait;

use crate::domain::AnalysisError;

/// Runs the external analysis for one subtask input and returns its findings
/// payload. Opaque to the core: no file format or model specifics leak in.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn run(&self, input_ref: &serde_json::Value) -> Result<serde_json::Value, AnalysisError>;
}
