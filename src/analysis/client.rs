//! The analysis service boundary.

use super::result::{AnalysisResult, ImagePayload, ReasoningDepth};
use async_trait::async_trait;
use thiserror::Error;

/// Failure of a single analysis call.
///
/// The monitor only ever shows the message; variants exist for logs.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// Request could not be sent or the body not read.
    #[error("analysis request failed: {0}")]
    Transport(String),
    /// Non-success HTTP status.
    #[error("analysis service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// Body was not a valid verdict.
    #[error("malformed analysis response: {0}")]
    MalformedResponse(String),
    /// The service reported an error of its own.
    #[error("analysis service error: {0}")]
    Service(String),
}

/// Remote vision-reasoning service.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Analyzes one frame against its augmented context.
    async fn analyze(
        &self,
        context: &str,
        image: &ImagePayload,
        depth: ReasoningDepth,
    ) -> Result<AnalysisResult, AnalysisError>;
}
