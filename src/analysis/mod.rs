//! Frame analysis through a remote vision-reasoning service.
//!
//! The monitor talks to the service only through [`AnalysisClient`]. The
//! HTTP adapter is the production implementation; the mock serves tests
//! and offline runs.

mod client;
mod context;
mod http;
mod mock;
mod result;

pub use client::{AnalysisClient, AnalysisError};
pub use context::compose_augmented_context;
pub use http::{parse_analysis_body, AnalysisServiceConfig, HttpAnalysisClient};
pub use mock::{MockAnalysisClient, RecordedRequest};
pub use result::{AnalysisResult, AnalysisStatus, ImagePayload, ReasoningDepth};
