//! Analysis verdict and request-side value types.

use crate::capture::Frame;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Overall verdict of one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnalysisStatus {
    /// Experiment proceeding as expected.
    #[serde(alias = "normal", alias = "Normal")]
    Normal,
    /// Something needs attention.
    #[serde(alias = "warning", alias = "Warning")]
    Warning,
    /// Immediate intervention required.
    #[serde(alias = "critical", alias = "Critical")]
    Critical,
}

impl AnalysisStatus {
    /// Numeric severity (0 normal, 1 warning, 2 critical).
    pub fn severity(self) -> u8 {
        match self {
            AnalysisStatus::Normal => 0,
            AnalysisStatus::Warning => 1,
            AnalysisStatus::Critical => 2,
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisStatus::Normal => write!(f, "NORMAL"),
            AnalysisStatus::Warning => write!(f, "WARNING"),
            AnalysisStatus::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Structured verdict returned by the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Overall status.
    pub status: AnalysisStatus,
    /// What is visible in the frame.
    pub observation: String,
    /// What the observation implies given the context.
    pub deduction: String,
    /// Suggested next action.
    pub recommendation: String,
}

/// How much reasoning the service should spend on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReasoningDepth {
    /// Fast, shallow analysis.
    #[default]
    Low,
    /// Slower, deeper analysis.
    High,
}

impl ReasoningDepth {
    /// Reasoning budget in tokens the service is asked to use.
    pub fn reasoning_budget(self) -> u32 {
        match self {
            ReasoningDepth::Low => 1024,
            ReasoningDepth::High => 8192,
        }
    }
}

impl FromStr for ReasoningDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(ReasoningDepth::Low),
            "high" => Ok(ReasoningDepth::High),
            other => Err(format!("unknown reasoning depth '{other}' (expected low or high)")),
        }
    }
}

impl std::fmt::Display for ReasoningDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReasoningDepth::Low => write!(f, "LOW"),
            ReasoningDepth::High => write!(f, "HIGH"),
        }
    }
}

/// A frame in the canonical form sent to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// MIME type of the encoded image.
    pub mime_type: String,
    /// Base64 of the encoded image, without any data-URL prefix.
    pub data: String,
}

impl ImagePayload {
    /// Encodes a frame.
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            mime_type: frame.mime_type().to_string(),
            data: frame.to_base64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&AnalysisStatus::Critical).unwrap(),
            "\"CRITICAL\""
        );
        let status: AnalysisStatus = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(status, AnalysisStatus::Warning);
    }

    #[test]
    fn test_depth_parse() {
        assert_eq!("HIGH".parse::<ReasoningDepth>().unwrap(), ReasoningDepth::High);
        assert_eq!(" low".parse::<ReasoningDepth>().unwrap(), ReasoningDepth::Low);
        assert!("medium".parse::<ReasoningDepth>().is_err());
        assert!(ReasoningDepth::High.reasoning_budget() > ReasoningDepth::Low.reasoning_budget());
    }

    #[test]
    fn test_severity_orders_statuses() {
        assert!(AnalysisStatus::Critical > AnalysisStatus::Warning);
        assert_eq!(AnalysisStatus::Warning.severity(), 1);
    }
}
