//! Notifications published by the monitor.

use crate::analysis::AnalysisResult;
use crate::capture::{InputMode, UploadType};
use crate::history::HistoryEntry;
use serde::Serialize;

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Operator request.
    Manual,
    /// Armed loop tick.
    Automatic,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Manual => write!(f, "manual"),
            Trigger::Automatic => write!(f, "automatic"),
        }
    }
}

/// Why a cycle ended before reaching the analysis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another analysis was outstanding.
    InFlight,
    /// The experiment context is empty.
    MissingContext,
    /// The source had no frame to give.
    NoFrame,
    /// The loop that scheduled the cycle has since been disarmed.
    Stale,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InFlight => write!(f, "analysis in flight"),
            SkipReason::MissingContext => write!(f, "missing context"),
            SkipReason::NoFrame => write!(f, "no frame available"),
            SkipReason::Stale => write!(f, "loop disarmed"),
        }
    }
}

/// The current display state.
///
/// An error replaces the shown result but never touches history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Publication {
    /// Most recent verdict.
    Result(AnalysisResult),
    /// Most recent failure message.
    Error(String),
}

/// Result of running one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A verdict was published and recorded.
    Published(HistoryEntry),
    /// The service call failed; the message was published.
    Failed(String),
    /// Nothing was sent.
    Skipped(SkipReason),
}

impl CycleOutcome {
    /// True when the cycle produced a result or an error for the operator.
    pub fn is_published(&self) -> bool {
        !matches!(self, CycleOutcome::Skipped(_))
    }
}

/// Broadcast to every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// The loop was armed or disarmed.
    AutoMonitoringChanged(bool),
    /// A different source was selected or loaded.
    InputModeChanged {
        /// Selected input surface.
        mode: InputMode,
        /// Kind of the loaded upload.
        upload_type: Option<UploadType>,
    },
    /// A cycle ended without a request.
    CycleSkipped {
        /// Cycle origin.
        trigger: Trigger,
        /// Why it was skipped.
        reason: SkipReason,
    },
    /// A verdict was published and appended to history.
    ResultPublished {
        /// Cycle origin.
        trigger: Trigger,
        /// The recorded entry.
        entry: HistoryEntry,
    },
    /// The service call failed.
    AnalysisFailed {
        /// Cycle origin.
        trigger: Trigger,
        /// Human-readable message.
        message: String,
    },
}
