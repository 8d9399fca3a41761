//! The history ledger.
//!
//! Entries are only ever appended. Timestamps are non-decreasing in ledger
//! order; an entry stamped earlier than its predecessor is raised to the
//! predecessor's timestamp on append.

use crate::analysis::{AnalysisResult, AnalysisStatus};
use crate::telemetry::TelemetryReading;
use serde::Serialize;

/// Default size of the recent-trend window.
pub const DEFAULT_WINDOW: usize = 20;

/// One completed analysis with the telemetry it was composed with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Completion time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Telemetry snapshot taken when the request was composed.
    pub telemetry: TelemetryReading,
    /// The verdict.
    pub analysis: AnalysisResult,
}

/// One point of the trend view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Temperature in °C.
    pub temperature: f64,
    /// Pressure in kPa.
    pub pressure: f64,
    /// Verdict status.
    pub status: AnalysisStatus,
}

/// Number of entries per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// NORMAL entries.
    pub normal: usize,
    /// WARNING entries.
    pub warning: usize,
    /// CRITICAL entries.
    pub critical: usize,
}

/// Ordered sequence of [`HistoryEntry`].
#[derive(Debug, Clone, Default)]
pub struct HistoryLedger {
    entries: Vec<HistoryEntry>,
}

impl HistoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its stored timestamp.
    pub fn append(&mut self, mut entry: HistoryEntry) -> i64 {
        if let Some(last) = self.entries.last() {
            if entry.timestamp < last.timestamp {
                tracing::debug!(
                    given = entry.timestamp,
                    last = last.timestamp,
                    "raising out-of-order history timestamp"
                );
                entry.timestamp = last.timestamp;
            }
        }
        let timestamp = entry.timestamp;
        self.entries.push(entry);
        timestamp
    }

    /// Last `n` entries, oldest first.
    pub fn recent_window(&self, n: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Every entry, newest first.
    pub fn newest_first(&self) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries.iter().rev()
    }

    /// Trend points for the last `n` entries, oldest first.
    pub fn trend(&self, n: usize) -> Vec<TrendPoint> {
        self.recent_window(n)
            .iter()
            .map(|entry| TrendPoint {
                timestamp: entry.timestamp,
                temperature: entry.telemetry.temperature,
                pressure: entry.telemetry.pressure,
                status: entry.analysis.status,
            })
            .collect()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tally of entries by status.
    pub fn status_counts(&self) -> StatusCounts {
        self.entries
            .iter()
            .fold(StatusCounts::default(), |mut counts, entry| {
                match entry.analysis.status {
                    AnalysisStatus::Normal => counts.normal += 1,
                    AnalysisStatus::Warning => counts.warning += 1,
                    AnalysisStatus::Critical => counts.critical += 1,
                }
                counts
            })
    }
}
