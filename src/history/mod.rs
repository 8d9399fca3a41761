//! Append-only record of completed analyses.

mod ledger;

pub use ledger::{HistoryEntry, HistoryLedger, StatusCounts, TrendPoint, DEFAULT_WINDOW};
