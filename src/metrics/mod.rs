//! Prometheus metrics for the monitoring loop.
//!
//! # Metrics Exposed
//!
//! ## Loop Counters
//! - `lab_monitor_cycles_started_total` - Requests sent to the analysis service
//! - `lab_monitor_cycles_completed_total` - Requests that produced a verdict
//! - `lab_monitor_cycles_failed_total` - Requests that failed
//! - `lab_monitor_cycles_skipped_total` - Cycles that ended without a request
//!
//! ## Session Gauges
//! - `lab_monitor_analysis_in_flight` - 1 while an analysis is outstanding
//! - `lab_monitor_auto_monitoring` - 1 while the recurring loop is armed
//! - `lab_monitor_history_entries` - History ledger length
//! - `lab_monitor_last_status` - Latest verdict (0=normal, 1=warning, 2=critical)
//!
//! ## Telemetry Gauges
//! - `lab_monitor_temperature_celsius` - Live temperature
//! - `lab_monitor_pressure_kpa` - Live pressure
//!
//! # Example
//!
//! ```no_run
//! use lab_monitor::metrics::MetricsRegistry;
//! use lab_monitor::monitor::Monitor;
//!
//! # async fn run() {
//! let monitor = Monitor::builder().build();
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! registry.update(&monitor.metrics_snapshot());
//! println!("{}", registry.encode().unwrap());
//! # }
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsHandle, MetricsServer, MetricsServerConfig, ServerError};
