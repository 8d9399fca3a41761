//! Lab Monitor Library
//!
//! Watches a running laboratory experiment through a camera, an uploaded
//! image or an uploaded video, pairs each frame with live telemetry and the
//! operator's description of the experiment, and asks a remote
//! vision-reasoning service for a structured verdict.
//!
//! # Architecture
//!
//! ```text
//! capture → preprocess → analysis → history
//!                ↑           ↓
//!           telemetry    monitor (events, metrics)
//! ```
//!
//! [`monitor::Monitor`] owns every component and runs capture-and-analyze
//! cycles on demand or on an armed timer. At most one analysis is in
//! flight at any time.
//!
//! # Example
//!
//! ```no_run
//! use lab_monitor::{
//!     analysis::{HttpAnalysisClient, ReasoningDepth},
//!     capture::Upload,
//!     monitor::{CycleOutcome, Monitor},
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpAnalysisClient::new("http://localhost:8080/analyze", None, None)?;
//! let monitor = Monitor::builder().client(Arc::new(client)).build();
//!
//! monitor.set_context("Titration of 0.1 M HCl with NaOH, phenolphthalein indicator");
//! monitor.set_reasoning_depth(ReasoningDepth::High);
//! monitor.select_upload(Upload::video_from_path("flask.gif")?).await?;
//!
//! if let CycleOutcome::Published(entry) = monitor.analyze_now().await {
//!     println!("{}: {}", entry.analysis.status, entry.analysis.recommendation);
//! }
//!
//! // Re-run every five seconds until disarmed
//! monitor.set_auto_monitoring(true);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod capture;
pub mod config;
pub mod history;
pub mod metrics;
pub mod monitor;
pub mod preprocess;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use analysis::{AnalysisClient, AnalysisResult, AnalysisStatus, ReasoningDepth};
pub use capture::{CaptureConfig, Frame, InputMode, MockCamera, Upload};
pub use config::FileConfig;
pub use history::{HistoryEntry, HistoryLedger};
pub use monitor::{CycleOutcome, Monitor, MonitorEvent, MonitoringSession};
pub use telemetry::{TelemetryGenerator, TelemetryReading};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
