//! Monitoring orchestration.
//!
//! [`Monitor`] ties the frame sources, preprocessing, telemetry and the
//! analysis client into capture-and-analyze cycles, either on demand or on
//! an armed recurring timer.
//!
//! # Example
//!
//! ```no_run
//! use lab_monitor::capture::Upload;
//! use lab_monitor::monitor::Monitor;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let monitor = Monitor::builder().build();
//! monitor.set_context("Titration of 0.1 M HCl with NaOH");
//! monitor.select_upload(Upload::from_path("flask.jpg")?).await?;
//!
//! let outcome = monitor.analyze_now().await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod clock;
mod config;
mod controller;
mod events;
mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MonitorConfig, MonitorConfigError};
pub use controller::{Monitor, MonitorBuilder, MonitorError};
pub use events::{CycleOutcome, MonitorEvent, Publication, SkipReason, Trigger};
pub use session::MonitoringSession;
