//! Live temperature / pressure telemetry.
//!
//! Every analysis request carries the reading current at the moment its
//! context is composed. The generator simulates a drifting feed or holds
//! operator-entered values.

mod generator;
mod reading;

pub use generator::{TelemetryConfig, TelemetryGenerator, TelemetryMode};
pub use reading::{coerce_numeric, TelemetryReading, DEFAULT_PRESSURE, DEFAULT_TEMPERATURE};
