//! Telemetry reading value type and manual-input coercion.

use serde::{Deserialize, Serialize};

/// Default starting temperature in °C.
pub const DEFAULT_TEMPERATURE: f64 = 25.0;
/// Default starting pressure in kPa.
pub const DEFAULT_PRESSURE: f64 = 101.3;

/// One temperature / pressure sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    /// Temperature in °C.
    pub temperature: f64,
    /// Pressure in kPa.
    pub pressure: f64,
}

impl TelemetryReading {
    /// Creates a reading, replacing non-finite values with 0.
    pub fn new(temperature: f64, pressure: f64) -> Self {
        Self {
            temperature: finite_or_zero(temperature),
            pressure: finite_or_zero(pressure),
        }
    }
}

impl Default for TelemetryReading {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            pressure: DEFAULT_PRESSURE,
        }
    }
}

impl std::fmt::Display for TelemetryReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} °C / {:.2} kPa", self.temperature, self.pressure)
    }
}

/// Parses user input as a number; anything unparsable or non-finite is 0.
pub fn coerce_numeric(input: &str) -> f64 {
    input
        .trim()
        .parse::<f64>()
        .map(finite_or_zero)
        .unwrap_or(0.0)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(coerce_numeric("abc"), 0.0);
        assert_eq!(coerce_numeric(""), 0.0);
        assert_eq!(coerce_numeric(" 37.5 "), 37.5);
        assert_eq!(coerce_numeric("-4"), -4.0);
        assert_eq!(coerce_numeric("NaN"), 0.0);
        assert_eq!(coerce_numeric("inf"), 0.0);
    }

    #[test]
    fn test_new_sanitizes() {
        let reading = TelemetryReading::new(f64::NAN, f64::INFINITY);
        assert_eq!(reading, TelemetryReading::new(0.0, 0.0));
    }

    #[test]
    fn test_display() {
        let reading = TelemetryReading::new(25.0, 101.325);
        assert_eq!(reading.to_string(), "25.00 °C / 101.33 kPa");
    }

    proptest! {
        #[test]
        fn coerce_never_yields_non_finite(input in ".*") {
            prop_assert!(coerce_numeric(&input).is_finite());
        }

        #[test]
        fn coerce_round_trips_finite_numbers(value in -1.0e6f64..1.0e6) {
            prop_assert_eq!(coerce_numeric(&value.to_string()), value);
        }
    }
}
