//! Augmented context composition.

use crate::telemetry::TelemetryReading;
use chrono::{DateTime, SecondsFormat, Utc};

/// Appends the telemetry block to the operator's context text.
///
/// The block follows a blank line:
///
/// ```text
/// Temperature: 25.00 °C
/// Pressure: 101.30 kPa
/// Timestamp: 2024-05-01T12:00:00.000Z
/// ```
pub fn compose_augmented_context(
    context: &str,
    telemetry: &TelemetryReading,
    captured_at: DateTime<Utc>,
) -> String {
    format!(
        "{}\n\nTemperature: {:.2} °C\nPressure: {:.2} kPa\nTimestamp: {}",
        context,
        telemetry.temperature,
        telemetry.pressure,
        captured_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_block_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let text = compose_augmented_context(
            "Titration of HCl with NaOH",
            &TelemetryReading::new(24.987, 101.3),
            at,
        );
        assert_eq!(
            text,
            "Titration of HCl with NaOH\n\n\
             Temperature: 24.99 °C\n\
             Pressure: 101.30 kPa\n\
             Timestamp: 2024-05-01T12:00:00.000Z"
        );
    }
}
