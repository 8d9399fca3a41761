//! Metrics collection and registry.

use crate::analysis::AnalysisStatus;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of monitor state for metrics update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Requests sent to the analysis service.
    pub cycles_started: u64,
    /// Requests that produced a verdict.
    pub cycles_completed: u64,
    /// Requests that failed.
    pub cycles_failed: u64,
    /// Cycles that ended before sending a request.
    pub cycles_skipped: u64,
    /// Whether an analysis is outstanding.
    pub analysis_in_flight: bool,
    /// Whether the recurring loop is armed.
    pub auto_monitoring: bool,
    /// History ledger length.
    pub history_entries: usize,
    /// Live temperature in °C.
    pub temperature: f64,
    /// Live pressure in kPa.
    pub pressure: f64,
    /// Status of the latest recorded verdict.
    pub last_status: Option<AnalysisStatus>,
}

/// Prometheus metrics registry for the monitoring loop.
pub struct MetricsRegistry {
    registry: Registry,

    // Loop counters
    cycles_started: IntCounter,
    cycles_completed: IntCounter,
    cycles_failed: IntCounter,
    cycles_skipped: IntCounter,

    // Session gauges
    analysis_in_flight: IntGauge,
    auto_monitoring: IntGauge,
    history_entries: IntGauge,
    last_status: IntGauge,

    // Telemetry gauges
    temperature: Gauge,
    pressure: Gauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all monitor metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let cycles_started = IntCounter::new(
            "lab_monitor_cycles_started_total",
            "Analysis requests sent to the service",
        )?;
        let cycles_completed = IntCounter::new(
            "lab_monitor_cycles_completed_total",
            "Analysis requests that produced a verdict",
        )?;
        let cycles_failed = IntCounter::new(
            "lab_monitor_cycles_failed_total",
            "Analysis requests that failed",
        )?;
        let cycles_skipped = IntCounter::new(
            "lab_monitor_cycles_skipped_total",
            "Cycles that ended without sending a request",
        )?;

        let analysis_in_flight = IntGauge::new(
            "lab_monitor_analysis_in_flight",
            "Whether an analysis request is outstanding (1=yes, 0=no)",
        )?;
        let auto_monitoring = IntGauge::new(
            "lab_monitor_auto_monitoring",
            "Whether the recurring loop is armed (1=armed, 0=idle)",
        )?;
        let history_entries = IntGauge::new(
            "lab_monitor_history_entries",
            "Number of entries in the history ledger",
        )?;
        let last_status = IntGauge::new(
            "lab_monitor_last_status",
            "Status of the latest verdict (0=normal, 1=warning, 2=critical)",
        )?;

        let temperature = Gauge::new(
            "lab_monitor_temperature_celsius",
            "Live temperature reading in degrees Celsius",
        )?;
        let pressure = Gauge::new(
            "lab_monitor_pressure_kpa",
            "Live pressure reading in kilopascals",
        )?;

        registry.register(Box::new(cycles_started.clone()))?;
        registry.register(Box::new(cycles_completed.clone()))?;
        registry.register(Box::new(cycles_failed.clone()))?;
        registry.register(Box::new(cycles_skipped.clone()))?;
        registry.register(Box::new(analysis_in_flight.clone()))?;
        registry.register(Box::new(auto_monitoring.clone()))?;
        registry.register(Box::new(history_entries.clone()))?;
        registry.register(Box::new(last_status.clone()))?;
        registry.register(Box::new(temperature.clone()))?;
        registry.register(Box::new(pressure.clone()))?;

        Ok(Self {
            registry,
            cycles_started,
            cycles_completed,
            cycles_failed,
            cycles_skipped,
            analysis_in_flight,
            auto_monitoring,
            history_entries,
            last_status,
            temperature,
            pressure,
        })
    }

    /// Updates all metrics from a snapshot of monitor state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        // Counters only move forward, by the difference
        advance(&self.cycles_started, snapshot.cycles_started);
        advance(&self.cycles_completed, snapshot.cycles_completed);
        advance(&self.cycles_failed, snapshot.cycles_failed);
        advance(&self.cycles_skipped, snapshot.cycles_skipped);

        self.analysis_in_flight
            .set(i64::from(snapshot.analysis_in_flight));
        self.auto_monitoring.set(i64::from(snapshot.auto_monitoring));
        self.history_entries.set(snapshot.history_entries as i64);
        if let Some(status) = snapshot.last_status {
            self.last_status.set(i64::from(status.severity()));
        }

        self.temperature.set(snapshot.temperature);
        self.pressure.set(snapshot.pressure);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            cycles_started: 4,
            cycles_completed: 3,
            cycles_failed: 1,
            cycles_skipped: 2,
            analysis_in_flight: true,
            auto_monitoring: true,
            history_entries: 3,
            temperature: 25.5,
            pressure: 101.25,
            last_status: Some(AnalysisStatus::Critical),
        };

        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("lab_monitor_cycles_started_total 4"));
        assert!(output.contains("lab_monitor_analysis_in_flight 1"));
        assert!(output.contains("lab_monitor_last_status 2"));
        assert!(output.contains("lab_monitor_temperature_celsius 25.5"));
    }

    #[test]
    fn test_counters_never_decrease() {
        let registry = MetricsRegistry::new().unwrap();
        registry.update(&MetricsSnapshot {
            cycles_completed: 5,
            ..Default::default()
        });
        registry.update(&MetricsSnapshot {
            cycles_completed: 2,
            ..Default::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("lab_monitor_cycles_completed_total 5"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("lab_monitor_cycles_skipped_total"));
        assert!(output.contains("lab_monitor_auto_monitoring"));
        assert!(output.contains("lab_monitor_pressure_kpa"));
    }
}
