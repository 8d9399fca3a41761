//! Simulated telemetry feed.
//!
//! In automatic mode the reading takes a bounded random walk: every tick
//! temperature and pressure each move by an independent uniform delta in
//! `[-max_drift, +max_drift]`. In manual mode nothing ticks and the values
//! only change through the manual setters.

use super::reading::{coerce_numeric, TelemetryReading, DEFAULT_PRESSURE, DEFAULT_TEMPERATURE};
use parking_lot::Mutex;
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

/// How the reading is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryMode {
    /// Random-walk simulation on a timer.
    #[default]
    Auto,
    /// Values entered by the operator.
    Manual,
}

/// Telemetry simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Mode applied when the monitor starts.
    pub mode: TelemetryMode,
    /// Tick period in milliseconds.
    pub tick_ms: u64,
    /// Largest per-tick change of each value.
    pub max_drift: f64,
    /// Starting temperature in °C.
    pub initial_temperature: f64,
    /// Starting pressure in kPa.
    pub initial_pressure: f64,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            mode: TelemetryMode::Auto,
            tick_ms: 1000,
            max_drift: 0.1,
            initial_temperature: DEFAULT_TEMPERATURE,
            initial_pressure: DEFAULT_PRESSURE,
            seed: None,
        }
    }
}

struct State {
    reading: TelemetryReading,
    mode: TelemetryMode,
    rng: ChaCha8Rng,
    ticks: u64,
}

impl State {
    fn drift(&mut self, max_drift: f64) -> TelemetryReading {
        let dt = symmetric_unit(&mut self.rng) * max_drift;
        let dp = symmetric_unit(&mut self.rng) * max_drift;
        self.reading.temperature += dt;
        self.reading.pressure += dp;
        self.ticks += 1;
        self.reading
    }
}

/// Uniform sample in `[-1, 1)`.
fn symmetric_unit(rng: &mut ChaCha8Rng) -> f64 {
    let unit = (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
    unit * 2.0 - 1.0
}

/// Produces the live telemetry reading.
///
/// The tick task only holds the shared reading, never the generator, and
/// is aborted whenever automatic mode is left or the generator dropped.
pub struct TelemetryGenerator {
    state: Arc<Mutex<State>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    period: Duration,
    max_drift: f64,
}

impl TelemetryGenerator {
    /// Creates a stopped generator in manual mode.
    ///
    /// Call [`set_mode`](Self::set_mode) to apply the configured mode.
    pub fn new(config: &TelemetryConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            state: Arc::new(Mutex::new(State {
                reading: TelemetryReading::new(config.initial_temperature, config.initial_pressure),
                mode: TelemetryMode::Manual,
                rng,
                ticks: 0,
            })),
            ticker: Mutex::new(None),
            period: Duration::from_millis(config.tick_ms.max(1)),
            max_drift: config.max_drift.abs(),
        }
    }

    /// Current mode.
    pub fn mode(&self) -> TelemetryMode {
        self.state.lock().mode
    }

    /// Switches mode, starting or stopping the tick task.
    ///
    /// Selecting the current mode is a no-op. Must be called from within a
    /// tokio runtime when switching to [`TelemetryMode::Auto`].
    pub fn set_mode(&self, mode: TelemetryMode) {
        let mut ticker = self.ticker.lock();
        {
            let mut state = self.state.lock();
            if state.mode == mode && (mode == TelemetryMode::Manual || ticker.is_some()) {
                return;
            }
            state.mode = mode;
        }

        if let Some(handle) = ticker.take() {
            handle.abort();
        }

        if mode == TelemetryMode::Auto {
            let state = Arc::clone(&self.state);
            let period = self.period;
            let max_drift = self.max_drift;
            *ticker = Some(tokio::spawn(async move {
                let mut interval = interval_at(Instant::now() + period, period);
                loop {
                    interval.tick().await;
                    let reading = state.lock().drift(max_drift);
                    tracing::trace!(
                        temperature = reading.temperature,
                        pressure = reading.pressure,
                        "telemetry tick"
                    );
                }
            }));
        }
        tracing::debug!(?mode, "telemetry mode changed");
    }

    /// True while a tick task is scheduled.
    pub fn is_ticking(&self) -> bool {
        self.ticker.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Returns the current reading by value.
    pub fn snapshot(&self) -> TelemetryReading {
        self.state.lock().reading
    }

    /// Number of drift steps applied so far.
    pub fn tick_count(&self) -> u64 {
        self.state.lock().ticks
    }

    /// Applies one drift step immediately.
    pub fn tick(&self) -> TelemetryReading {
        self.state.lock().drift(self.max_drift)
    }

    /// Overwrites both values.
    pub fn set_manual_reading(&self, reading: TelemetryReading) {
        self.state.lock().reading = TelemetryReading::new(reading.temperature, reading.pressure);
    }

    /// Sets temperature from operator input, coercing junk to 0.
    pub fn set_temperature_input(&self, input: &str) -> f64 {
        let value = coerce_numeric(input);
        self.state.lock().reading.temperature = value;
        value
    }

    /// Sets pressure from operator input, coercing junk to 0.
    pub fn set_pressure_input(&self, input: &str) -> f64 {
        let value = coerce_numeric(input);
        self.state.lock().reading.pressure = value;
        value
    }

    /// Stops ticking without changing the recorded mode.
    pub fn stop(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for TelemetryGenerator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> TelemetryGenerator {
        TelemetryGenerator::new(&TelemetryConfig {
            seed: Some(7),
            ..Default::default()
        })
    }

    #[test]
    fn test_drift_is_bounded() {
        let generator = seeded();
        let mut previous = generator.snapshot();
        for _ in 0..1000 {
            let next = generator.tick();
            assert!((next.temperature - previous.temperature).abs() <= 0.1);
            assert!((next.pressure - previous.pressure).abs() <= 0.1);
            previous = next;
        }
        assert_eq!(generator.tick_count(), 1000);
    }

    #[test]
    fn test_seeded_walk_is_reproducible() {
        let a = seeded();
        let b = seeded();
        for _ in 0..10 {
            assert_eq!(a.tick(), b.tick());
        }
    }

    #[test]
    fn test_manual_input_coerces() {
        let generator = seeded();
        assert_eq!(generator.set_temperature_input("abc"), 0.0);
        assert_eq!(generator.set_pressure_input("99.5"), 99.5);
        assert_eq!(generator.snapshot(), TelemetryReading::new(0.0, 99.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_mode_ticks_every_period() {
        let generator = seeded();
        generator.set_mode(TelemetryMode::Auto);
        assert!(generator.is_ticking());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(generator.tick_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_mode_stops_ticking() {
        let generator = seeded();
        generator.set_mode(TelemetryMode::Auto);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(generator.tick_count(), 1);

        generator.set_mode(TelemetryMode::Manual);
        assert!(!generator.is_ticking());
        let frozen = generator.snapshot();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(generator.tick_count(), 1);
        assert_eq!(generator.snapshot(), frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reentering_auto_creates_single_ticker() {
        let generator = seeded();
        generator.set_mode(TelemetryMode::Auto);
        generator.set_mode(TelemetryMode::Auto);
        generator.set_mode(TelemetryMode::Manual);
        generator.set_mode(TelemetryMode::Auto);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        // One ticker means one step per period
        assert_eq!(generator.tick_count(), 2);
    }
}
