//! Configuration file format.
//!
//! Every section and field is optional; missing values take their
//! defaults.
//!
//! ```toml
//! [capture]
//! ideal_width = 1920
//! ideal_height = 1080
//!
//! [telemetry]
//! mode = "auto"
//! tick_ms = 1000
//! max_drift = 0.1
//!
//! [monitor]
//! interval_secs = 5
//! reasoning_depth = "LOW"
//! context = "Titration of 0.1 M HCl with NaOH"
//!
//! [preprocess]
//! contrast = 20.0
//!
//! [analysis]
//! endpoint = "http://localhost:8080/analyze"
//! timeout_secs = 60
//!
//! [output]
//! metrics_port = 9090
//! ```

use crate::analysis::AnalysisServiceConfig;
use crate::capture::{CaptureConfig, CaptureConfigError};
use crate::monitor::{MonitorConfig, MonitorConfigError};
use crate::preprocess::PreprocessConfig;
use crate::telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration loading and validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
    #[error("invalid capture settings: {0}")]
    Capture(#[from] CaptureConfigError),
    #[error("invalid monitor settings: {0}")]
    Monitor(#[from] MonitorConfigError),
    #[error("invalid telemetry settings: {0}")]
    Telemetry(String),
    #[error("invalid preprocess settings: {0}")]
    Preprocess(String),
    #[error("invalid analysis settings: {0}")]
    Analysis(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Camera settings.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Telemetry simulation.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Monitoring loop.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Frame enhancement.
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    /// Analysis service connection.
    #[serde(default)]
    pub analysis: AnalysisServiceConfig,
    /// Output and exporters.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
    /// Print history entries as JSON instead of text.
    pub json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            json: false,
        }
    }
}

impl FileConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.monitor.validate()?;

        let telemetry = &self.telemetry;
        if telemetry.tick_ms == 0 {
            return Err(ConfigError::Telemetry("tick_ms must be non-zero".into()));
        }
        if !telemetry.max_drift.is_finite() || telemetry.max_drift < 0.0 {
            return Err(ConfigError::Telemetry(format!(
                "max_drift must be a non-negative number, got {}",
                telemetry.max_drift
            )));
        }

        let preprocess = &self.preprocess;
        if preprocess.jpeg_quality == 0 || preprocess.jpeg_quality > 100 {
            return Err(ConfigError::Preprocess(format!(
                "jpeg_quality {} must be 1-100",
                preprocess.jpeg_quality
            )));
        }
        if !preprocess.saturation.is_finite() || preprocess.saturation < 0.0 {
            return Err(ConfigError::Preprocess("saturation must be non-negative".into()));
        }
        if !preprocess.blur_sigma.is_finite() || preprocess.blur_sigma < 0.0 {
            return Err(ConfigError::Preprocess("blur_sigma must be non-negative".into()));
        }
        if !preprocess.contrast.is_finite() {
            return Err(ConfigError::Preprocess("contrast must be finite".into()));
        }

        if let Some(endpoint) = &self.analysis.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigError::Analysis(format!(
                    "endpoint '{endpoint}' must be an http(s) URL"
                )));
            }
        }
        Ok(())
    }
}
