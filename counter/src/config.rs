//! Application configuration, loaded from a JSON file

use crate::error::{CounterError, Result};
use crate::filter::DetectionFilter;
use ioutrack::{CountingConfig, TrackerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Periodic summary settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Length of one aggregation window in seconds
    pub window_secs: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self { window_secs: 60 }
    }
}

/// Counter update delivery settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// HTTP endpoint receiving counter updates; none disables HTTP delivery
    pub endpoint: Option<String>,
    /// Device status URL checked once at startup. When set and unreachable,
    /// HTTP delivery is skipped for the whole run.
    pub status_endpoint: Option<String>,
    /// Per-request timeout
    pub timeout_ms: u64,
    /// Updates buffered before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            status_endpoint: None,
            timeout_ms: 1000,
            queue_capacity: 64,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub counting: CountingConfig,
    pub filter: DetectionFilter,
    pub summary: SummaryConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load and validate a JSON config file. Missing sections take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: AppConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tracker.validate()?;
        self.counting.validate()?;

        if !(0.0..=1.0).contains(&self.filter.min_confidence) {
            return Err(CounterError::config(format!(
                "min_confidence must be within [0, 1], got {}",
                self.filter.min_confidence
            )));
        }
        if self.summary.window_secs == 0 {
            return Err(CounterError::config("summary window must be at least 1 second"));
        }
        if self.telemetry.queue_capacity == 0 {
            return Err(CounterError::config("telemetry queue capacity must be positive"));
        }
        if self.telemetry.timeout_ms == 0 {
            return Err(CounterError::config("telemetry timeout must be positive"));
        }
        Ok(())
    }
}
