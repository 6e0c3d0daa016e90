//! Configuration types for the tracker and the crossing counter
use crate::error::{Result, TrackError};
use serde::{Deserialize, Serialize};

/// Configuration for the SORT-style tracker
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Frames a track may go unmatched before it is retired
    pub max_age: u32,
    /// Consecutive matches before a track is confirmed and exposed
    pub min_hits: u32,
    /// Minimum IoU for a track/detection pair to count as a match
    pub iou_threshold: f32,
    /// Measurement noise covariance diagonal (x, y, area, aspect)
    pub measurement_noise: [f32; 4],
    /// Process noise covariance diagonal (x, y, area, aspect, dx, dy, darea)
    pub process_noise: [f32; 7],
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 20,
            min_hits: 3,
            iou_threshold: 0.3,
            measurement_noise: [1.0, 1.0, 10.0, 10.0],
            process_noise: [1.0, 1.0, 1.0, 1.0, 0.01, 0.01, 0.0001],
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_hits == 0 {
            return Err(TrackError::config("min_hits must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(TrackError::config(format!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            )));
        }
        if self
            .measurement_noise
            .iter()
            .chain(self.process_noise.iter())
            .any(|v| !v.is_finite() || *v <= 0.0)
        {
            return Err(TrackError::config(
                "noise covariances must be finite and strictly positive",
            ));
        }
        Ok(())
    }
}

/// A horizontal reference line placed at `ratio` of the frame height
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineConfig {
    pub name: String,
    pub ratio: f64,
}

impl LineConfig {
    pub fn new<S: Into<String>>(name: S, ratio: f64) -> Self {
        Self {
            name: name.into(),
            ratio,
        }
    }
}

/// How crossings are credited
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountingMode {
    /// Every line credits Up or Down from an observed side change
    #[default]
    Directional,
    /// First line counts Up when the centre is above it, second line counts
    /// Down when the centre is below it
    Legacy,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountingConfig {
    pub lines: Vec<LineConfig>,
    pub mode: CountingMode,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            lines: vec![LineConfig::new("up", 0.10), LineConfig::new("down", 0.15)],
            mode: CountingMode::Directional,
        }
    }
}

impl CountingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lines.is_empty() {
            return Err(TrackError::config("at least one counting line is required"));
        }
        if self.mode == CountingMode::Legacy && self.lines.len() != 2 {
            return Err(TrackError::config(format!(
                "legacy counting needs exactly two lines, got {}",
                self.lines.len()
            )));
        }
        if let Some(line) = self
            .lines
            .iter()
            .find(|l| !(0.0..=1.0).contains(&l.ratio))
        {
            return Err(TrackError::config(format!(
                "line '{}' ratio {} is outside [0, 1]",
                line.name, line.ratio
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(TrackerConfig::default().validate().is_ok());
        assert!(CountingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_tracker_values() {
        let config = TrackerConfig {
            min_hits: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            iou_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.measurement_noise[2] = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_counting_values() {
        let config = CountingConfig {
            lines: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CountingConfig {
            lines: vec![LineConfig::new("only", 0.5)],
            mode: CountingMode::Legacy,
        };
        assert!(config.validate().is_err());

        let config = CountingConfig {
            lines: vec![LineConfig::new("below", 1.2)],
            mode: CountingMode::Directional,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrackerConfig = serde_json::from_str(r#"{ "max_age": 5 }"#).unwrap();
        assert_eq!(config.max_age, 5);
        assert_eq!(config.min_hits, 3);

        let counting: CountingConfig = serde_json::from_str(r#"{ "mode": "legacy" }"#).unwrap();
        assert_eq!(counting.mode, CountingMode::Legacy);
        assert_eq!(counting.lines.len(), 2);
    }
}
