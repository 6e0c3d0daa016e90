//! Error types for the vehicle counter

use thiserror::Error;

/// Result type alias for the vehicle counter
pub type Result<T> = std::result::Result<T, CounterError>;

#[derive(Error, Debug)]
pub enum CounterError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid detection input: {0}")]
    InvalidInput(String),

    #[error("Telemetry delivery failed: {0}")]
    TelemetryError(String),

    #[error("Tracking error: {0}")]
    TrackingError(#[from] ioutrack::TrackError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl CounterError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn telemetry<S: Into<String>>(msg: S) -> Self {
        Self::TelemetryError(msg.into())
    }
}
