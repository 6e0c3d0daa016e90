//! Error types for the tracking core

use thiserror::Error;

/// Result type alias for the tracking core
pub type Result<T> = std::result::Result<T, TrackError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("innovation covariance is not positive definite")]
    SingularInnovation,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TrackError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
