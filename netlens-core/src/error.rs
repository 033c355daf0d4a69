//! Error types for netlens.
//!
//! `OracleError` is what a prediction oracle reports; `ToolkitError` is what the
//! algorithms built on top of it return.

use thiserror::Error;

/// Failure reported by a [`crate::PredictionOracle`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OracleError {
    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Invalid oracle configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation not supported by this oracle: {0}")]
    Unsupported(String),
}

impl OracleError {
    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::Prediction(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Top-level error type for toolkit operations.
#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Oracle returned no prediction for point ({x}, {y})")]
    MissingPrediction { x: f64, y: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl ToolkitError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn empty_dataset(msg: impl Into<String>) -> Self {
        Self::EmptyDataset(msg.into())
    }

    pub fn missing_prediction(x: f64, y: f64) -> Self {
        Self::MissingPrediction { x, y }
    }
}

pub type Result<T, E = ToolkitError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_error_converts() {
        let err: ToolkitError = OracleError::prediction("backend offline").into();
        assert!(matches!(err, ToolkitError::Oracle(OracleError::Prediction(_))));
        assert_eq!(
            err.to_string(),
            "Oracle error: Prediction failed: backend offline"
        );
    }

    #[test]
    fn test_missing_prediction_message() {
        let err = ToolkitError::missing_prediction(0.5, -1.0);
        assert_eq!(
            err.to_string(),
            "Oracle returned no prediction for point (0.5, -1)"
        );
    }
}
