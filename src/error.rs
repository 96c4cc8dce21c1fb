//! Error types for the tsboost pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while assembling data, building features,
/// training, or predicting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Duplicate (series id, timestamp) key in an input table.
    #[error("duplicate key: series {id} at {timestamp}")]
    DuplicateKey { id: String, timestamp: String },

    /// Two distinct column names collide after sanitization.
    #[error("column name collision after sanitization: {0}")]
    ColumnCollision(String),

    /// Unknown column referenced.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// Frequency code is not part of the closed registry.
    #[error("unsupported frequency code: {0}")]
    UnsupportedFrequency(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// Computation error (e.g. numerical issues, empty training set).
    #[error("computation error: {0}")]
    ComputationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = ForecastError::EmptyData;
        assert_eq!(err.to_string(), "empty input data");

        let err = ForecastError::InsufficientData { needed: 28, got: 5 };
        assert_eq!(err.to_string(), "insufficient data: need at least 28, got 5");

        let err = ForecastError::DuplicateKey {
            id: "sku_1".to_string(),
            timestamp: "2024-01-01".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate key: series sku_1 at 2024-01-01");

        let err = ForecastError::UnsupportedFrequency("M".to_string());
        assert_eq!(err.to_string(), "unsupported frequency code: M");
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = ForecastError::FitRequired;
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
