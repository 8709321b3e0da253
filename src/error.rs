//! Error types for the Galaxy Zoo experiment runner

use thiserror::Error;

/// Result type alias for experiment operations
pub type Result<T> = std::result::Result<T, GalaxyError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum GalaxyError {
    /// Missing or malformed input file
    #[error("Data load error: {0}")]
    DataLoad(String),

    /// Feature/label row-count mismatch or wrong matrix shape
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// A requested patch/row sample cannot be satisfied
    #[error("Insufficient {what}: requested {requested}, available {available}")]
    InsufficientSample {
        what: String,
        requested: usize,
        available: usize,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GalaxyError {
    pub(crate) fn insufficient(what: impl Into<String>, requested: usize, available: usize) -> Self {
        GalaxyError::InsufficientSample {
            what: what.into(),
            requested,
            available,
        }
    }

    pub(crate) fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        GalaxyError::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl From<polars::error::PolarsError> for GalaxyError {
    fn from(err: polars::error::PolarsError) -> Self {
        GalaxyError::DataLoad(err.to_string())
    }
}

impl From<image::ImageError> for GalaxyError {
    fn from(err: image::ImageError) -> Self {
        GalaxyError::DataLoad(err.to_string())
    }
}

impl From<serde_json::Error> for GalaxyError {
    fn from(err: serde_json::Error) -> Self {
        GalaxyError::Config(err.to_string())
    }
}

impl From<ndarray::ShapeError> for GalaxyError {
    fn from(err: ndarray::ShapeError) -> Self {
        GalaxyError::ShapeMismatch {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GalaxyError::DataLoad("missing solutions".to_string());
        assert_eq!(err.to_string(), "Data load error: missing solutions");

        let err = GalaxyError::insufficient("patches", 10, 4);
        assert_eq!(err.to_string(), "Insufficient patches: requested 10, available 4");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GalaxyError = io_err.into();
        assert!(matches!(err, GalaxyError::Io(_)));
    }
}
