use thiserror::Error;

/// Result type for layer operations
pub type Result<T> = std::result::Result<T, NormError>;

/// Main error type for the normalization library
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormError {
    /// Invalid construction argument (mode, weights, shape, epsilon, momentum)
    #[error("Configuration error for '{name}': {reason}")]
    Configuration {
        name: String,
        reason: String,
    },

    /// Input does not agree with the configured feature dimension
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        expected: String,
        actual: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors (file operations)
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for NormError {
    fn from(err: std::io::Error) -> Self {
        NormError::Io(err.to_string())
    }
}

impl From<bincode::Error> for NormError {
    fn from(err: bincode::Error) -> Self {
        NormError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for NormError {
    fn from(err: serde_json::Error) -> Self {
        NormError::Serialization(err.to_string())
    }
}

// Helper functions for common error patterns
impl NormError {
    pub fn configuration<S: Into<String>>(name: S, reason: S) -> Self {
        NormError::Configuration {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn shape_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        NormError::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// True for errors raised while constructing or re-configuring a layer
    pub fn is_configuration(&self) -> bool {
        matches!(self, NormError::Configuration { .. })
    }

    /// True for errors raised by a forward/backward call with a bad input shape
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, NormError::ShapeMismatch { .. })
    }
}
