use std::fmt;

/// Result type for tandem operations
pub type Result<T> = std::result::Result<T, TandemError>;

/// Main error type for the tandem library
#[derive(Debug, Clone, PartialEq)]
pub enum TandemError {
    /// Vector or model sizes disagree
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// IO errors (file operations)
    Io(String),

    /// Serialization/deserialization errors
    Serialization(String),

    /// Numerical computation errors
    Numerical(String),

    /// Empty buffer or dataset
    EmptyBuffer(String),

    /// The environment could not provide a state or execute an action.
    /// Always transient: the control loop skips the tick.
    EnvironmentUnavailable(String),

    /// A background thread is already running
    AlreadyRunning(String),

    /// The optimizer reported an internal failure
    Optimization(String),

    /// A background thread panicked and its state is lost
    ThreadPanicked(String),

    /// Saving or loading one of the persisted artifacts failed
    Persistence {
        artifact: String,
        reason: String,
    },
}

impl fmt::Display for TandemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TandemError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            TandemError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            TandemError::Io(msg) => write!(f, "IO error: {}", msg),
            TandemError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            TandemError::Numerical(msg) => write!(f, "Numerical error: {}", msg),
            TandemError::EmptyBuffer(msg) => write!(f, "Empty buffer: {}", msg),
            TandemError::EnvironmentUnavailable(msg) => {
                write!(f, "Environment unavailable: {}", msg)
            }
            TandemError::AlreadyRunning(what) => write!(f, "{} is already running", what),
            TandemError::Optimization(msg) => write!(f, "Optimization error: {}", msg),
            TandemError::ThreadPanicked(what) => write!(f, "{} thread panicked", what),
            TandemError::Persistence { artifact, reason } => {
                write!(f, "Persisting '{}' failed: {}", artifact, reason)
            }
        }
    }
}

impl std::error::Error for TandemError {}

impl From<std::io::Error> for TandemError {
    fn from(err: std::io::Error) -> Self {
        TandemError::Io(err.to_string())
    }
}

impl From<bincode::Error> for TandemError {
    fn from(err: bincode::Error) -> Self {
        TandemError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for TandemError {
    fn from(err: serde_json::Error) -> Self {
        TandemError::Serialization(err.to_string())
    }
}

// Helper functions for common error patterns
impl TandemError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        TandemError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        TandemError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn persistence<S: Into<String>>(artifact: S, reason: S) -> Self {
        TandemError::Persistence {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }

    /// True for failures the control loop recovers from by skipping a tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, TandemError::EnvironmentUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        let err = TandemError::dimension_mismatch("4 inputs", "3 inputs");
        assert_eq!(err.to_string(), "Dimension mismatch: expected 4 inputs, got 3 inputs");

        let err = TandemError::persistence("model-q", "disk full");
        assert_eq!(err.to_string(), "Persisting 'model-q' failed: disk full");
    }

    #[test]
    fn test_transient_classification() {
        assert!(TandemError::EnvironmentUnavailable("no state".into()).is_transient());
        assert!(!TandemError::Optimization("nan".into()).is_transient());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: TandemError = io.into();
        assert!(matches!(err, TandemError::Io(_)));
    }
}
