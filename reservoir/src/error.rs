use std::path::PathBuf;

use lin_reg::LinRegError;
use thiserror::Error;

/// Result type alias for reservoir operations
pub type Result<T> = std::result::Result<T, ReservoirError>;

/// Errors that can occur while building, driving or persisting a reservoir model
#[derive(Debug, Error)]
pub enum ReservoirError {
    /// Hyperparameters outside of their valid range
    #[error("invalid hyperparameters: {reason}")]
    InvalidHyperparameters { reason: String },

    /// A vector or matrix has the wrong length for where it is used
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The eigenvalue solver failed or the matrix cannot be normalized
    #[error("cannot normalize adjacency matrix: {reason}")]
    SpectralRadius { reason: String },

    /// The wrapped regressor failed
    #[error("regressor failed: {0}")]
    Regressor(#[from] LinRegError),

    /// Reading or writing model files failed
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A model file is not valid JSON of the expected shape
    #[error("malformed JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Persisted matrices are inconsistent
    #[error("corrupt model data: {reason}")]
    Format { reason: String },

    /// The training data cannot be used
    #[error("cannot train: {reason}")]
    Training { reason: String },
}
