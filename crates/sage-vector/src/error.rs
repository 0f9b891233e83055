//! Error types for sage-vector.

use thiserror::Error;

/// Result type for sage-vector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sage-vector operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Dimension mismatch between a vector and the index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions.
        expected: usize,
        /// Actual dimensions provided.
        actual: usize,
    },

    /// Invalid vector (e.g., empty dimension, contains NaN).
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// A scan was aborted through its [`CancelFlag`](crate::CancelFlag).
    #[error("Search cancelled")]
    Cancelled,
}
