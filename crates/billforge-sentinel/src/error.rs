//! Error types for the sentinel crate

use thiserror::Error;

/// Errors applying a repair plan
///
/// These never escape [`crate::Sentinel::run`]: a failed operation turns the
/// outcome into `RepairDeclined` and the original artifact is kept.
#[derive(Error, Debug)]
pub enum SentinelError {
    /// Operation refers to a line that does not exist
    #[error("Line {index} out of range ({len} lines)")]
    LineOutOfRange {
        /// Requested index
        index: usize,
        /// Number of lines
        len: usize,
    },

    /// Target is not an object or the field is unknown
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Value could not be written into the target
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SentinelError {
    fn from(err: serde_json::Error) -> Self {
        SentinelError::Serialization(err.to_string())
    }
}
