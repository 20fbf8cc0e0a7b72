//! Auditor error types

use thiserror::Error;

/// Errors that can occur setting up an audit
///
/// Guardian failures are not errors: they degrade their own slot.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Report could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Serialization(err.to_string())
    }
}
