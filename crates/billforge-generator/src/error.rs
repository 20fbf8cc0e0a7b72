//! Error types for the generator

use thiserror::Error;

/// Errors that abort a generation run
///
/// Oracle failures never show up here: every phase degrades to a stub
/// fragment and records a provenance note instead.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// The requested scenario is not in the catalogue
    #[error("Unknown scenario '{requested}' (expected one of: {known})")]
    UnknownScenario {
        /// What was asked for
        requested: String,
        /// Comma-separated catalogue identifiers
        known: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for GeneratorError {
    fn from(e: serde_json::Error) -> Self {
        GeneratorError::Serialization(e.to_string())
    }
}
