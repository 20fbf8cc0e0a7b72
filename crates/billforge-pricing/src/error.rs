//! Error types for the pricing crate

use thiserror::Error;

/// Errors loading pricing data
///
/// Rate resolution itself never fails; these only surface when loading a
/// benchmark table from disk.
#[derive(Error, Debug)]
pub enum PricingError {
    /// Failed to read the table file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Table file is not a code→rate JSON object
    #[error("Invalid benchmark table: {0}")]
    InvalidTable(String),

    /// A rate in the table is unusable
    #[error("Invalid rate for {code}: {rate}")]
    InvalidRate {
        /// Offending code
        code: String,
        /// Offending rate
        rate: f64,
    },
}

impl From<serde_json::Error> for PricingError {
    fn from(err: serde_json::Error) -> Self {
        PricingError::InvalidTable(err.to_string())
    }
}
