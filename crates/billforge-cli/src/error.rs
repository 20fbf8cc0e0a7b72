//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generation error
    #[error("{0}")]
    Generator(#[from] billforge_generator::GeneratorError),

    /// Audit error
    #[error("Audit error: {0}")]
    Audit(#[from] billforge_auditor::AuditError),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] billforge_store::StoreError),

    /// Benchmark table error
    #[error("Pricing error: {0}")]
    Pricing(#[from] billforge_pricing::PricingError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
