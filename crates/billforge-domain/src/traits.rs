//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::BillArtifact;

/// Trait for generative text providers (the oracle)
///
/// Implemented by the infrastructure layer (billforge-llm)
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Generate text completion
    fn generate(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Generate with structured output (if supported)
    fn generate_structured(&self, prompt: &str, schema: &str) -> Result<String, Self::Error>;
}

/// Trait for persisting finished artifacts
///
/// Implemented by the infrastructure layer (billforge-store)
pub trait ArtifactStore {
    /// Error type for store operations
    type Error;

    /// Save an artifact under a name, returning the sanitized name used
    fn save(&self, name: &str, artifact: &BillArtifact) -> Result<String, Self::Error>;

    /// Load an artifact by name
    fn load(&self, name: &str) -> Result<BillArtifact, Self::Error>;

    /// List stored artifact names
    fn list(&self) -> Result<Vec<String>, Self::Error>;
}
