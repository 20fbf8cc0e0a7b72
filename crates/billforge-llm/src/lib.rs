//! BillForge LLM Provider Layer
//!
//! Pluggable generative-text providers and the Oracle Adapter that turns
//! their free-form output into schema-shaped artifact fragments.
//!
//! # Architecture
//!
//! This crate provides implementations of the `LlmProvider` trait from
//! `billforge-domain`, plus [`Oracle`], the async adapter every pipeline
//! phase, the Sentinel and the guardians talk to. The adapter never assumes
//! success: each call returns `Result<T, OracleError>`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `OllamaProvider`: Local Ollama API integration
//!
//! # Examples
//!
//! ```
//! use billforge_llm::MockProvider;
//! use billforge_domain::traits::LlmProvider;
//!
//! let provider = MockProvider::new("Hello from LLM!");
//! let result = provider.generate("test prompt").unwrap();
//! assert_eq!(result, "Hello from LLM!");
//! ```

#![warn(missing_docs)]

pub mod ollama;
pub mod oracle;

use billforge_domain::traits::LlmProvider as LlmProviderTrait;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

pub use ollama::OllamaProvider;
pub use oracle::{extract_json, parse_fragment, Oracle, OracleError};

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

/// What the mock does when a prompt matches
#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Error,
}

/// Mock LLM provider for deterministic testing
///
/// This provider returns pre-configured responses without making any network
/// calls. Responses are keyed by a marker: the first registered marker
/// contained in the prompt wins, otherwise the default response is returned.
/// Pipeline prompts start with a `TASK:` line, which makes a convenient
/// marker.
///
/// # Examples
///
/// ```
/// use billforge_llm::MockProvider;
/// use billforge_domain::traits::LlmProvider;
///
/// // Simple fixed response
/// let provider = MockProvider::new("Fixed response");
/// assert_eq!(provider.generate("any prompt").unwrap(), "Fixed response");
///
/// // Marker-keyed responses
/// let mut provider = MockProvider::default();
/// provider.add_response("TASK: identity", "{\"name\": \"Mercy\"}");
/// assert_eq!(
///     provider.generate("TASK: identity\nInvent a facility").unwrap(),
///     "{\"name\": \"Mercy\"}"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: Option<String>,
    responses: Arc<Mutex<Vec<(String, MockReply)>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: Some(response.into()),
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a MockProvider that fails every unmatched prompt
    ///
    /// Useful for exercising the stub fallbacks of every phase.
    pub fn failing() -> Self {
        Self {
            default_response: None,
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a response for prompts containing `marker`
    pub fn add_response(&mut self, marker: impl Into<String>, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((marker.into(), MockReply::Text(response.into())));
    }

    /// Configure to return an error for prompts containing `marker`
    pub fn add_error(&mut self, marker: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((marker.into(), MockReply::Error));
    }

    /// Get the number of times generate was called
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of calls whose prompt contained `marker`
    pub fn calls_containing(&self, marker: &str) -> usize {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|p| p.contains(marker))
            .count()
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        let responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, reply)) = responses.iter().find(|(marker, _)| prompt.contains(marker.as_str())) {
            return match reply {
                MockReply::Text(text) => Ok(text.clone()),
                MockReply::Error => Err(LlmError::Other("Mock error".to_string())),
            };
        }

        self.default_response
            .clone()
            .ok_or_else(|| LlmError::Communication("Mock provider offline".to_string()))
    }

    fn generate_structured(&self, prompt: &str, _schema: &str) -> Result<String, Self::Error> {
        self.generate(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_default() {
        let provider = MockProvider::new("Test response");
        let result = provider.generate("any prompt");
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "Test response");
    }

    #[test]
    fn test_mock_provider_marker_responses() {
        let mut provider = MockProvider::default();
        provider.add_response("TASK: clinical", "clinical json");
        provider.add_response("TASK: coding", "coding json");

        assert_eq!(provider.generate("TASK: clinical\n...").unwrap(), "clinical json");
        assert_eq!(provider.generate("TASK: coding\n...").unwrap(), "coding json");
        assert_eq!(provider.generate("unknown").unwrap(), "Default mock response");
    }

    #[test]
    fn test_mock_provider_call_count() {
        let provider = MockProvider::new("test");

        assert_eq!(provider.call_count(), 0);

        provider.generate("prompt1").unwrap();
        assert_eq!(provider.call_count(), 1);

        provider.generate("prompt2").unwrap();
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.calls_containing("prompt2"), 1);

        provider.reset_call_count();
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_mock_provider_error() {
        let mut provider = MockProvider::default();
        provider.add_error("bad prompt");

        let result = provider.generate("a bad prompt");
        assert!(matches!(result.unwrap_err(), LlmError::Other(_)));
    }

    #[test]
    fn test_failing_provider() {
        let provider = MockProvider::failing();
        assert!(matches!(
            provider.generate("anything").unwrap_err(),
            LlmError::Communication(_)
        ));
    }

    #[test]
    fn test_mock_provider_clone_shares_state() {
        let provider1 = MockProvider::new("test");
        let provider2 = provider1.clone();

        provider1.generate("test").unwrap();

        assert_eq!(provider1.call_count(), 1);
        assert_eq!(provider2.call_count(), 1);
    }
}
