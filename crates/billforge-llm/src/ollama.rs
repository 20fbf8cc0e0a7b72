//! Ollama Provider Implementation
//!
//! Provides integration with Ollama's local LLM API.
//!
//! # Features
//!
//! - Blocking HTTP communication with the Ollama generate API
//! - Configurable endpoint, model and request timeout
//! - Optional JSON mode for structured generation
//!
//! The provider makes a single attempt per call by default. Pipeline phases
//! treat a failed call as a fallback trigger rather than retrying, so
//! transport retries are opt-in via [`OllamaProvider::with_max_retries`].
//!
//! # Examples
//!
//! ```no_run
//! use billforge_llm::OllamaProvider;
//! use billforge_domain::traits::LlmProvider;
//!
//! let provider = OllamaProvider::new("http://localhost:11434", "llama3");
//! let text = provider.generate("Say hello").unwrap();
//! ```

use crate::LlmError;
use billforge_domain::traits::LlmProvider as LlmProviderTrait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for LLM requests (60 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of attempts per call
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Ollama API provider for local LLM inference
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

/// Request body for Ollama generate API
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

/// Response from Ollama generate API
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[allow(dead_code)]
    done: bool,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Model to use (e.g., "llama3", "mistral")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Create a new Ollama provider on the default endpoint
    pub fn default_endpoint(model: impl Into<String>) -> Self {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Set the maximum number of attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Model name
    pub fn model(&self) -> &str {
        &self.model
    }

    fn call(&self, prompt: &str, format: Option<&str>) -> Result<String, LlmError> {
        // Built per call: the blocking client owns a runtime that must not be
        // dropped from async context, and calls arrive on the blocking pool.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LlmError::Communication(format!("Failed to build client: {}", e)))?;

        let url = format!("{}/api/generate", self.endpoint);
        let request_body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format,
        };

        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            match client.post(&url).json(&request_body).send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<OllamaGenerateResponse>()
                            .map(|r| r.response)
                            .map_err(|e| {
                                LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                            });
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(LlmError::ModelNotAvailable(self.model.clone()));
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(LlmError::RateLimitExceeded);
                    } else {
                        let error_text = response
                            .text()
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        last_error = Some(LlmError::Communication(format!(
                            "HTTP {}: {}",
                            status, error_text
                        )));
                    }
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                // Exponential backoff: 1s, 2s, 4s, etc.
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                warn!("Ollama call failed (attempt {}/{}), retrying in {:?}", attempts, self.max_retries, delay);
                std::thread::sleep(delay);
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }
}

impl LlmProviderTrait for OllamaProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        self.call(prompt, None)
    }

    fn generate_structured(&self, prompt: &str, _schema: &str) -> Result<String, Self::Error> {
        // Ollama's JSON mode constrains output to valid JSON; the schema
        // itself is carried in the prompt.
        self.call(prompt, Some("json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_provider_creation() {
        let provider = OllamaProvider::new("http://localhost:11434", "llama3");
        assert_eq!(provider.endpoint, "http://localhost:11434");
        assert_eq!(provider.model(), "llama3");
        assert_eq!(provider.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_ollama_provider_default_endpoint() {
        let provider = OllamaProvider::default_endpoint("mistral");
        assert_eq!(provider.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(provider.model, "mistral");
    }

    #[test]
    fn test_max_retries_is_at_least_one() {
        let provider = OllamaProvider::default_endpoint("llama3").with_max_retries(0);
        assert_eq!(provider.max_retries, 1);
    }

    #[test]
    fn test_request_serialization_skips_missing_format() {
        let body = OllamaGenerateRequest {
            model: "llama3",
            prompt: "hi",
            stream: false,
            format: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("format"));
    }

    #[test]
    fn test_ollama_error_handling() {
        // Port 9 (discard) on localhost refuses HTTP
        let provider = OllamaProvider::new("http://127.0.0.1:9", "llama3")
            .with_timeout(Duration::from_secs(2));

        let result = provider.generate("test");
        assert!(matches!(result, Err(LlmError::Communication(_))));
    }
}
