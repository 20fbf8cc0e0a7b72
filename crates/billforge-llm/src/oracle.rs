//! Oracle Adapter
//!
//! Async front door to a synchronous [`LlmProvider`]. Calls run on tokio's
//! blocking pool under a per-call timeout, and every outcome is a tagged
//! `Result<T, OracleError>`: callers decide how to degrade.
//!
//! Responses are expected to be JSON, but models wrap it in markdown fences
//! or surround it with chatter. [`extract_json`] tolerates both, and
//! [`parse_fragment`] separates "not JSON at all" from "JSON of the wrong
//! shape".

use billforge_domain::traits::LlmProvider;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

/// Default per-call timeout (30 seconds)
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;

/// Oracle call outcome taxonomy
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    /// Provider failed, panicked or timed out
    #[error("Oracle failure: {0}")]
    Failure(String),

    /// Response could not be read as JSON
    #[error("Oracle response is not JSON: {0}")]
    Parse(String),

    /// JSON did not match the requested shape
    #[error("Oracle response violates schema: {0}")]
    Schema(String),
}

/// Object-safe view of a provider with its error erased to a string
trait TextSource: Send + Sync {
    fn text(&self, prompt: &str) -> Result<String, String>;
    fn structured(&self, prompt: &str, schema: &str) -> Result<String, String>;
}

impl<L> TextSource for L
where
    L: LlmProvider + Send + Sync,
    L::Error: fmt::Display,
{
    fn text(&self, prompt: &str) -> Result<String, String> {
        self.generate(prompt).map_err(|e| e.to_string())
    }

    fn structured(&self, prompt: &str, schema: &str) -> Result<String, String> {
        self.generate_structured(prompt, schema).map_err(|e| e.to_string())
    }
}

/// Shared, cloneable handle to the generative-text provider
///
/// # Examples
///
/// ```
/// use billforge_llm::{MockProvider, Oracle};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Rate { rate: f64 }
///
/// # tokio_test::block_on(async {
/// let oracle = Oracle::new(MockProvider::new("```json\n{\"rate\": 92.5}\n```"));
/// let rate: Rate = oracle.ask("TASK: rate\n99213", "{\"rate\": number}").await.unwrap();
/// assert_eq!(rate.rate, 92.5);
/// # });
/// ```
#[derive(Clone)]
pub struct Oracle {
    source: Arc<dyn TextSource>,
    call_timeout: Duration,
}

impl fmt::Debug for Oracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Oracle")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl Oracle {
    /// Wrap a provider
    pub fn new<L>(provider: L) -> Self
    where
        L: LlmProvider + Send + Sync + 'static,
        L::Error: fmt::Display,
    {
        Self::from_arc(Arc::new(provider))
    }

    /// Wrap an already shared provider
    pub fn from_arc<L>(provider: Arc<L>) -> Self
    where
        L: LlmProvider + Send + Sync + 'static,
        L::Error: fmt::Display,
    {
        Self {
            source: provider,
            call_timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
        }
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Per-call timeout
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Free-form completion
    pub async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        self.call(prompt, None).await
    }

    /// Completion parsed into `T`
    ///
    /// `schema` is a short description of the expected JSON; providers with
    /// a structured mode receive it alongside the prompt.
    pub async fn ask<T: DeserializeOwned>(&self, prompt: &str, schema: &str) -> Result<T, OracleError> {
        let response = self.call(prompt, Some(schema)).await?;
        parse_fragment(&response)
    }

    async fn call(&self, prompt: &str, schema: Option<&str>) -> Result<String, OracleError> {
        let source = Arc::clone(&self.source);
        let prompt = prompt.to_string();
        let schema = schema.map(str::to_string);

        debug!("Oracle prompt length: {} chars", prompt.len());

        // Call in a blocking context since LlmProvider is not async
        let task = tokio::task::spawn_blocking(move || match schema {
            Some(schema) => source.structured(&prompt, &schema),
            None => source.text(&prompt),
        });

        let response = timeout(self.call_timeout, task)
            .await
            .map_err(|_| OracleError::Failure(format!("timed out after {:?}", self.call_timeout)))?
            .map_err(|e| OracleError::Failure(format!("Task join error: {}", e)))?
            .map_err(OracleError::Failure)?;

        debug!("Oracle response length: {} chars", response.len());
        Ok(response)
    }
}

/// Extract the JSON payload from a model response
///
/// Handles markdown code fences and leading/trailing prose. Falls back to
/// the substring between the first `{` and the last `}`.
pub fn extract_json(response: &str) -> Result<String, OracleError> {
    let mut candidate = response.trim();

    // Check if wrapped in markdown code block
    if let Some(start) = candidate.find("```") {
        let after_fence = &candidate[start + 3..];
        // Skip the language tag line (```json)
        let body = match after_fence.find('\n') {
            Some(nl) => &after_fence[nl + 1..],
            None => after_fence,
        };
        candidate = match body.find("```") {
            Some(end) => body[..end].trim(),
            None => body.trim(),
        };
    }

    if candidate.is_empty() {
        return Err(OracleError::Parse("empty response".to_string()));
    }

    if serde_json::from_str::<Value>(candidate).is_ok() {
        return Ok(candidate.to_string());
    }

    match (candidate.find('{'), candidate.rfind('}')) {
        (Some(open), Some(close)) if open < close => Ok(candidate[open..=close].to_string()),
        _ => Err(OracleError::Parse(format!(
            "no JSON object in response ({} chars)",
            response.len()
        ))),
    }
}

/// Parse a model response into `T`
pub fn parse_fragment<T: DeserializeOwned>(response: &str) -> Result<T, OracleError> {
    let json_str = extract_json(response)?;

    let value: Value = serde_json::from_str(&json_str)
        .map_err(|e| OracleError::Parse(format!("JSON parse error: {}", e)))?;

    serde_json::from_value(value).map_err(|e| OracleError::Schema(e.to_string()))
}
