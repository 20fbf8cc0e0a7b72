//! Shared reference-rate cache (tier 1)

use billforge_domain::codes::base_code;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Append-only, read-mostly map from base code to reference rate
///
/// Cloning the handle shares the underlying map. Keys are normalized to the
/// base code, so `99213-25` and `99213` hit the same entry.
#[derive(Debug, Clone, Default)]
pub struct RateCache {
    rates: Arc<RwLock<HashMap<String, f64>>>,
}

impl RateCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached rate for a code
    pub fn get(&self, code: &str) -> Option<f64> {
        let rates = self.rates.read().unwrap_or_else(PoisonError::into_inner);
        rates.get(base_code(code)).copied()
    }

    /// Record a rate
    ///
    /// The first write for a code wins; later writes for the same code are
    /// no-ops, so concurrent resolvers racing on one code stay consistent.
    /// Returns the rate now stored.
    pub fn insert(&self, code: &str, rate: f64) -> f64 {
        let mut rates = self.rates.write().unwrap_or_else(PoisonError::into_inner);
        *rates.entry(base_code(code).to_string()).or_insert(rate)
    }

    /// Number of cached codes
    pub fn len(&self) -> usize {
        self.rates.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
