//! Three-tier reference rate resolution

use crate::cache::RateCache;
use crate::table::BenchmarkTable;
use billforge_domain::codes::{base_code, describe};
use billforge_llm::Oracle;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a resolved rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    /// Tier 1: shared cache
    Cache,
    /// Tier 2: static benchmark table
    Benchmark,
    /// Tier 3: oracle estimate (now cached)
    Oracle,
    /// Every tier failed; default-by-prefix
    Default,
}

/// A resolved reference rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateQuote {
    /// Reference rate in dollars, always finite and positive
    pub rate: f64,
    /// Tier that produced it
    pub source: RateSource,
}

#[derive(Deserialize)]
struct OracleRate {
    rate: Value,
}

/// Default reference rate by code prefix
pub fn default_rate_for(code: &str) -> f64 {
    let code = base_code(code);
    if code.starts_with("99") {
        100.0
    } else if code.starts_with('8') {
        25.0
    } else if code.starts_with('7') {
        150.0
    } else if code.starts_with('2') {
        800.0
    } else if code.starts_with('9') {
        60.0
    } else if code.starts_with('J') || code.starts_with('j') {
        20.0
    } else {
        75.0
    }
}

/// Resolves codes to reference rates: cache → benchmark → oracle → default
#[derive(Debug, Clone)]
pub struct PricingResolver {
    cache: RateCache,
    table: Arc<BenchmarkTable>,
    oracle: Option<Oracle>,
}

impl PricingResolver {
    /// Create a resolver over an injected cache and table, without an oracle
    pub fn new(cache: RateCache, table: BenchmarkTable) -> Self {
        Self {
            cache,
            table: Arc::new(table),
            oracle: None,
        }
    }

    /// Enable the oracle tier
    pub fn with_oracle(mut self, oracle: Oracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// The cache this resolver writes to
    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    /// The benchmark table
    pub fn table(&self) -> &BenchmarkTable {
        &self.table
    }

    /// Reference rate for a code
    pub async fn resolve_rate(&self, code: &str) -> f64 {
        self.quote(code).await.rate
    }

    /// Reference rate for a code, with the tier that produced it
    pub async fn quote(&self, code: &str) -> RateQuote {
        let code = base_code(code);

        if let Some(rate) = self.cache.get(code) {
            return RateQuote {
                rate,
                source: RateSource::Cache,
            };
        }

        if let Some(rate) = self.table.get(code) {
            return RateQuote {
                rate,
                source: RateSource::Benchmark,
            };
        }

        if let Some(oracle) = &self.oracle {
            match self.ask_oracle(oracle, code).await {
                Some(rate) => {
                    let rate = self.cache.insert(code, rate);
                    debug!("Oracle rate for {}: {:.2}", code, rate);
                    return RateQuote {
                        rate,
                        source: RateSource::Oracle,
                    };
                }
                None => warn!("No usable oracle rate for {}, using default", code),
            }
        }

        RateQuote {
            rate: default_rate_for(code),
            source: RateSource::Default,
        }
    }

    async fn ask_oracle(&self, oracle: &Oracle, code: &str) -> Option<f64> {
        let prompt = format!(
            "TASK: rate\n\
             Estimate the national average Medicare reference rate in US dollars for \
             procedure code {} ({}).\n\
             Respond with JSON only: {{\"rate\": <number>}}",
            code,
            describe(code).unwrap_or("unlisted procedure"),
        );

        let reply: OracleRate = match oracle.ask(&prompt, r#"{"rate": number}"#).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Rate lookup for {} failed: {}", code, e);
                return None;
            }
        };

        let rate = match &reply.rate {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_start_matches('$').parse::<f64>().ok(),
            _ => None,
        }?;

        (rate.is_finite() && rate > 0.0).then_some(rate)
    }
}

impl Default for PricingResolver {
    fn default() -> Self {
        Self::new(RateCache::new(), BenchmarkTable::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billforge_llm::MockProvider;

    #[tokio::test]
    async fn test_cache_short_circuits_table() {
        let cache = RateCache::new();
        cache.insert("99213", 10.0);
        let resolver = PricingResolver::new(cache, BenchmarkTable::builtin());

        let quote = resolver.quote("99213-25").await;
        assert_eq!(quote.rate, 10.0);
        assert_eq!(quote.source, RateSource::Cache);
    }

    #[tokio::test]
    async fn test_table_tier_is_not_written_back() {
        let resolver = PricingResolver::default();

        let quote = resolver.quote("71046").await;
        assert_eq!(quote.source, RateSource::Benchmark);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_oracle_rate_is_cached() {
        let provider = Arc::new(MockProvider::new(r#"{"rate": 42.5}"#));
        let resolver = PricingResolver::new(RateCache::new(), BenchmarkTable::empty())
            .with_oracle(Oracle::from_arc(Arc::clone(&provider)));

        let first = resolver.quote("99999").await;
        let second = resolver.quote("99999").await;

        assert_eq!(first.source, RateSource::Oracle);
        assert_eq!(second.source, RateSource::Cache);
        assert_eq!(second.rate, 42.5);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unusable_oracle_rates_fall_back() {
        for reply in [r#"{"rate": "a lot"}"#, r#"{"rate": -5}"#, r#"{"rate": 0}"#, "no idea", r#"{"cost": 1}"#] {
            let resolver = PricingResolver::new(RateCache::new(), BenchmarkTable::empty())
                .with_oracle(Oracle::new(MockProvider::new(reply)));

            let quote = resolver.quote("27130").await;
            assert_eq!(quote.source, RateSource::Default, "reply {}", reply);
            assert_eq!(quote.rate, 800.0);
            assert!(resolver.cache().is_empty());
        }
    }

    #[tokio::test]
    async fn test_failing_oracle_falls_back() {
        let resolver = PricingResolver::new(RateCache::new(), BenchmarkTable::empty())
            .with_oracle(Oracle::new(MockProvider::failing()));

        assert_eq!(resolver.resolve_rate("J9999").await, 20.0);
    }

    #[test]
    fn test_default_rate_prefixes() {
        assert_eq!(default_rate_for("99499"), 100.0);
        assert_eq!(default_rate_for("87070"), 25.0);
        assert_eq!(default_rate_for("74150"), 150.0);
        assert_eq!(default_rate_for("27130"), 800.0);
        assert_eq!(default_rate_for("90471"), 60.0);
        assert_eq!(default_rate_for("J0171"), 20.0);
        assert_eq!(default_rate_for("G0008"), 75.0);
    }
}
