//! Configuration for the generation pipeline

use billforge_domain::{BillingModel, PayerClass};
use billforge_reconciler::ReconcileConfig;
use billforge_sentinel::SentinelPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the [`Generator`](crate::Generator)
///
/// # Examples
///
/// ```
/// use billforge_generator::GeneratorConfig;
///
/// let config = GeneratorConfig {
///     seed: Some(42),
///     ..GeneratorConfig::default()
/// };
/// assert!(config.validate().is_ok());
///
/// let toml = config.to_toml().unwrap();
/// let parsed = GeneratorConfig::from_toml(&toml).unwrap();
/// assert_eq!(parsed.seed, Some(42));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Seed for every random choice; `None` draws one per run
    pub seed: Option<u64>,

    /// Combined bill or facility/professional split
    pub billing_model: BillingModel,

    /// Payer class the bill is priced for
    pub payer: PayerClass,

    /// Ask the oracle for editorial review notes after publishing
    pub review: bool,

    /// Mark the published document for scanned-paper rendering
    pub scan_mode: bool,

    /// Maximum time for a single oracle call (seconds)
    pub oracle_timeout_secs: u64,

    /// Which reconciliation rules run
    pub reconcile: ReconcileConfig,

    /// Where the Sentinel may intervene
    pub sentinel: SentinelPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            billing_model: BillingModel::Combined,
            payer: PayerClass::Commercial,
            review: false,
            scan_mode: false,
            oracle_timeout_secs: 60,
            reconcile: ReconcileConfig::default(),
            sentinel: SentinelPolicy::default(),
        }
    }
}

impl GeneratorConfig {
    /// Get the oracle timeout as a Duration
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.oracle_timeout_secs == 0 {
            return Err("oracle_timeout_secs must be greater than 0".to_string());
        }
        self.sentinel.validate()
    }

    /// Aggressive preset: short oracle timeout, permissive reconciliation,
    /// no oracle in the Sentinel
    pub fn aggressive() -> Self {
        Self {
            oracle_timeout_secs: 15,
            reconcile: ReconcileConfig::permissive(),
            sentinel: SentinelPolicy::deterministic(),
            ..Self::default()
        }
    }

    /// Lenient preset: long oracle timeout, every reconciliation rule,
    /// editorial review enabled
    pub fn lenient() -> Self {
        Self {
            review: true,
            oracle_timeout_secs: 180,
            reconcile: ReconcileConfig::strict(),
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
