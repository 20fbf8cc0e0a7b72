//! Configuration for audit runs
//!
//! Thresholds for the price and estimate guardians and the oracle budget
//! for the narrative ones.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the audit orchestrator
///
/// # Examples
///
/// ```
/// use billforge_auditor::AuditConfig;
///
/// // Default configuration
/// let config = AuditConfig::default();
/// assert_eq!(config.sensitivity, 3.0);
///
/// // Flag more aggressively
/// let config = AuditConfig::strict();
/// assert!(config.sensitivity < AuditConfig::default().sensitivity);
///
/// // Flag only gross outliers
/// let config = AuditConfig::lenient();
/// assert_eq!(config.estimate_threshold, 1000.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Multiple of the locality reference a price may reach before it is flagged
    /// Default: 3.0
    pub sensitivity: f64,

    /// Scales the benchmark rate itself, for payers with negotiated schedules
    /// Default: 1.0
    pub benchmark_multiplier: f64,

    /// Ratio of price to threshold above which a finding is major
    /// Default: 1.2
    pub major_ratio: f64,

    /// Ratio of price to threshold above which a finding is extreme
    /// Default: 2.0
    pub extreme_ratio: f64,

    /// Dollars the bill may exceed the good-faith estimate by
    /// Default: 400
    pub estimate_threshold: f64,

    /// Let narrative guardians consult the oracle
    /// Default: true
    pub use_oracle: bool,

    /// Per-call oracle timeout (in seconds)
    /// Default: 30
    pub oracle_timeout_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sensitivity: 3.0,
            benchmark_multiplier: 1.0,
            major_ratio: 1.2,
            extreme_ratio: 2.0,
            estimate_threshold: 400.0,
            use_oracle: true,
            oracle_timeout_secs: 30,
        }
    }
}

impl AuditConfig {
    /// Strict configuration (lower thresholds)
    pub fn strict() -> Self {
        Self {
            sensitivity: 2.0,
            estimate_threshold: 200.0,
            ..Self::default()
        }
    }

    /// Lenient configuration (only gross outliers)
    pub fn lenient() -> Self {
        Self {
            sensitivity: 4.0,
            estimate_threshold: 1000.0,
            ..Self::default()
        }
    }

    /// Deterministic checks only
    pub fn offline() -> Self {
        Self {
            use_oracle: false,
            ..Self::default()
        }
    }

    /// Oracle timeout as Duration
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.sensitivity.is_finite() && self.sensitivity > 0.0) {
            return Err(format!("sensitivity must be positive, got {}", self.sensitivity));
        }
        if !(self.benchmark_multiplier.is_finite() && self.benchmark_multiplier > 0.0) {
            return Err(format!(
                "benchmark_multiplier must be positive, got {}",
                self.benchmark_multiplier
            ));
        }
        if !(self.major_ratio >= 1.0 && self.extreme_ratio >= self.major_ratio) {
            return Err("severity ratios must satisfy 1.0 <= major_ratio <= extreme_ratio".to_string());
        }
        if !(self.estimate_threshold.is_finite() && self.estimate_threshold >= 0.0) {
            return Err(format!(
                "estimate_threshold must be non-negative, got {}",
                self.estimate_threshold
            ));
        }
        if self.oracle_timeout_secs == 0 {
            return Err("oracle_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
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
