//! Sentinel repair policy

use billforge_domain::Irregularity;
use serde::{Deserialize, Serialize};

/// Where the Sentinel is allowed to intervene
///
/// # Examples
///
/// ```
/// use billforge_sentinel::SentinelPolicy;
/// use billforge_domain::Irregularity;
///
/// let policy = SentinelPolicy::default();
/// assert!(policy.may_repair(Irregularity::Duplicate));
///
/// let policy = SentinelPolicy::observe_only();
/// assert!(!policy.may_repair(Irregularity::Duplicate));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelPolicy {
    /// Scenarios the Sentinel may inject into
    pub injectable: Vec<Irregularity>,

    /// Let the oracle plan narrative repairs
    pub allow_oracle_planning: bool,

    /// Let the oracle verify narrative scenarios
    pub allow_oracle_verification: bool,

    /// Re-run the deterministic detector after a repair and note failures
    pub verify_after_repair: bool,
}

impl Default for SentinelPolicy {
    fn default() -> Self {
        Self {
            injectable: Irregularity::ALL
                .into_iter()
                .filter(|s| !s.is_clean())
                .collect(),
            allow_oracle_planning: true,
            allow_oracle_verification: true,
            verify_after_repair: true,
        }
    }
}

impl SentinelPolicy {
    /// Deterministic only: no oracle calls, every scenario repairable
    pub fn deterministic() -> Self {
        Self {
            allow_oracle_planning: false,
            allow_oracle_verification: false,
            ..Self::default()
        }
    }

    /// Verify and report, never mutate
    pub fn observe_only() -> Self {
        Self {
            injectable: Vec::new(),
            ..Self::default()
        }
    }

    /// Whether the Sentinel may repair this scenario
    pub fn may_repair(&self, scenario: Irregularity) -> bool {
        self.injectable.contains(&scenario)
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<(), String> {
        if self.injectable.contains(&Irregularity::None) {
            return Err("the clean scenario cannot be injectable".to_string());
        }
        Ok(())
    }

    /// Load policy from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize policy to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
