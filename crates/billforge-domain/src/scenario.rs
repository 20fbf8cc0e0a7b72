//! Scenario catalogue - the irregularities an artifact can be asked to carry

use crate::audit::GuardianRule;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A labeled billing irregularity (or `None` for a clean bill)
///
/// Every generated artifact carries exactly one intended irregularity. The
/// variant decides which invariants the pipeline must deliberately leave
/// broken and which guardian is expected to catch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Irregularity {
    /// Clean bill, no anomaly
    None,

    /// Evaluation level billed above documented acuity
    Upcoding,

    /// Panel components billed as separate lines
    Unbundling,

    /// Same service billed twice on the same date
    Duplicate,

    /// A line total disagrees with quantity times unit price
    MathError,

    /// Grand total disagrees with subtotal, adjustments and payments
    BalanceError,

    /// Billed price far above the benchmark rate
    PriceGouging,

    /// Coded anatomical side contradicts the narrative
    LateralityMismatch,

    /// Evaluation billed inside a surgical global period
    GlobalPeriod,

    /// Final bill materially exceeds the good-faith estimate
    EstimateVariance,

    /// Out-of-network provider bills the patient for the remainder
    BalanceBilling,

    /// A critical field is blank
    MissingField,

    /// Provider identifier is invalid or a placeholder
    GhostProvider,
}

impl Irregularity {
    /// Every scenario, in catalogue order
    pub const ALL: [Irregularity; 13] = [
        Irregularity::None,
        Irregularity::Upcoding,
        Irregularity::Unbundling,
        Irregularity::Duplicate,
        Irregularity::MathError,
        Irregularity::BalanceError,
        Irregularity::PriceGouging,
        Irregularity::LateralityMismatch,
        Irregularity::GlobalPeriod,
        Irregularity::EstimateVariance,
        Irregularity::BalanceBilling,
        Irregularity::MissingField,
        Irregularity::GhostProvider,
    ];

    /// Scenario identifier as used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Irregularity::None => "none",
            Irregularity::Upcoding => "upcoding",
            Irregularity::Unbundling => "unbundling",
            Irregularity::Duplicate => "duplicate",
            Irregularity::MathError => "math-error",
            Irregularity::BalanceError => "balance-error",
            Irregularity::PriceGouging => "price-gouging",
            Irregularity::LateralityMismatch => "laterality-mismatch",
            Irregularity::GlobalPeriod => "global-period",
            Irregularity::EstimateVariance => "estimate-variance",
            Irregularity::BalanceBilling => "balance-billing",
            Irregularity::MissingField => "missing-field",
            Irregularity::GhostProvider => "ghost-provider",
        }
    }

    /// Parse a scenario identifier (kebab-case or snake_case, any case)
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|irregularity| irregularity.as_str() == normalized)
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Irregularity::None => "Clean bill",
            Irregularity::Upcoding => "Upcoding",
            Irregularity::Unbundling => "Unbundling",
            Irregularity::Duplicate => "Duplicate charge",
            Irregularity::MathError => "Line computation error",
            Irregularity::BalanceError => "Balance arithmetic error",
            Irregularity::PriceGouging => "Price gouging",
            Irregularity::LateralityMismatch => "Laterality mismatch",
            Irregularity::GlobalPeriod => "Global period violation",
            Irregularity::EstimateVariance => "Good-faith estimate variance",
            Irregularity::BalanceBilling => "Out-of-network balance billing",
            Irregularity::MissingField => "Missing critical field",
            Irregularity::GhostProvider => "Ghost provider",
        }
    }

    /// Whether this is the clean scenario
    pub fn is_clean(&self) -> bool {
        matches!(self, Irregularity::None)
    }

    /// Line totals are deliberately wrong and must not be healed
    pub fn breaks_line_math(&self) -> bool {
        matches!(self, Irregularity::MathError)
    }

    /// Grand total is deliberately wrong and must not be healed
    pub fn breaks_balance(&self) -> bool {
        matches!(self, Irregularity::BalanceError)
    }

    /// Provider identifiers must stay invalid
    pub fn requires_invalid_identifier(&self) -> bool {
        matches!(self, Irregularity::GhostProvider)
    }

    /// Panel components stay unbundled
    pub fn allows_unbundled_panels(&self) -> bool {
        matches!(self, Irregularity::Unbundling)
    }

    /// Detecting or injecting this scenario needs the encounter narrative,
    /// not just the numbers
    pub fn is_narrative(&self) -> bool {
        matches!(
            self,
            Irregularity::Upcoding | Irregularity::LateralityMismatch | Irregularity::GlobalPeriod
        )
    }

    /// The guardian expected to flag this scenario
    pub fn primary_guardian(&self) -> Option<GuardianRule> {
        match self {
            Irregularity::None => None,
            Irregularity::Upcoding => Some(GuardianRule::Upcoding),
            Irregularity::Unbundling => Some(GuardianRule::Unbundling),
            Irregularity::Duplicate => Some(GuardianRule::Duplicate),
            Irregularity::MathError | Irregularity::BalanceError => Some(GuardianRule::Arithmetic),
            Irregularity::PriceGouging => Some(GuardianRule::PriceBenchmark),
            Irregularity::LateralityMismatch => Some(GuardianRule::Laterality),
            Irregularity::GlobalPeriod => Some(GuardianRule::GlobalPeriod),
            Irregularity::EstimateVariance => Some(GuardianRule::EstimateVariance),
            Irregularity::BalanceBilling => Some(GuardianRule::BalanceBilling),
            Irregularity::MissingField => Some(GuardianRule::MissingField),
            Irregularity::GhostProvider => Some(GuardianRule::GhostCharge),
        }
    }
}

impl Default for Irregularity {
    fn default() -> Self {
        Irregularity::None
    }
}

impl fmt::Display for Irregularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for irregularity in Irregularity::ALL {
            assert_eq!(Irregularity::parse(irregularity.as_str()), Some(irregularity));
        }
    }

    #[test]
    fn test_parse_accepts_snake_case() {
        assert_eq!(Irregularity::parse("PRICE_GOUGING"), Some(Irregularity::PriceGouging));
        assert_eq!(Irregularity::parse(" math_error "), Some(Irregularity::MathError));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Irregularity::parse("phantom-billing"), None);
    }

    #[test]
    fn test_only_clean_has_no_guardian() {
        for irregularity in Irregularity::ALL {
            assert_eq!(irregularity.primary_guardian().is_none(), irregularity.is_clean());
        }
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Irregularity::GhostProvider).unwrap();
        assert_eq!(json, "\"ghost_provider\"");
    }
}
