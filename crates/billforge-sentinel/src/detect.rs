//! Deterministic irregularity detectors
//!
//! One detector per scenario. Narrative scenarios have heuristic detectors
//! here too; the Sentinel prefers the oracle for those and falls back to
//! these when it cannot be reached.

use billforge_domain::codes::{evaluation_level, is_evaluation, max_level_for};
use billforge_domain::{BillArtifact, Irregularity, Laterality, NetworkStatus};
use billforge_pricing::{locality_reference, Location, PricingResolver};

/// Price above `sensitivity × locality reference` counts as gouging
pub const GOUGING_SENSITIVITY: f64 = 3.0;

/// Final charges above the estimate by more than this count as variance
pub const ESTIMATE_VARIANCE_THRESHOLD: f64 = 400.0;

/// Slack for cent rounding when comparing against a threshold
const ROUNDING_SLACK: f64 = 0.01;

/// Whether a scenario's irregularity is visible in an artifact
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Irregularity is present
    pub observable: bool,
    /// Why
    pub rationale: String,
    /// Lines carrying it
    pub lines: Vec<usize>,
}

impl Observation {
    fn present(rationale: impl Into<String>, lines: Vec<usize>) -> Self {
        Self {
            observable: true,
            rationale: rationale.into(),
            lines,
        }
    }

    fn absent(rationale: impl Into<String>) -> Self {
        Self {
            observable: false,
            rationale: rationale.into(),
            lines: Vec::new(),
        }
    }

    fn from_lines(lines: Vec<usize>, present: &str, absent: &str) -> Self {
        if lines.is_empty() {
            Self::absent(absent)
        } else {
            Self::present(format!("{} (lines {:?})", present, lines), lines)
        }
    }
}

/// Run the detector for `scenario`
pub async fn observe(artifact: &BillArtifact, scenario: Irregularity, pricing: &PricingResolver) -> Observation {
    match scenario {
        Irregularity::None => Observation::absent("No irregularity requested"),
        Irregularity::PriceGouging => price_gouging(artifact, pricing).await,
        other => observe_sync(artifact, other),
    }
}

fn observe_sync(artifact: &BillArtifact, scenario: Irregularity) -> Observation {
    match scenario {
        Irregularity::None | Irregularity::PriceGouging => Observation::absent("Not a synchronous check"),
        Irregularity::Duplicate => Observation::from_lines(
            artifact.duplicate_line_indices(),
            "Same code billed twice on one date",
            "No repeated code and date",
        ),
        Irregularity::MathError => Observation::from_lines(
            artifact
                .line_items
                .iter()
                .enumerate()
                .filter(|(_, line)| !line.is_total_consistent())
                .map(|(i, _)| i)
                .collect(),
            "Line total differs from quantity x unit price",
            "Every line total is consistent",
        ),
        Irregularity::BalanceError => {
            if artifact.balance_consistent() {
                Observation::absent("Subtotal and grand total close")
            } else {
                Observation::present(
                    format!(
                        "Grand total {:.2} differs from computed {:.2}",
                        artifact.grand_total,
                        artifact.computed_grand_total()
                    ),
                    Vec::new(),
                )
            }
        }
        Irregularity::Unbundling => Observation::from_lines(
            artifact
                .unbundled_panels()
                .into_iter()
                .flat_map(|(_, lines)| lines)
                .collect(),
            "Panel components billed separately",
            "No unbundled panel components",
        ),
        Irregularity::EstimateVariance => match artifact.estimate {
            Some(estimate) if artifact.subtotal - estimate > ESTIMATE_VARIANCE_THRESHOLD => Observation::present(
                format!(
                    "Charges {:.2} exceed estimate {:.2} by more than {:.0}",
                    artifact.subtotal, estimate, ESTIMATE_VARIANCE_THRESHOLD
                ),
                Vec::new(),
            ),
            Some(_) => Observation::absent("Charges within estimate threshold"),
            None => Observation::absent("No good-faith estimate on file"),
        },
        Irregularity::BalanceBilling => match artifact.balance_billed {
            Some(amount) if amount > 0.0 && artifact.network_status == NetworkStatus::OutOfNetwork => {
                Observation::present(format!("Out-of-network balance bill of {:.2}", amount), Vec::new())
            }
            _ => Observation::absent("No out-of-network balance bill"),
        },
        Irregularity::MissingField => {
            let missing = artifact.missing_critical_fields();
            if missing.is_empty() {
                Observation::absent("All critical fields present")
            } else {
                Observation::present(format!("Blank critical fields: {}", missing.join(", ")), Vec::new())
            }
        }
        Irregularity::GhostProvider => {
            if artifact.facility.has_valid_npis() && !artifact.facility.has_placeholder_identifiers() {
                Observation::absent("Provider identifiers are valid")
            } else {
                Observation::present("Invalid or placeholder provider identifier", Vec::new())
            }
        }
        Irregularity::Upcoding => Observation::from_lines(upcoded_lines(artifact), "E/M level above documented acuity", "E/M levels fit acuity"),
        Irregularity::LateralityMismatch => Observation::from_lines(
            laterality_mismatches(artifact),
            "Coded side contradicts documentation",
            "Coded sides match documentation",
        ),
        Irregularity::GlobalPeriod => Observation::from_lines(
            global_period_lines(artifact),
            "E/M billed inside a surgical global period",
            "No E/M inside a global period",
        ),
    }
}

async fn price_gouging(artifact: &BillArtifact, pricing: &PricingResolver) -> Observation {
    let location = Location::of(&artifact.facility);
    let mut lines = Vec::new();
    for (i, line) in artifact.line_items.iter().enumerate() {
        let rate = pricing.resolve_rate(&line.code).await;
        let threshold = GOUGING_SENSITIVITY * locality_reference(rate, &location, &line.modifiers);
        if line.unit_price > threshold + ROUNDING_SLACK {
            lines.push(i);
        }
    }
    Observation::from_lines(lines, "Price far above benchmark", "Prices within benchmark range")
}

/// E/M lines billed above the level the acuity supports
pub fn upcoded_lines(artifact: &BillArtifact) -> Vec<usize> {
    let clinical = &artifact.clinical;
    artifact
        .line_items
        .iter()
        .enumerate()
        .filter(|(_, line)| {
            evaluation_level(&line.code)
                .map(|level| level > max_level_for(clinical.acuity, clinical.setting))
                .unwrap_or(false)
        })
        .map(|(i, _)| i)
        .collect()
}

/// The side the clinical record documents
pub fn documented_side(artifact: &BillArtifact) -> Option<Laterality> {
    artifact
        .clinical
        .laterality
        .or_else(|| artifact.clinical.encounter.mentioned_side())
}

/// Lines whose side modifier contradicts the documented side
pub fn laterality_mismatches(artifact: &BillArtifact) -> Vec<usize> {
    let Some(documented) = documented_side(artifact) else {
        return Vec::new();
    };
    artifact
        .line_items
        .iter()
        .enumerate()
        .filter(|(_, line)| {
            line.modifiers
                .iter()
                .filter_map(|m| Laterality::from_modifier(m))
                .any(|side| side != documented)
        })
        .map(|(i, _)| i)
        .collect()
}

/// E/M lines dated inside the prior procedure's global period
pub fn global_period_lines(artifact: &BillArtifact) -> Vec<usize> {
    let Some(prior) = &artifact.clinical.prior_procedure else {
        return Vec::new();
    };
    artifact
        .line_items
        .iter()
        .enumerate()
        .filter(|(_, line)| is_evaluation(&line.code) && prior.covers(line.date))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{artifact, date};
    use billforge_domain::{Acuity, PayerClass, PriorProcedure};
    use billforge_pricing::billed_price;

    fn pricing() -> PricingResolver {
        PricingResolver::default()
    }

    #[tokio::test]
    async fn test_clean_artifact_shows_nothing() {
        let a = artifact(4);
        for scenario in Irregularity::ALL {
            let seen = observe(&a, scenario, &pricing()).await;
            assert!(!seen.observable, "{} observed on a clean bill: {}", scenario, seen.rationale);
        }
    }

    #[tokio::test]
    async fn test_duplicate_observed() {
        let mut a = artifact(3);
        a.line_items.push(a.line_items[1].clone());
        let seen = observe(&a, Irregularity::Duplicate, &pricing()).await;
        assert!(seen.observable);
        assert_eq!(seen.lines, vec![3]);
    }

    #[tokio::test]
    async fn test_gouging_threshold_follows_region() {
        use billforge_pricing::{PayerFactor, GOUGING_MULTIPLIER};

        let mut a = artifact(1);
        a.facility.city = "Sacramento".to_string();
        a.facility.region = "CA".to_string();
        a.facility.postal_code = "95814".to_string();
        let location = Location::of(&a.facility);

        a.line_items[0].unit_price = billed_price(134.0, PayerClass::SelfPay, &location, &[]);
        assert!(!observe(&a, Irregularity::PriceGouging, &pricing()).await.observable);

        a.line_items[0].unit_price = billed_price(134.0, PayerFactor::Forced(GOUGING_MULTIPLIER), &location, &[]);
        let seen = observe(&a, Irregularity::PriceGouging, &pricing()).await;
        assert!(seen.observable);
        assert_eq!(seen.lines, vec![0]);
    }

    #[tokio::test]
    async fn test_self_pay_price_is_not_gouging() {
        let mut a = artifact(1);
        let location = Location::of(&a.facility);
        a.line_items[0].unit_price = billed_price(134.0, PayerClass::SelfPay, &location, &[]);
        let seen = observe(&a, Irregularity::PriceGouging, &pricing()).await;
        assert!(!seen.observable);
    }

    #[tokio::test]
    async fn test_gouged_price_observed() {
        let mut a = artifact(1);
        let location = Location::of(&a.facility);
        a.line_items[0].unit_price =
            billed_price(134.0, billforge_pricing::PayerFactor::Forced(5.5), &location, &[]);
        let seen = observe(&a, Irregularity::PriceGouging, &pricing()).await;
        assert!(seen.observable);
        assert_eq!(seen.lines, vec![0]);
    }

    #[test]
    fn test_upcoding_heuristic() {
        let mut a = artifact(1);
        a.clinical.acuity = Acuity::Low;
        assert_eq!(upcoded_lines(&a), vec![0]);
        a.clinical.acuity = Acuity::Moderate;
        assert!(upcoded_lines(&a).is_empty());
    }

    #[test]
    fn test_laterality_heuristic() {
        let mut a = artifact(3);
        a.clinical.laterality = Some(Laterality::Left);
        a.line_items[2].modifiers = vec!["RT".to_string()];
        assert_eq!(laterality_mismatches(&a), vec![2]);

        a.line_items[2].modifiers = vec!["LT".to_string()];
        assert!(laterality_mismatches(&a).is_empty());
    }

    #[test]
    fn test_global_period_heuristic() {
        let mut a = artifact(2);
        a.clinical.prior_procedure = Some(PriorProcedure {
            code: "29881".to_string(),
            description: "Knee arthroscopy".to_string(),
            date: date(1),
            global_days: 90,
        });
        assert_eq!(global_period_lines(&a), vec![0]);
    }
}
