//! Financial phase: priced lines, totals and the speculative ground truth
//!
//! Everything here is computed; the oracle is reached only through the
//! pricing resolver, for reference rates the benchmark table lacks.

use billforge_domain::codes::{
    evaluation_level, is_escalation, is_evaluation, max_level_for, requires_laterality, revenue_code_for,
};
use billforge_domain::{
    round2, BillArtifact, BillingModel, ClinicalTruth, CodeAssignment, CodingTruth, FacilityIdentity,
    GroundTruth, Irregularity, LineItem, NetworkStatus, PayerClass, Track,
};
use billforge_pricing::{billed_price, Location, PayerFactor, PricingResolver, GOUGING_MULTIPLIER};
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

const MATH_ERROR_MIN: f64 = 10.0;
const BALANCE_SKEW: std::ops::RangeInclusive<f64> = 50.0..=250.0;
const ESTIMATE_MARGIN: std::ops::Range<f64> = 1.0..1.15;

/// Everything the financial phase prices
pub(crate) struct Encounter<'a> {
    pub scenario: Irregularity,
    pub billing_model: BillingModel,
    pub payer: PayerClass,
    pub facility: &'a FacilityIdentity,
    pub clinical: &'a ClinicalTruth,
    pub coding: &'a CodingTruth,
}

impl Encounter<'_> {
    fn primary_track(&self) -> Track {
        match self.billing_model {
            BillingModel::Combined => Track::Combined,
            BillingModel::Split => Track::Facility,
        }
    }

    fn network_status(&self) -> NetworkStatus {
        if self.scenario == Irregularity::BalanceBilling {
            NetworkStatus::OutOfNetwork
        } else {
            NetworkStatus::InNetwork
        }
    }
}

/// A line-level break injected before totals are computed
struct LineBreak {
    index: usize,
    explanation: String,
    expected_vs_actual: String,
}

/// Price one track's assignments into line items
///
/// `gouge` names the line priced with the forced gouging multiplier instead
/// of the payer class.
async fn price_lines(
    assignments: &[&CodeAssignment],
    encounter: &Encounter<'_>,
    pricing: &PricingResolver,
    gouge: Option<usize>,
) -> Vec<LineItem> {
    let location = Location::of(encounter.facility);
    let clinical = encounter.clinical;
    let mut lines = Vec::with_capacity(assignments.len());

    for (index, assignment) in assignments.iter().enumerate() {
        let rate = pricing.resolve_rate(&assignment.code).await;
        let payer = if gouge == Some(index) {
            PayerFactor::Forced(GOUGING_MULTIPLIER)
        } else {
            PayerFactor::from(encounter.payer)
        };
        let price = billed_price(rate, payer, &location, &assignment.modifiers);
        let date = (clinical.admit_date + Duration::days(i64::from(assignment.day_offset)))
            .min(clinical.discharge_date);

        debug!("Priced {} at {:.2} (reference {:.2})", assignment.code, price, rate);
        lines.push(
            LineItem::new(date, assignment.code.clone(), assignment.description.clone(), assignment.units, price)
                .with_modifiers(assignment.modifiers.clone())
                .with_revenue_code(revenue_code_for(&assignment.code, clinical.setting)),
        );
    }
    lines
}

/// Contractual adjustment and insurer payment for a subtotal
fn settle(subtotal: f64, payer: PayerClass, network: NetworkStatus, rng: &mut StdRng) -> (f64, f64) {
    match (network, payer.is_insured()) {
        (NetworkStatus::OutOfNetwork, true) => (0.0, round2(subtotal * 0.4)),
        (NetworkStatus::OutOfNetwork, false) => (0.0, 0.0),
        (NetworkStatus::InNetwork, true) => {
            let adjustments = round2(subtotal * rng.gen_range(0.15..0.35));
            let paid = round2((subtotal - adjustments) * rng.gen_range(0.5..0.8));
            (adjustments, paid)
        }
        // Self-pay prompt-payment discount
        (NetworkStatus::InNetwork, false) => (round2(subtotal * 0.1), 0.0),
    }
}

fn inject_line_break(lines: &mut Vec<LineItem>, scenario: Irregularity, rng: &mut StdRng) -> Option<LineBreak> {
    match scenario {
        Irregularity::Duplicate => {
            let source = lines.iter().position(|line| !is_evaluation(&line.code)).unwrap_or(0);
            let line = lines.get(source)?.clone();
            let explanation = format!("{} billed twice on {}", line.full_code(), line.date);
            let expected_vs_actual = format!("expected one {} line, found two", line.full_code());
            lines.push(line);
            Some(LineBreak {
                index: lines.len() - 1,
                explanation,
                expected_vs_actual,
            })
        }
        Irregularity::MathError if !lines.is_empty() => {
            let index = rng.gen_range(0..lines.len());
            let line = &mut lines[index];
            let expected = line.expected_total();
            line.total = round2(expected + (expected * 0.1).max(MATH_ERROR_MIN));
            Some(LineBreak {
                index,
                explanation: format!("{} total does not equal quantity times unit price", line.full_code()),
                expected_vs_actual: format!("expected {:.2}, billed {:.2}", expected, line.total),
            })
        }
        _ => None,
    }
}

/// Speculative ground truth: where the irregularity lives right now
///
/// Indices are rewritten later if reconciliation removes lines.
fn ground_truth(artifact: &BillArtifact, gouged: Option<usize>, line_break: Option<LineBreak>) -> GroundTruth {
    let scenario = artifact.scenario;
    if scenario.is_clean() {
        return GroundTruth::clean();
    }

    let clinical = &artifact.clinical;
    let mut truth = GroundTruth::new(scenario, scenario.label());
    let mark_where = |truth: &mut GroundTruth, hit: &dyn Fn(&LineItem) -> bool| {
        for (index, line) in artifact.line_items.iter().enumerate() {
            if hit(line) {
                truth.mark_line(index);
            }
        }
    };

    match scenario {
        Irregularity::None => {}
        Irregularity::Duplicate | Irregularity::MathError => {
            if let Some(line_break) = line_break {
                truth.mark_line(line_break.index);
                truth.explanation = line_break.explanation;
                truth.expected_vs_actual = line_break.expected_vs_actual;
            }
        }
        Irregularity::BalanceError => {
            truth.explanation = "Grand total does not follow from subtotal, adjustments and payments".to_string();
            truth.expected_vs_actual = format!(
                "expected {:.2}, billed {:.2}",
                artifact.computed_grand_total(),
                artifact.grand_total
            );
        }
        Irregularity::PriceGouging => {
            if let Some(index) = gouged {
                truth.mark_line(index);
                truth.explanation = format!(
                    "{} priced at {:.1}x its reference rate",
                    artifact.line_items[index].full_code(),
                    GOUGING_MULTIPLIER
                );
            }
        }
        Irregularity::Upcoding => {
            let supported = max_level_for(clinical.acuity, clinical.setting);
            mark_where(&mut truth, &|line| evaluation_level(&line.code).is_some_and(|level| level > supported));
            truth.explanation = "E/M level above what the documented acuity supports".to_string();
            truth.expected_vs_actual = format!("{} acuity supports at most level {}", clinical.acuity.as_str(), supported);
        }
        Irregularity::Unbundling => {
            for (panel, indices) in artifact.unbundled_panels() {
                truth.explanation = format!("{} components billed as separate lines", panel.name);
                truth.expected_vs_actual = format!("expected one {} line, found {}", panel.code, indices.len());
                for index in indices {
                    truth.mark_line(index);
                }
            }
        }
        Irregularity::LateralityMismatch => {
            mark_where(&mut truth, &|line| requires_laterality(&line.code));
            if let Some(side) = clinical.laterality {
                truth.explanation = format!("Narrative documents the {} side, the bill codes the other", side.as_str());
            }
        }
        Irregularity::GlobalPeriod => {
            if let Some(prior) = &clinical.prior_procedure {
                mark_where(&mut truth, &|line| is_evaluation(&line.code) && prior.covers(line.date));
                truth.explanation = format!(
                    "E/M visit billed inside the {}-day global period of {} performed {}",
                    prior.global_days, prior.code, prior.date
                );
            }
        }
        Irregularity::EstimateVariance => {
            mark_where(&mut truth, &|line| is_escalation(&line.code));
            if let Some(estimate) = artifact.estimate {
                truth.explanation = "Final charges exceed the good-faith estimate".to_string();
                truth.expected_vs_actual = format!("estimated {:.2}, billed {:.2}", estimate, artifact.subtotal);
            }
        }
        Irregularity::BalanceBilling => {
            truth.explanation = "Out-of-network provider bills the patient for the balance".to_string();
            truth.expected_vs_actual = format!(
                "balance billed {:.2}",
                artifact.balance_billed.unwrap_or(artifact.grand_total)
            );
        }
        Irregularity::MissingField => {
            truth.explanation = "Patient member id left blank".to_string();
            truth.expected_vs_actual = "expected a member id, found a blank field".to_string();
        }
        Irregularity::GhostProvider => {
            truth.explanation = format!(
                "Attending NPI {} fails the check-digit test",
                artifact.facility.attending_npi
            );
        }
    }
    truth
}

/// Assemble a priced artifact for one track
fn assemble(encounter: &Encounter<'_>, track: Track, line_items: Vec<LineItem>, rng: &mut StdRng) -> BillArtifact {
    let network_status = encounter.network_status();
    let mut artifact = BillArtifact {
        id: Uuid::now_v7(),
        scenario: encounter.scenario,
        billing_model: encounter.billing_model,
        track,
        payer: encounter.payer,
        network_status,
        facility: encounter.facility.clone(),
        clinical: encounter.clinical.clone(),
        coding: encounter.coding.clone(),
        line_items,
        subtotal: 0.0,
        adjustments: 0.0,
        insurance_paid: 0.0,
        grand_total: 0.0,
        estimate: None,
        balance_billed: None,
        split_twin: None,
        ground_truth: GroundTruth::clean(),
        interventions: Vec::new(),
        provenance: Vec::new(),
        review_notes: Vec::new(),
        document: None,
        created_at: Utc::now(),
    };

    artifact.subtotal = artifact.computed_subtotal();
    let (adjustments, insurance_paid) = settle(artifact.subtotal, encounter.payer, network_status, rng);
    artifact.adjustments = adjustments;
    artifact.insurance_paid = insurance_paid;
    artifact.grand_total = artifact.computed_grand_total();
    artifact
}

/// Build the priced artifact, with the professional twin under the split model
pub(crate) async fn build(encounter: Encounter<'_>, pricing: &PricingResolver, rng: &mut StdRng) -> BillArtifact {
    let scenario = encounter.scenario;
    let primary: Vec<&CodeAssignment> = encounter.coding.on_track(encounter.primary_track()).collect();

    let gouged = (scenario == Irregularity::PriceGouging).then(|| {
        primary
            .iter()
            .position(|a| is_evaluation(&a.code))
            .unwrap_or(0)
    });
    let mut lines = price_lines(&primary, &encounter, pricing, gouged).await;
    let line_break = inject_line_break(&mut lines, scenario, rng);

    let mut artifact = assemble(&encounter, encounter.primary_track(), lines, rng);

    if scenario == Irregularity::BalanceError {
        artifact.grand_total = round2(artifact.grand_total + rng.gen_range(BALANCE_SKEW));
    }

    // The estimate covers the planned care; escalation services were never quoted.
    let planned: f64 = artifact
        .line_items
        .iter()
        .filter(|line| !is_escalation(&line.code))
        .map(|line| line.total)
        .sum();
    artifact.estimate = Some(round2(planned * rng.gen_range(ESTIMATE_MARGIN)));

    if scenario == Irregularity::BalanceBilling {
        artifact.balance_billed = Some(artifact.grand_total);
    }

    artifact.ground_truth = ground_truth(&artifact, gouged, line_break);

    if encounter.billing_model == BillingModel::Split {
        let professional: Vec<&CodeAssignment> = encounter.coding.on_track(Track::Professional).collect();
        let lines = price_lines(&professional, &encounter, pricing, None).await;
        let mut twin = assemble(&encounter, Track::Professional, lines, rng);
        twin.ground_truth = GroundTruth::new(scenario, "Irregularity is carried on the facility bill");
        artifact.split_twin = Some(Box::new(twin));
    }

    artifact
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{clinical, facility};
    use billforge_domain::{CareSetting, PriorProcedure};
    use rand::SeedableRng;

    fn coding(codes: &[&str]) -> CodingTruth {
        CodingTruth {
            procedures: codes.iter().map(|c| CodeAssignment::new(*c, *c)).collect(),
            diagnoses: Vec::new(),
        }
    }

    async fn priced(scenario: Irregularity, payer: PayerClass, codes: &[&str]) -> BillArtifact {
        let facility = facility();
        let clinical = clinical();
        let coding = coding(codes);
        let encounter = Encounter {
            scenario,
            billing_model: BillingModel::Combined,
            payer,
            facility: &facility,
            clinical: &clinical,
            coding: &coding,
        };
        build(encounter, &PricingResolver::default(), &mut StdRng::seed_from_u64(9)).await
    }

    const ED: &[&str] = &["99284", "85025", "71046"];

    #[tokio::test]
    async fn test_clean_bill_closes() {
        let artifact = priced(Irregularity::None, PayerClass::Commercial, ED).await;

        assert_eq!(artifact.line_items.len(), 3);
        assert!(artifact.lines_consistent());
        assert!(artifact.balance_consistent());
        assert!(artifact.ground_truth.offending.is_empty());
        assert!(artifact.estimate.unwrap() >= artifact.subtotal);
        assert_eq!(artifact.line_items[0].revenue_code, "0450");
    }

    #[tokio::test]
    async fn test_pricing_is_deterministic() {
        let a = priced(Irregularity::None, PayerClass::Medicare, ED).await;
        let b = priced(Irregularity::None, PayerClass::Medicare, ED).await;
        let prices = |x: &BillArtifact| x.line_items.iter().map(|l| l.unit_price).collect::<Vec<_>>();
        assert_eq!(prices(&a), prices(&b));
        assert_eq!(a.grand_total, b.grand_total);
    }

    #[tokio::test]
    async fn test_duplicate_appends_copy() {
        let artifact = priced(Irregularity::Duplicate, PayerClass::Commercial, ED).await;

        assert_eq!(artifact.line_items.len(), 4);
        assert_eq!(artifact.duplicate_line_indices(), vec![3]);
        assert_eq!(artifact.ground_truth.line_indices(), vec![3]);
        assert_eq!(artifact.line_items[3].code, "85025");
        assert!(artifact.balance_consistent());
    }

    #[tokio::test]
    async fn test_math_error_breaks_one_line_only() {
        let artifact = priced(Irregularity::MathError, PayerClass::Commercial, ED).await;

        let broken: Vec<usize> = artifact
            .line_items
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.is_total_consistent())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(broken.len(), 1);
        assert_eq!(artifact.ground_truth.line_indices(), broken);
        assert!(artifact.balance_consistent());
    }

    #[tokio::test]
    async fn test_balance_error_breaks_grand_total() {
        let artifact = priced(Irregularity::BalanceError, PayerClass::Commercial, ED).await;
        assert!(artifact.lines_consistent());
        assert!(!artifact.balance_consistent());
        assert!(artifact.grand_total - artifact.computed_grand_total() > 49.9);
    }

    #[tokio::test]
    async fn test_price_gouging_forces_multiplier() {
        let clean = priced(Irregularity::None, PayerClass::Medicare, ED).await;
        let gouged = priced(Irregularity::PriceGouging, PayerClass::Medicare, ED).await;

        let ratio = gouged.line_items[0].unit_price / clean.line_items[0].unit_price;
        assert!((ratio - GOUGING_MULTIPLIER).abs() < 0.01);
        assert_eq!(gouged.line_items[1].unit_price, clean.line_items[1].unit_price);
        assert_eq!(gouged.ground_truth.line_indices(), vec![0]);
    }

    #[tokio::test]
    async fn test_balance_billing_out_of_network() {
        let artifact = priced(Irregularity::BalanceBilling, PayerClass::Commercial, ED).await;
        assert_eq!(artifact.network_status, NetworkStatus::OutOfNetwork);
        assert_eq!(artifact.adjustments, 0.0);
        assert!(artifact.balance_billed.unwrap() > 0.0);
    }

    const ESCALATED: &[&str] = &["99223", "71046", "80053", "92950", "31500", "36556", "94002"];

    #[tokio::test]
    async fn test_estimate_variance_gap_for_every_payer() {
        for payer in [PayerClass::Medicare, PayerClass::Medicaid, PayerClass::Commercial, PayerClass::SelfPay] {
            let artifact = priced(Irregularity::EstimateVariance, payer, ESCALATED).await;
            let estimate = artifact.estimate.unwrap();
            assert!(estimate > 0.0, "{:?}", payer);
            assert!(artifact.subtotal - estimate > 400.0, "{:?}: {} vs {}", payer, artifact.subtotal, estimate);
            assert_eq!(artifact.ground_truth.line_indices(), vec![3, 4, 5, 6]);
        }
    }

    #[tokio::test]
    async fn test_estimate_covers_planned_care() {
        let artifact = priced(Irregularity::EstimateVariance, PayerClass::Medicare, ED).await;
        let estimate = artifact.estimate.unwrap();
        assert!(estimate >= artifact.subtotal);
        assert!(artifact.ground_truth.line_indices().is_empty());
    }

    #[tokio::test]
    async fn test_self_pay_has_no_insurer_payment() {
        let artifact = priced(Irregularity::None, PayerClass::SelfPay, ED).await;
        assert_eq!(artifact.insurance_paid, 0.0);
        assert!(artifact.adjustments > 0.0);
    }

    #[tokio::test]
    async fn test_global_period_marks_visit() {
        let facility = facility();
        let mut clinical = clinical();
        clinical.setting = CareSetting::Office;
        clinical.prior_procedure = Some(PriorProcedure {
            code: "29881".to_string(),
            description: "Knee arthroscopy".to_string(),
            date: clinical.admit_date - Duration::days(20),
            global_days: 90,
        });
        let coding = coding(&["99214", "36415"]);
        let encounter = Encounter {
            scenario: Irregularity::GlobalPeriod,
            billing_model: BillingModel::Combined,
            payer: PayerClass::Commercial,
            facility: &facility,
            clinical: &clinical,
            coding: &coding,
        };
        let artifact = build(encounter, &PricingResolver::default(), &mut StdRng::seed_from_u64(1)).await;
        assert_eq!(artifact.ground_truth.line_indices(), vec![0]);
    }

    #[tokio::test]
    async fn test_split_model_builds_professional_twin() {
        let facility = facility();
        let clinical = clinical();
        let coding = CodingTruth {
            procedures: crate::coding::split_tracks(vec![
                CodeAssignment::new("99284", "ED visit"),
                CodeAssignment::new("71046", "Chest x-ray"),
            ]),
            diagnoses: Vec::new(),
        };
        let encounter = Encounter {
            scenario: Irregularity::None,
            billing_model: BillingModel::Split,
            payer: PayerClass::Commercial,
            facility: &facility,
            clinical: &clinical,
            coding: &coding,
        };
        let artifact = build(encounter, &PricingResolver::default(), &mut StdRng::seed_from_u64(1)).await;

        assert_eq!(artifact.track, Track::Facility);
        assert!(artifact.line_items[1].has_modifier("TC"));
        let twin = artifact.split_twin.as_deref().unwrap();
        assert_eq!(twin.track, Track::Professional);
        assert!(twin.line_items[1].has_modifier("26"));
        assert!(twin.balance_consistent());
        assert!(twin.line_items[1].unit_price < artifact.line_items[1].unit_price);
    }
}
