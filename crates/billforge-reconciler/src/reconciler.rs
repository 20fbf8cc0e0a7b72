//! Reconciliation rules

use crate::ReconcileConfig;
use billforge_domain::codes::{is_evaluation, revenue_code_for};
use billforge_domain::identifiers::{ein_from_seed, is_placeholder, is_valid_ein, is_valid_npi, npi_from_seed};
use billforge_domain::money::money_eq;
use billforge_domain::{round2, Acuity, BillArtifact, IndexRemap, Irregularity, NoteKind};
use chrono::NaiveDate;
use std::fmt;
use tracing::{debug, info};

/// Provenance stage name for reconciliation notes
pub const STAGE: &str = "reconciliation";

/// Upper bound on seeds tried when regenerating an identifier
const MAX_IDENTIFIER_ATTEMPTS: u64 = 64;

/// One change the reconciler made
#[derive(Debug, Clone, PartialEq)]
pub enum Correction {
    /// Multi-day low-acuity encounter collapsed to its first day
    CollapsedToOneDay {
        /// Days the encounter spanned before
        service_days: u32,
    },

    /// Extra E/M line removed from a low-acuity encounter
    RemovedEvaluationLine {
        /// Index the line had before removal
        original_index: usize,
        /// Its code
        code: String,
    },

    /// Line date moved into the encounter
    ClampedServiceDate {
        /// Line index (after any removals)
        index: usize,
        /// Old date
        from: NaiveDate,
        /// New date
        to: NaiveDate,
    },

    /// Quantity normalized
    NormalizedQuantity {
        /// Line index
        index: usize,
        /// Old quantity
        from: u32,
        /// New quantity
        to: u32,
    },

    /// Revenue code replaced with the setting-appropriate one
    ReplacedRevenueCode {
        /// Line index
        index: usize,
        /// Old revenue code
        from: String,
        /// New revenue code
        to: String,
    },

    /// Placeholder or invalid identifier regenerated
    RegeneratedIdentifier {
        /// Facility field name
        field: &'static str,
        /// Old value
        from: String,
    },

    /// Line total recomputed from quantity and unit price
    CorrectedLineTotal {
        /// Line index
        index: usize,
        /// Old total
        from: f64,
        /// New total
        to: f64,
    },

    /// Subtotal or grand total recomputed
    CorrectedBalance {
        /// Which figure
        field: &'static str,
        /// Old value
        from: f64,
        /// New value
        to: f64,
    },
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correction::CollapsedToOneDay { service_days } => {
                write!(f, "Collapsed {}-day low-acuity encounter to one day", service_days)
            }
            Correction::RemovedEvaluationLine { original_index, code } => {
                write!(f, "Removed extra E/M line {} ({})", original_index, code)
            }
            Correction::ClampedServiceDate { index, from, to } => {
                write!(f, "Moved line {} from {} to {}", index, from, to)
            }
            Correction::NormalizedQuantity { index, from, to } => {
                write!(f, "Line {} quantity {} -> {}", index, from, to)
            }
            Correction::ReplacedRevenueCode { index, from, to } => {
                write!(f, "Line {} revenue code {:?} -> {}", index, from, to)
            }
            Correction::RegeneratedIdentifier { field, from } => {
                write!(f, "Regenerated {} (was {:?})", field, from)
            }
            Correction::CorrectedLineTotal { index, from, to } => {
                write!(f, "Line {} total {:.2} -> {:.2}", index, from, to)
            }
            Correction::CorrectedBalance { field, from, to } => {
                write!(f, "{} {:.2} -> {:.2}", field, from, to)
            }
        }
    }
}

/// What a reconciliation pass did
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconciliationReport {
    /// Changes, in the order they were made
    pub corrections: Vec<Correction>,

    /// Old → new line index map for this pass
    pub remap: IndexRemap,

    /// Deliberate violations left in place
    pub preserved: Vec<String>,

    /// Report for the professional-track twin, if any
    pub twin: Option<Box<ReconciliationReport>>,
}

impl ReconciliationReport {
    /// Number of lines removed
    pub fn lines_removed(&self) -> usize {
        self.remap.removed_count()
    }

    /// Whether nothing changed
    pub fn is_noop(&self) -> bool {
        self.corrections.is_empty()
            && self.twin.as_ref().map_or(true, |twin| twin.is_noop())
    }
}

/// Applies the deterministic reconciliation rules
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    /// Create a reconciler
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reconcile an artifact in place
    ///
    /// `seed` drives identifier regeneration so reruns are reproducible.
    pub fn reconcile(&self, artifact: &mut BillArtifact, seed: u64) -> ReconciliationReport {
        let scenario = artifact.scenario;
        let mut corrections = Vec::new();
        let mut preserved = Vec::new();
        let mut remap = IndexRemap::identity(artifact.line_items.len());

        if self.config.collapse_low_acuity && artifact.clinical.acuity == Acuity::Low {
            let step = collapse_low_acuity(artifact, &mut corrections);
            remap = remap.then(&step);
        }

        if self.config.clamp_service_dates {
            clamp_service_dates(artifact, &mut corrections);
        }

        if self.config.normalize_quantities && !scenario.breaks_line_math() {
            normalize_quantities(artifact, &mut corrections);
        }

        if self.config.fix_revenue_codes {
            fix_revenue_codes(artifact, &mut corrections);
        }

        if self.config.regenerate_identifiers {
            if scenario.requires_invalid_identifier() {
                preserved.push("Provider identifiers left as generated".to_string());
            } else {
                regenerate_identifiers(artifact, seed, &mut corrections);
            }
        }

        if self.config.enforce_money {
            enforce_money(artifact, &mut corrections, &mut preserved);
        }

        artifact.ground_truth.resync(&remap);

        for correction in &corrections {
            debug!("Reconciliation: {}", correction);
            artifact.note(STAGE, NoteKind::Corrected, correction.to_string());
        }

        let twin = artifact.split_twin.as_deref_mut().map(|twin| {
            // Same facility and encounter, billed on the professional track
            twin.facility = artifact.facility.clone();
            twin.clinical = artifact.clinical.clone();
            Box::new(self.reconcile(twin, seed))
        });

        info!(
            "Reconciled artifact {}: {} corrections, {} lines removed",
            artifact.id,
            corrections.len(),
            remap.removed_count()
        );

        ReconciliationReport {
            corrections,
            remap,
            preserved,
            twin,
        }
    }
}

fn collapse_low_acuity(artifact: &mut BillArtifact, corrections: &mut Vec<Correction>) -> IndexRemap {
    let admit = artifact.clinical.admit_date;
    let service_days = artifact.clinical.service_days();
    if service_days > 1 {
        artifact.clinical.discharge_date = admit;
        corrections.push(Correction::CollapsedToOneDay { service_days });
    }

    let mut seen_evaluation = false;
    let retained: Vec<bool> = artifact
        .line_items
        .iter()
        .map(|line| {
            if !is_evaluation(&line.code) {
                return true;
            }
            let keep = !seen_evaluation;
            seen_evaluation = true;
            keep
        })
        .collect();

    let lines = std::mem::take(&mut artifact.line_items);
    for (original_index, (line, keep)) in lines.into_iter().zip(&retained).enumerate() {
        if *keep {
            artifact.line_items.push(line);
        } else {
            corrections.push(Correction::RemovedEvaluationLine {
                original_index,
                code: line.code,
            });
        }
    }

    for (index, line) in artifact.line_items.iter_mut().enumerate() {
        if line.date != admit {
            corrections.push(Correction::ClampedServiceDate {
                index,
                from: line.date,
                to: admit,
            });
            line.date = admit;
        }
    }

    let mut seen_evaluation = false;
    artifact.coding.procedures.retain(|assignment| {
        if !is_evaluation(&assignment.code) {
            return true;
        }
        let keep = !seen_evaluation;
        seen_evaluation = true;
        keep
    });
    for assignment in &mut artifact.coding.procedures {
        assignment.day_offset = 0;
    }

    IndexRemap::from_retained(&retained)
}

fn clamp_service_dates(artifact: &mut BillArtifact, corrections: &mut Vec<Correction>) {
    let admit = artifact.clinical.admit_date;
    let discharge = artifact.clinical.discharge_date.max(admit);

    for (index, line) in artifact.line_items.iter_mut().enumerate() {
        let clamped = line.date.clamp(admit, discharge);
        if clamped != line.date {
            corrections.push(Correction::ClampedServiceDate {
                index,
                from: line.date,
                to: clamped,
            });
            line.date = clamped;
        }
    }
}

fn normalize_quantities(artifact: &mut BillArtifact, corrections: &mut Vec<Correction>) {
    for (index, line) in artifact.line_items.iter_mut().enumerate() {
        let target = if line.quantity == 0 || (is_evaluation(&line.code) && line.quantity > 1) {
            1
        } else {
            continue;
        };
        corrections.push(Correction::NormalizedQuantity {
            index,
            from: line.quantity,
            to: target,
        });
        line.quantity = target;
        line.total = line.expected_total();
    }
}

fn fix_revenue_codes(artifact: &mut BillArtifact, corrections: &mut Vec<Correction>) {
    let setting = artifact.clinical.setting;
    for (index, line) in artifact.line_items.iter_mut().enumerate() {
        let expected = revenue_code_for(&line.code, setting);
        if line.revenue_code != expected {
            corrections.push(Correction::ReplacedRevenueCode {
                index,
                from: std::mem::replace(&mut line.revenue_code, expected.to_string()),
                to: expected.to_string(),
            });
        }
    }
}

fn regenerate_identifiers(artifact: &mut BillArtifact, seed: u64, corrections: &mut Vec<Correction>) {
    // A blank identifier can be the omission the missing-field scenario asks for
    let keep_blank = artifact.scenario == Irregularity::MissingField;
    let facility = &mut artifact.facility;

    if needs_npi(&facility.npi, keep_blank) {
        let other = facility.attending_npi.clone();
        let fresh = fresh_npi(seed, &other);
        corrections.push(Correction::RegeneratedIdentifier {
            field: "npi",
            from: std::mem::replace(&mut facility.npi, fresh),
        });
    }

    if needs_npi(&facility.attending_npi, keep_blank) {
        let other = facility.npi.clone();
        let fresh = fresh_npi(seed.wrapping_add(MAX_IDENTIFIER_ATTEMPTS), &other);
        corrections.push(Correction::RegeneratedIdentifier {
            field: "attending_npi",
            from: std::mem::replace(&mut facility.attending_npi, fresh),
        });
    }

    let blank_ein = keep_blank && facility.tax_id.trim().is_empty();
    if !blank_ein && !is_valid_ein(&facility.tax_id) {
        let fresh = (0..MAX_IDENTIFIER_ATTEMPTS)
            .map(|k| ein_from_seed(seed.wrapping_add(k)))
            .find(|ein| is_valid_ein(ein))
            .unwrap_or_else(|| "47-1836259".to_string());
        corrections.push(Correction::RegeneratedIdentifier {
            field: "tax_id",
            from: std::mem::replace(&mut facility.tax_id, fresh),
        });
    }
}

fn needs_npi(npi: &str, keep_blank: bool) -> bool {
    if keep_blank && npi.trim().is_empty() {
        return false;
    }
    !is_valid_npi(npi) || is_placeholder(npi)
}

fn fresh_npi(seed: u64, avoid: &str) -> String {
    (0..MAX_IDENTIFIER_ATTEMPTS)
        .map(|k| npi_from_seed(seed.wrapping_add(k)))
        .find(|npi| npi != avoid && !is_placeholder(npi))
        .unwrap_or_else(|| npi_from_seed(seed))
}

fn enforce_money(artifact: &mut BillArtifact, corrections: &mut Vec<Correction>, preserved: &mut Vec<String>) {
    let scenario = artifact.scenario;

    if scenario.breaks_line_math() {
        preserved.push("Line totals left as generated".to_string());
    } else {
        for (index, line) in artifact.line_items.iter_mut().enumerate() {
            line.unit_price = round2(line.unit_price);
            let expected = line.expected_total();
            if !money_eq(line.total, expected) {
                corrections.push(Correction::CorrectedLineTotal {
                    index,
                    from: line.total,
                    to: expected,
                });
            }
            line.total = expected;
        }
    }

    artifact.adjustments = round2(artifact.adjustments);
    artifact.insurance_paid = round2(artifact.insurance_paid);
    artifact.estimate = artifact.estimate.map(round2);
    artifact.balance_billed = artifact.balance_billed.map(round2);

    if scenario.breaks_balance() {
        preserved.push("Subtotal and grand total left as generated".to_string());
        return;
    }

    let subtotal = artifact.computed_subtotal();
    if !money_eq(artifact.subtotal, subtotal) {
        corrections.push(Correction::CorrectedBalance {
            field: "subtotal",
            from: artifact.subtotal,
            to: subtotal,
        });
    }
    artifact.subtotal = subtotal;

    let grand_total = artifact.computed_grand_total();
    if !money_eq(artifact.grand_total, grand_total) {
        corrections.push(Correction::CorrectedBalance {
            field: "grand_total",
            from: artifact.grand_total,
            to: grand_total,
        });
    }
    artifact.grand_total = grand_total;
}

#[cfg(test)]
mod tests {
    use super::*;
    use billforge_domain::identifiers::invalid_npi_from_seed;
    use billforge_domain::{
        BillingModel, CareSetting, ClinicalTruth, CodingTruth, EncounterNarrative, FacilityIdentity,
        GroundTruth, LineItem, NetworkStatus, OffendingLine, PatientDescriptor, PayerClass, Track,
    };
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    fn line(day: u32, code: &str, price: f64) -> LineItem {
        LineItem::new(date(day), code, code, 1, price)
            .with_revenue_code(revenue_code_for(code, CareSetting::Emergency))
    }

    fn artifact(lines: Vec<LineItem>) -> BillArtifact {
        let mut artifact = BillArtifact {
            id: Uuid::now_v7(),
            scenario: Irregularity::None,
            billing_model: BillingModel::Combined,
            track: Track::Combined,
            payer: PayerClass::Commercial,
            network_status: NetworkStatus::InNetwork,
            facility: FacilityIdentity {
                name: "Riverside Medical Center".to_string(),
                address: "200 River Rd".to_string(),
                city: "Austin".to_string(),
                region: "TX".to_string(),
                postal_code: "78701".to_string(),
                npi: npi_from_seed(4242),
                tax_id: ein_from_seed(77),
                attending_npi: npi_from_seed(4343),
                attending_name: "Sam Ortiz, MD".to_string(),
            },
            clinical: ClinicalTruth {
                patient: PatientDescriptor {
                    name: "Casey Morgan".to_string(),
                    age: 37,
                    sex: "M".to_string(),
                    member_id: "MBR2001".to_string(),
                },
                encounter: EncounterNarrative::default(),
                acuity: Acuity::Moderate,
                laterality: None,
                setting: CareSetting::Emergency,
                admit_date: date(1),
                discharge_date: date(1),
                prior_procedure: None,
            },
            coding: CodingTruth::default(),
            line_items: lines,
            subtotal: 0.0,
            adjustments: 25.0,
            insurance_paid: 100.0,
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
        artifact.recompute_totals();
        artifact
    }

    #[test]
    fn test_clean_artifact_is_noop() {
        let mut a = artifact(vec![line(1, "99284", 300.0), line(1, "85025", 40.0)]);
        let report = Reconciler::default().reconcile(&mut a, 1);

        assert!(report.is_noop(), "{:?}", report.corrections);
        assert!(report.remap.is_identity());
        assert!(a.provenance.is_empty());
    }

    #[test]
    fn test_low_acuity_collapse_resyncs_ground_truth() {
        let mut a = artifact(vec![
            line(1, "99283", 200.0),
            line(2, "99283", 200.0),
            line(3, "71046", 80.0),
            line(3, "99284", 300.0),
        ]);
        a.clinical.acuity = Acuity::Low;
        a.clinical.discharge_date = date(3);
        a.scenario = Irregularity::Duplicate;
        a.ground_truth = GroundTruth::new(Irregularity::Duplicate, "E/M billed twice");
        a.ground_truth.mark_line(1);
        a.ground_truth.mark_line(2);

        let report = Reconciler::default().reconcile(&mut a, 1);

        let codes: Vec<&str> = a.line_items.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["99283", "71046"]);
        assert!(a.line_items.iter().all(|l| l.date == date(1)));
        assert_eq!(a.clinical.discharge_date, date(1));
        assert_eq!(report.lines_removed(), 2);
        assert_eq!(
            a.ground_truth.offending,
            vec![OffendingLine::Deleted { original: 1 }, OffendingLine::line(1)]
        );
        assert!(a.balance_consistent());
    }

    #[test]
    fn test_revenue_codes_follow_setting() {
        let mut a = artifact(vec![
            line(1, "99284", 300.0).with_revenue_code("0510"),
            line(1, "80053", 30.0).with_revenue_code(""),
        ]);
        let report = Reconciler::default().reconcile(&mut a, 1);

        assert_eq!(a.line_items[0].revenue_code, "0450");
        assert_eq!(a.line_items[1].revenue_code, "0300");
        assert_eq!(
            report
                .corrections
                .iter()
                .filter(|c| matches!(c, Correction::ReplacedRevenueCode { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_dates_clamped_into_encounter() {
        let mut a = artifact(vec![line(1, "99284", 300.0), line(9, "71046", 80.0)]);
        Reconciler::default().reconcile(&mut a, 1);
        assert_eq!(a.line_items[1].date, date(1));
    }

    #[test]
    fn test_quantities_normalized() {
        let mut evaluation = line(1, "99284", 300.0);
        evaluation.quantity = 2;
        evaluation.total = 600.0;
        let mut zero = line(1, "85025", 40.0);
        zero.quantity = 0;
        zero.total = 0.0;

        let mut a = artifact(vec![evaluation, zero]);
        Reconciler::default().reconcile(&mut a, 1);

        assert_eq!(a.line_items[0].quantity, 1);
        assert_eq!(a.line_items[0].total, 300.0);
        assert_eq!(a.line_items[1].quantity, 1);
        assert_eq!(a.line_items[1].total, 40.0);
        assert!(a.balance_consistent());
    }

    #[test]
    fn test_placeholder_identifiers_regenerated() {
        let mut a = artifact(vec![line(1, "99284", 300.0)]);
        a.facility.npi = "1234567890".to_string();
        a.facility.tax_id = "XX-XXXXXXX".to_string();

        Reconciler::default().reconcile(&mut a, 99);

        assert!(a.facility.has_valid_identifiers());
        assert!(!a.facility.has_placeholder_identifiers());
        assert_ne!(a.facility.npi, a.facility.attending_npi);
    }

    #[test]
    fn test_ghost_provider_keeps_invalid_npi() {
        let mut a = artifact(vec![line(1, "99284", 300.0)]);
        a.scenario = Irregularity::GhostProvider;
        a.facility.attending_npi = invalid_npi_from_seed(5);

        let report = Reconciler::default().reconcile(&mut a, 99);

        assert!(!is_valid_npi(&a.facility.attending_npi));
        assert_eq!(report.preserved.len(), 1);
    }

    #[test]
    fn test_missing_field_keeps_blank_identifier() {
        let mut a = artifact(vec![line(1, "99284", 300.0)]);
        a.scenario = Irregularity::MissingField;
        a.facility.npi = String::new();

        Reconciler::default().reconcile(&mut a, 99);
        assert!(a.facility.npi.is_empty());
    }

    #[test]
    fn test_math_error_is_preserved() {
        let mut broken = line(1, "85025", 40.0);
        broken.quantity = 3;
        broken.total = 100.0;

        let mut a = artifact(vec![line(1, "99284", 300.0), broken.clone()]);
        a.scenario = Irregularity::MathError;
        Reconciler::default().reconcile(&mut a, 1);
        assert_eq!(a.line_items[1].total, 100.0);
        assert!(!a.lines_consistent());
        assert!(a.balance_consistent());

        let mut b = artifact(vec![line(1, "99284", 300.0), broken]);
        Reconciler::default().reconcile(&mut b, 1);
        assert_eq!(b.line_items[1].total, 120.0);
        assert!(b.lines_consistent());
    }

    #[test]
    fn test_balance_error_is_preserved() {
        let mut a = artifact(vec![line(1, "99284", 300.0)]);
        a.scenario = Irregularity::BalanceError;
        a.grand_total += 75.0;

        let report = Reconciler::default().reconcile(&mut a, 1);
        assert!(!a.balance_consistent());
        assert!(report.preserved.iter().any(|p| p.contains("grand total")));
    }

    #[test]
    fn test_split_twin_shares_facility() {
        let mut twin = artifact(vec![line(1, "99284", 120.0)]);
        twin.track = Track::Professional;
        twin.facility.npi = "0000000000".to_string();

        let mut a = artifact(vec![line(1, "99284", 300.0)]);
        a.billing_model = BillingModel::Split;
        a.track = Track::Facility;
        a.split_twin = Some(Box::new(twin));

        let report = Reconciler::default().reconcile(&mut a, 1);
        let twin = a.split_twin.as_ref().unwrap();
        assert_eq!(twin.facility, a.facility);
        assert!(report.twin.is_some());
    }

    #[test]
    fn test_corrections_become_provenance_notes() {
        let mut a = artifact(vec![line(1, "99284", 300.0).with_revenue_code("0999")]);
        let report = Reconciler::default().reconcile(&mut a, 1);
        assert_eq!(a.notes_of(NoteKind::Corrected).count(), report.corrections.len());
    }

    proptest! {
        #[test]
        fn closures_hold_after_reconciliation(
            prices in proptest::collection::vec(0.0f64..2000.0, 1..8),
            quantities in proptest::collection::vec(0u32..5, 8),
            adjustments in 0.0f64..500.0,
            paid in 0.0f64..3000.0,
        ) {
            let lines = prices
                .iter()
                .zip(&quantities)
                .map(|(price, qty)| {
                    let mut l = line(1, "85025", 1.0);
                    l.unit_price = *price;
                    l.quantity = *qty;
                    l.total = *price * f64::from(*qty) + 0.37;
                    l
                })
                .collect();
            let mut a = artifact(lines);
            a.adjustments = adjustments;
            a.insurance_paid = paid;
            a.subtotal = -1.0;
            a.grand_total = -1.0;

            Reconciler::default().reconcile(&mut a, 3);

            prop_assert!(a.lines_consistent());
            prop_assert!(a.balance_consistent());
            prop_assert!(a.grand_total >= 0.0);
            for l in &a.line_items {
                prop_assert_eq!(l.unit_price, round2(l.unit_price));
            }
        }

        #[test]
        fn low_acuity_collapse_keeps_offending_lines_attached(
            picks in proptest::collection::vec((0usize..6, 1u32..4), 1..10),
            offending in proptest::collection::vec(any::<bool>(), 10),
        ) {
            const CODES: [&str; 6] = ["99283", "99284", "99283", "85025", "71046", "85025"];
            let lines = picks
                .iter()
                .enumerate()
                .map(|(i, (pick, day))| {
                    let mut l = line(*day, CODES[*pick], 50.0);
                    l.description = format!("line-{i}");
                    l
                })
                .collect::<Vec<_>>();
            let mut first_evaluation = None;
            let removed: Vec<bool> = lines
                .iter()
                .enumerate()
                .map(|(i, l)| {
                    if !is_evaluation(&l.code) {
                        return false;
                    }
                    *first_evaluation.get_or_insert(i) != i
                })
                .collect();

            let mut a = artifact(lines);
            a.clinical.acuity = Acuity::Low;
            a.clinical.discharge_date = date(3);
            a.scenario = Irregularity::Duplicate;
            a.ground_truth = GroundTruth::new(Irregularity::Duplicate, "repeated service");
            let marked: Vec<usize> = (0..picks.len()).filter(|i| offending[*i]).collect();
            for index in &marked {
                a.ground_truth.mark_line(*index);
            }

            let report = Reconciler::default().reconcile(&mut a, 5);

            prop_assert_eq!(report.lines_removed(), removed.iter().filter(|r| **r).count());
            prop_assert_eq!(a.ground_truth.offending.len(), marked.len());
            for (reference, original) in a.ground_truth.offending.iter().zip(&marked) {
                match reference {
                    OffendingLine::Line { index } => {
                        prop_assert!(!removed[*original]);
                        let tag = format!("line-{original}");
                        prop_assert_eq!(&a.line_items[*index].description, &tag);
                    }
                    OffendingLine::Deleted { original: deleted } => {
                        prop_assert!(removed[*original]);
                        prop_assert_eq!(deleted, original);
                    }
                }
            }
        }
    }
}
