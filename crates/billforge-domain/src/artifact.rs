//! The billing artifact and its line items

use crate::clinical::ClinicalTruth;
use crate::codes::{base_code, Panel, PANELS};
use crate::coding::{CodingTruth, Track};
use crate::facility::FacilityIdentity;
use crate::ground_truth::GroundTruth;
use crate::money::{money_eq, round2};
use crate::scenario::Irregularity;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Values that stand in for a field nobody filled in
const AMBIGUOUS_VALUES: &[&str] = &["UNKNOWN", "N/A", "NA", "TBD", "NONE", "PENDING", "?"];

/// Whether the encounter is billed as one document or two
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingModel {
    /// One combined bill
    Combined,
    /// Facility bill plus a professional twin
    Split,
}

impl BillingModel {
    /// Model name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingModel::Combined => "combined",
            BillingModel::Split => "split",
        }
    }

    /// Parse a model name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "combined" | "single" => Some(BillingModel::Combined),
            "split" => Some(BillingModel::Split),
            _ => None,
        }
    }
}

/// Payer class driving the price multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayerClass {
    /// Federal government payer
    Medicare,
    /// State government payer
    Medicaid,
    /// Commercial insurance
    Commercial,
    /// Uninsured / self-pay
    SelfPay,
}

impl PayerClass {
    /// Payer name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            PayerClass::Medicare => "medicare",
            PayerClass::Medicaid => "medicaid",
            PayerClass::Commercial => "commercial",
            PayerClass::SelfPay => "self_pay",
        }
    }

    /// Parse a payer name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "medicare" => Some(PayerClass::Medicare),
            "medicaid" => Some(PayerClass::Medicaid),
            "commercial" | "private" => Some(PayerClass::Commercial),
            "self_pay" | "selfpay" | "uninsured" => Some(PayerClass::SelfPay),
            _ => None,
        }
    }

    /// Whether the payer pays any part of the bill
    pub fn is_insured(&self) -> bool {
        !matches!(self, PayerClass::SelfPay)
    }
}

/// Provider network participation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    /// Contracted with the payer
    InNetwork,
    /// Not contracted with the payer
    OutOfNetwork,
}

/// One itemized charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Service date
    pub date: NaiveDate,
    /// Procedure code
    pub code: String,
    /// Modifiers
    #[serde(default)]
    pub modifiers: Vec<String>,
    /// Revenue / category code
    pub revenue_code: String,
    /// Description printed on the bill
    pub description: String,
    /// Units
    pub quantity: u32,
    /// Price per unit
    pub unit_price: f64,
    /// Extended amount
    pub total: f64,
}

impl LineItem {
    /// Create a line item whose total is consistent with its price
    pub fn new(
        date: NaiveDate,
        code: impl Into<String>,
        description: impl Into<String>,
        quantity: u32,
        unit_price: f64,
    ) -> Self {
        let unit_price = round2(unit_price);
        Self {
            date,
            code: code.into(),
            modifiers: Vec::new(),
            revenue_code: String::new(),
            description: description.into(),
            quantity,
            unit_price,
            total: round2(f64::from(quantity) * unit_price),
        }
    }

    /// Attach modifiers
    pub fn with_modifiers(mut self, modifiers: Vec<String>) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Set the revenue code
    pub fn with_revenue_code(mut self, revenue_code: impl Into<String>) -> Self {
        self.revenue_code = revenue_code.into();
        self
    }

    /// `round(quantity * unit_price, 2)`
    pub fn expected_total(&self) -> f64 {
        round2(f64::from(self.quantity) * self.unit_price)
    }

    /// Whether the stored total matches the computed one
    pub fn is_total_consistent(&self) -> bool {
        money_eq(self.total, self.expected_total())
    }

    /// Code with modifiers, e.g. `73030-TC`
    pub fn full_code(&self) -> String {
        if self.modifiers.is_empty() {
            self.code.clone()
        } else {
            format!("{}-{}", self.code, self.modifiers.join("-"))
        }
    }

    /// Whether the line carries a modifier
    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m.eq_ignore_ascii_case(modifier))
    }
}

/// Kind of provenance note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// A phase used its stub fragment because the oracle failed
    OracleFallback,
    /// A deterministic rule corrected the artifact
    Corrected,
    /// An invariant is violated and no safe fix exists
    ValidationFailure,
    /// The Sentinel could not inject the requested irregularity
    InjectionDeclined,
}

/// Provenance recorded on the artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceNote {
    /// Stage that produced the note
    pub stage: String,
    /// Kind of note
    pub kind: NoteKind,
    /// Human-readable message
    pub message: String,
}

impl ProvenanceNote {
    /// Create a note
    pub fn new(stage: impl Into<String>, kind: NoteKind, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Marker left by the Sentinel when it changes the artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionMarker {
    /// Why the intervention happened
    pub reason: String,
    /// Human-readable description of each operation applied
    pub operations: Vec<String>,
    /// When it happened
    pub applied_at: DateTime<Utc>,
}

/// One row of the published document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRow {
    /// Service date
    pub date: String,
    /// Revenue code
    pub revenue_code: String,
    /// Code with modifiers
    pub code: String,
    /// Description
    pub description: String,
    /// Units
    pub quantity: String,
    /// Unit price
    pub unit_price: String,
    /// Line total
    pub total: String,
}

/// Document-formatted projection handed to the rendering collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillDocument {
    /// Document title
    pub title: String,
    /// Header lines (facility, patient, account)
    pub header: Vec<String>,
    /// Itemized rows
    pub rows: Vec<DocumentRow>,
    /// Totals block (label, amount)
    pub totals: Vec<(String, String)>,
    /// Footer notes
    pub footer: Vec<String>,
    /// Render with scanned-document styling
    pub scan_mode: bool,
}

/// The billing artifact
///
/// Owned exclusively by one pipeline run. The financial invariants
/// (`total == round(qty * unit_price, 2)` per line and
/// `grand_total == max(0, subtotal - |adjustments| - |insurance_paid|)`)
/// hold unless the scenario is the one that deliberately breaks them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillArtifact {
    /// Artifact identifier (UUIDv7)
    pub id: Uuid,
    /// Intended irregularity
    pub scenario: Irregularity,
    /// Combined or split billing
    pub billing_model: BillingModel,
    /// Which track this document is
    pub track: Track,
    /// Payer class
    pub payer: PayerClass,
    /// Network participation
    pub network_status: NetworkStatus,
    /// Billing facility
    pub facility: FacilityIdentity,
    /// Clinical truth
    pub clinical: ClinicalTruth,
    /// Coding truth
    pub coding: CodingTruth,
    /// Itemized charges
    pub line_items: Vec<LineItem>,
    /// Sum of line totals
    pub subtotal: f64,
    /// Contractual adjustments (stored non-negative)
    pub adjustments: f64,
    /// Amount paid by insurance (stored non-negative)
    pub insurance_paid: f64,
    /// Patient responsibility
    pub grand_total: f64,
    /// Good-faith estimate given before the encounter
    #[serde(default)]
    pub estimate: Option<f64>,
    /// Amount billed to the patient beyond the allowed amount
    #[serde(default)]
    pub balance_billed: Option<f64>,
    /// Professional-track twin under the split billing model
    #[serde(default)]
    pub split_twin: Option<Box<BillArtifact>>,
    /// Ground truth
    pub ground_truth: GroundTruth,
    /// Sentinel interventions
    #[serde(default)]
    pub interventions: Vec<InterventionMarker>,
    /// Provenance notes
    #[serde(default)]
    pub provenance: Vec<ProvenanceNote>,
    /// Editorial review notes
    #[serde(default)]
    pub review_notes: Vec<String>,
    /// Published document projection
    #[serde(default)]
    pub document: Option<BillDocument>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl BillArtifact {
    /// `round(Σ line totals, 2)`
    pub fn computed_subtotal(&self) -> f64 {
        round2(self.line_items.iter().map(|l| l.total).sum())
    }

    /// `max(0, subtotal - |adjustments| - |insurance_paid|)` over the stored subtotal
    pub fn computed_grand_total(&self) -> f64 {
        round2((self.subtotal - self.adjustments.abs() - self.insurance_paid.abs()).max(0.0))
    }

    /// Whether every line total matches its price
    pub fn lines_consistent(&self) -> bool {
        self.line_items.iter().all(LineItem::is_total_consistent)
    }

    /// Whether subtotal and grand total match their formulas
    pub fn balance_consistent(&self) -> bool {
        money_eq(self.subtotal, self.computed_subtotal())
            && money_eq(self.grand_total, self.computed_grand_total())
    }

    /// Recompute subtotal and grand total from the line items
    pub fn recompute_totals(&mut self) {
        self.subtotal = self.computed_subtotal();
        self.grand_total = self.computed_grand_total();
    }

    /// Indices of lines sharing a code and date with an earlier line
    pub fn duplicate_line_indices(&self) -> Vec<usize> {
        let mut duplicates = Vec::new();
        for (i, line) in self.line_items.iter().enumerate() {
            let repeated = self.line_items[..i].iter().any(|earlier| {
                earlier.code == line.code
                    && earlier.date == line.date
                    && earlier.modifiers == line.modifiers
            });
            if repeated {
                duplicates.push(i);
            }
        }
        duplicates
    }

    /// Panels whose components appear as separate lines on one date
    ///
    /// Returns each panel with the indices of its unbundled component lines.
    pub fn unbundled_panels(&self) -> Vec<(&'static Panel, Vec<usize>)> {
        let mut found = Vec::new();
        for panel in PANELS {
            let mut by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
            for (i, line) in self.line_items.iter().enumerate() {
                if panel.components.contains(&base_code(&line.code)) {
                    by_date.entry(line.date).or_default().push(i);
                }
            }
            found.extend(
                by_date
                    .into_values()
                    .filter(|indices| indices.len() >= 2)
                    .map(|indices| (panel, indices)),
            );
        }
        found
    }

    /// Critical fields that are blank
    pub fn missing_critical_fields(&self) -> Vec<String> {
        self.critical_fields()
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Critical fields holding a stand-in such as "Unknown" or "TBD"
    pub fn ambiguous_critical_fields(&self) -> Vec<String> {
        self.critical_fields()
            .into_iter()
            .filter(|(_, value)| {
                let upper = value.trim().to_uppercase();
                AMBIGUOUS_VALUES.contains(&upper.as_str())
            })
            .map(|(name, _)| name)
            .collect()
    }

    fn critical_fields(&self) -> Vec<(String, &str)> {
        let mut fields = vec![
            ("facility.name".to_string(), self.facility.name.as_str()),
            ("facility.npi".to_string(), self.facility.npi.as_str()),
            ("facility.tax_id".to_string(), self.facility.tax_id.as_str()),
            ("patient.name".to_string(), self.clinical.patient.name.as_str()),
            ("patient.member_id".to_string(), self.clinical.patient.member_id.as_str()),
        ];
        for (i, line) in self.line_items.iter().enumerate() {
            fields.push((format!("line[{}].code", i), line.code.as_str()));
        }
        fields
    }

    /// Add a provenance note
    pub fn note(&mut self, stage: &str, kind: NoteKind, message: impl Into<String>) {
        self.provenance.push(ProvenanceNote::new(stage, kind, message));
    }

    /// Notes of a given kind
    pub fn notes_of(&self, kind: NoteKind) -> impl Iterator<Item = &ProvenanceNote> {
        self.provenance.iter().filter(move |n| n.kind == kind)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::clinical::{Acuity, CareSetting, EncounterNarrative, PatientDescriptor};
    use crate::identifiers::{ein_from_seed, npi_from_seed};

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn artifact(lines: Vec<LineItem>) -> BillArtifact {
        let mut artifact = BillArtifact {
            id: Uuid::now_v7(),
            scenario: Irregularity::None,
            billing_model: BillingModel::Combined,
            track: Track::Combined,
            payer: PayerClass::Commercial,
            network_status: NetworkStatus::InNetwork,
            facility: FacilityIdentity {
                name: "Test Hospital".to_string(),
                address: "1 Main St".to_string(),
                city: "Austin".to_string(),
                region: "TX".to_string(),
                postal_code: "78701".to_string(),
                npi: npi_from_seed(10),
                tax_id: ein_from_seed(11),
                attending_npi: npi_from_seed(12),
                attending_name: "Lee Park, MD".to_string(),
            },
            clinical: ClinicalTruth {
                patient: PatientDescriptor {
                    name: "Jordan Avery".to_string(),
                    age: 44,
                    sex: "F".to_string(),
                    member_id: "MBR0001".to_string(),
                },
                encounter: EncounterNarrative::default(),
                acuity: Acuity::Moderate,
                laterality: None,
                setting: CareSetting::Emergency,
                admit_date: date(2026, 3, 2),
                discharge_date: date(2026, 3, 2),
                prior_procedure: None,
            },
            coding: CodingTruth::default(),
            line_items: lines,
            subtotal: 0.0,
            adjustments: 50.0,
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
}
