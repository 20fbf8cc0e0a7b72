//! BillForge Audit Orchestrator
//!
//! Re-audits a finished artifact with eleven independent guardians and hands
//! their results to the [`Judge`], which decides whether the artifact carries
//! the irregularity it was labeled with.
//!
//! # Concurrency
//!
//! Every guardian runs as its own task in a `tokio::task::JoinSet` over an
//! `Arc` snapshot of the artifact. No guardian sees another's result; the
//! Judge runs only after all of them have returned. A guardian that panics
//! or whose oracle call fails degrades its own slot to an errored result,
//! which counts as not passed.
//!
//! # Examples
//!
//! ```no_run
//! use billforge_auditor::{AuditConfig, Auditor};
//!
//! # async fn example(artifact: billforge_domain::BillArtifact) {
//! let auditor = Auditor::new(AuditConfig::default()).unwrap();
//! let report = auditor.audit(&artifact).await;
//! println!("{} ({})", report.executive_summary, report.health_score);
//! # }
//! ```

#![warn(missing_docs)]

mod auditor;
mod config;
mod error;
mod guardians;
mod judge;

pub use auditor::{executive_summary, health_score, report_json, Auditor};
pub use config::AuditConfig;
pub use error::AuditError;
pub use guardians::price_severity;
pub use judge::{Contradiction, Judge};

#[cfg(test)]
pub(crate) mod test_support {
    use billforge_domain::codes::{describe, revenue_code_for};
    use billforge_domain::identifiers::{ein_from_seed, npi_from_seed};
    use billforge_domain::{
        Acuity, BillArtifact, BillingModel, CareSetting, ClinicalTruth, CodingTruth,
        EncounterNarrative, FacilityIdentity, GroundTruth, Irregularity, LineItem, NetworkStatus,
        PatientDescriptor, PayerClass, Track,
    };
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    const CODES: &[(&str, f64)] = &[("99284", 335.0), ("85025", 19.5), ("71046", 77.5), ("93000", 42.5)];

    /// Clean emergency visit, commercial payer, Austin TX
    pub fn artifact(lines: usize) -> BillArtifact {
        let day = |d: u32| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();
        let line_items = CODES
            .iter()
            .cycle()
            .take(lines)
            .map(|(code, price)| {
                LineItem::new(day(10), *code, describe(code).unwrap(), 1, *price)
                    .with_revenue_code(revenue_code_for(code, CareSetting::Emergency))
            })
            .collect();

        let mut artifact = BillArtifact {
            id: Uuid::now_v7(),
            scenario: Irregularity::None,
            billing_model: BillingModel::Combined,
            track: Track::Combined,
            payer: PayerClass::Commercial,
            network_status: NetworkStatus::InNetwork,
            facility: FacilityIdentity {
                name: "St. Brendan Medical Center".to_string(),
                address: "410 Cedar St".to_string(),
                city: "Austin".to_string(),
                region: "TX".to_string(),
                postal_code: "78704".to_string(),
                npi: npi_from_seed(7001),
                tax_id: ein_from_seed(7002),
                attending_npi: npi_from_seed(7003),
                attending_name: "Jordan Okafor, MD".to_string(),
            },
            clinical: ClinicalTruth {
                patient: PatientDescriptor {
                    name: "Sam Whitfield".to_string(),
                    age: 61,
                    sex: "M".to_string(),
                    member_id: "MBR8812".to_string(),
                },
                encounter: EncounterNarrative {
                    chief_complaint: "Chest tightness".to_string(),
                    history: "Onset at rest, no prior cardiac history".to_string(),
                    exam: "Vitals stable, no distress".to_string(),
                    assessment: "Chest pain, cardiac cause excluded".to_string(),
                    plan: "Discharge with primary care follow-up".to_string(),
                },
                acuity: Acuity::Moderate,
                laterality: None,
                setting: CareSetting::Emergency,
                admit_date: day(10),
                discharge_date: day(10),
                prior_procedure: None,
            },
            coding: CodingTruth::default(),
            line_items,
            subtotal: 0.0,
            adjustments: 25.0,
            insurance_paid: 150.0,
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
