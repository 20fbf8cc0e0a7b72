//! BillForge Domain Layer
//!
//! This crate contains the shared data model for BillForge: the billing
//! artifact the pipeline builds, the ground truth it carries, and the audit
//! results produced against it. It holds no I/O and no async code; its only
//! dependencies are the serialization and identifier primitives every other
//! crate exchanges artifacts through.
//!
//! ## Key Concepts
//!
//! - **Irregularity**: The labeled billing anomaly an artifact is meant to contain
//! - **BillArtifact**: Facility, clinical truth, coding truth and priced line items
//! - **GroundTruth**: Where the anomaly lives, tracked across mutations via [`IndexRemap`]
//! - **GuardianResult**: One audit rule's verdict with evidence
//! - **SimulationQualityReport**: The Judge's arbitration of intended vs. detected
//!
//! ## Architecture
//!
//! - Pure business logic only
//! - Infrastructure implementations live in other crates
//! - Trait definitions for all external interactions ([`traits`])

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod audit;
pub mod clinical;
pub mod codes;
pub mod coding;
pub mod facility;
pub mod ground_truth;
pub mod identifiers;
pub mod money;
pub mod scenario;
pub mod traits;

// Re-exports for convenience
pub use artifact::{
    BillArtifact, BillDocument, BillingModel, DocumentRow, InterventionMarker, LineItem,
    NetworkStatus, NoteKind, PayerClass, ProvenanceNote,
};
pub use audit::{
    AuditReport, FailureDetail, GuardianResult, GuardianRule, Severity,
    SimulationQualityReport, Verdict,
};
pub use clinical::{Acuity, CareSetting, ClinicalTruth, EncounterNarrative, Laterality, PatientDescriptor, PriorProcedure};
pub use coding::{CodeAssignment, CodingTruth, DiagnosisCode, Track};
pub use facility::FacilityIdentity;
pub use ground_truth::{GroundTruth, IndexRemap, OffendingLine};
pub use money::round2;
pub use scenario::Irregularity;
