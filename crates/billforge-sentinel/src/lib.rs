//! BillForge Compliance Sentinel
//!
//! Guarantees that the irregularity an artifact is labeled with is actually
//! observable once reconciliation has finished with it. Reconciliation is
//! allowed to heal things (a collapsed low-acuity visit drops the duplicate
//! E/M line a duplicate-charge scenario depended on); the Sentinel puts the
//! irregularity back with a minimal, auditable diff.
//!
//! The Sentinel is a bounded, single-attempt state machine:
//!
//! ```text
//!            observable
//! Verify ───────────────▶ Verified
//!    │
//!    │ not observable
//!    ▼
//! NeedsRepair ──plan declined / execute failed──▶ RepairDeclined
//!    │
//!    │ plan executed on a deep copy
//!    ▼
//! Repaired
//! ```
//!
//! Mechanically checkable scenarios are verified and planned
//! deterministically; narrative scenarios (upcoding, laterality, global
//! period) consult the oracle and fall back to deterministic rules when it
//! fails. Which scenarios may be repaired at all is [`SentinelPolicy`].

#![warn(missing_docs)]

pub mod detect;
mod error;
pub mod operation;
mod planner;
mod policy;
mod sentinel;

pub use error::SentinelError;
pub use operation::{Operation, Target};
pub use planner::{Plan, Planner};
pub use policy::SentinelPolicy;
pub use sentinel::{Sentinel, SentinelOutcome, SentinelState, STAGE};
