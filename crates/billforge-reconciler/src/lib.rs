//! BillForge Deterministic Reconciliation
//!
//! Post-generation invariant enforcement. The oracle-driven phases produce
//! plausible but loose artifacts; the [`Reconciler`] makes them internally
//! consistent without touching the deliberate violation the scenario asks
//! for.
//!
//! Rules are independent and individually switchable:
//! - Low-acuity encounters collapse to one calendar day and one E/M line
//! - Service dates are clamped into the encounter
//! - Quantities are normalized (no zero units, one unit per E/M)
//! - Setting-appropriate revenue codes replace mismatched ones
//! - Placeholder or invalid identifiers are regenerated
//! - Money is rounded and line/balance closures are re-enforced
//!
//! Every deletion flows through an explicit [`IndexRemap`], and the ground
//! truth is rewritten through it.
//!
//! # Examples
//!
//! ```no_run
//! use billforge_reconciler::{Reconciler, ReconcileConfig};
//!
//! let reconciler = Reconciler::new(ReconcileConfig::default());
//! // let report = reconciler.reconcile(&mut artifact, seed);
//! ```
//!
//! [`IndexRemap`]: billforge_domain::IndexRemap

#![warn(missing_docs)]

mod config;
mod reconciler;

pub use config::ReconcileConfig;
pub use reconciler::{Correction, ReconciliationReport, Reconciler, STAGE};
