//! Reconciler configuration

use serde::{Deserialize, Serialize};

/// Which reconciliation rules run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Collapse low-acuity encounters to one day and one E/M line
    pub collapse_low_acuity: bool,

    /// Clamp line dates into the encounter's service range
    pub clamp_service_dates: bool,

    /// Normalize zero quantities and multi-unit E/M lines
    pub normalize_quantities: bool,

    /// Replace revenue codes that do not fit the care setting
    pub fix_revenue_codes: bool,

    /// Regenerate placeholder or invalid provider and tax identifiers
    pub regenerate_identifiers: bool,

    /// Round money and re-enforce line and balance closures
    pub enforce_money: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            collapse_low_acuity: true,
            clamp_service_dates: true,
            normalize_quantities: true,
            fix_revenue_codes: true,
            regenerate_identifiers: true,
            enforce_money: true,
        }
    }
}

impl ReconcileConfig {
    /// Only the closures that keep the artifact arithmetically sound
    pub fn permissive() -> Self {
        Self {
            collapse_low_acuity: false,
            clamp_service_dates: false,
            normalize_quantities: false,
            fix_revenue_codes: false,
            regenerate_identifiers: true,
            enforce_money: true,
        }
    }

    /// Every rule
    pub fn strict() -> Self {
        Self::default()
    }
}
