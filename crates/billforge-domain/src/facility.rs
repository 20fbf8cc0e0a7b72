//! Facility identity - who is sending the bill

use crate::identifiers::{is_placeholder, is_valid_ein, is_valid_npi};
use serde::{Deserialize, Serialize};

/// The billing facility
///
/// Created once by the Identity phase and treated as immutable for the
/// lifetime of the artifact, except for identifier regeneration during
/// reconciliation and the Sentinel's targeted repairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityIdentity {
    /// Facility display name
    pub name: String,

    /// Street address
    pub address: String,

    /// City
    pub city: String,

    /// Region (US state) code, e.g. "NY"
    pub region: String,

    /// Postal code
    pub postal_code: String,

    /// Facility (type 2) provider identifier
    pub npi: String,

    /// Employer identification number
    pub tax_id: String,

    /// Rendering (type 1) provider identifier
    pub attending_npi: String,

    /// Rendering provider name
    pub attending_name: String,
}

impl FacilityIdentity {
    /// Whether both provider identifiers pass their checksum
    pub fn has_valid_npis(&self) -> bool {
        is_valid_npi(&self.npi) && is_valid_npi(&self.attending_npi)
    }

    /// Whether any identifier is a known placeholder
    pub fn has_placeholder_identifiers(&self) -> bool {
        is_placeholder(&self.npi) || is_placeholder(&self.attending_npi) || is_placeholder(&self.tax_id)
    }

    /// Whether all identifiers are syntactically valid
    pub fn has_valid_identifiers(&self) -> bool {
        self.has_valid_npis() && is_valid_ein(&self.tax_id)
    }

    /// Single-line mailing address
    pub fn mailing_address(&self) -> String {
        format!("{}, {}, {} {}", self.address, self.city, self.region, self.postal_code)
    }
}
