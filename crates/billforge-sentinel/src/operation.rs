//! Repair operations and their application

use crate::SentinelError;
use billforge_domain::{BillArtifact, LineItem};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const ARTIFACT_FIELDS: &[&str] = &[
    "subtotal",
    "adjustments",
    "insurance_paid",
    "grand_total",
    "estimate",
    "balance_billed",
    "network_status",
    "payer",
];

const FACILITY_FIELDS: &[&str] = &[
    "name",
    "address",
    "city",
    "region",
    "postal_code",
    "npi",
    "tax_id",
    "attending_npi",
    "attending_name",
];

const PATIENT_FIELDS: &[&str] = &["name", "age", "sex", "member_id"];

const ENCOUNTER_FIELDS: &[&str] = &["chief_complaint", "history", "exam", "assessment", "plan"];

const CLINICAL_FIELDS: &[&str] = &[
    "acuity",
    "laterality",
    "setting",
    "admit_date",
    "discharge_date",
    "prior_procedure",
];

const LINE_FIELDS: &[&str] = &[
    "date",
    "code",
    "modifiers",
    "revenue_code",
    "description",
    "quantity",
    "unit_price",
    "total",
];

/// Part of the artifact an operation writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// Artifact-level financial fields
    Artifact,
    /// Facility identity
    Facility,
    /// Patient descriptor
    Patient,
    /// Encounter narrative
    Encounter,
    /// Clinical tags and dates
    Clinical,
    /// One line item
    Line {
        /// Line index
        index: usize,
    },
}

impl Target {
    fn allowed_fields(&self) -> &'static [&'static str] {
        match self {
            Target::Artifact => ARTIFACT_FIELDS,
            Target::Facility => FACILITY_FIELDS,
            Target::Patient => PATIENT_FIELDS,
            Target::Encounter => ENCOUNTER_FIELDS,
            Target::Clinical => CLINICAL_FIELDS,
            Target::Line { .. } => LINE_FIELDS,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Artifact => f.write_str("artifact"),
            Target::Facility => f.write_str("facility"),
            Target::Patient => f.write_str("patient"),
            Target::Encounter => f.write_str("encounter"),
            Target::Clinical => f.write_str("clinical"),
            Target::Line { index } => write!(f, "line[{}]", index),
        }
    }
}

/// One step of a repair plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Overwrite one field
    SetField {
        /// Where
        target: Target,
        /// Field name, as serialized
        field: String,
        /// New value, as serialized
        value: Value,
    },
    /// Append a copy of an existing line
    DuplicateLine {
        /// Line to copy
        index: usize,
    },
    /// Append a new line
    AddLine {
        /// The line
        item: LineItem,
    },
}

impl Operation {
    /// Shorthand for a set-field operation
    pub fn set(target: Target, field: &str, value: impl Into<Value>) -> Self {
        Operation::SetField {
            target,
            field: field.to_string(),
            value: value.into(),
        }
    }

    /// Apply to an artifact
    ///
    /// Returns the index of the line the operation touched, if any.
    pub fn apply(&self, artifact: &mut BillArtifact) -> Result<Option<usize>, SentinelError> {
        match self {
            Operation::SetField { target, field, value } => {
                if !target.allowed_fields().contains(&field.as_str()) {
                    return Err(SentinelError::InvalidOperation(format!(
                        "{} has no writable field '{}'",
                        target, field
                    )));
                }
                match target {
                    Target::Artifact => {
                        set_artifact_field(artifact, field, value)?;
                        Ok(None)
                    }
                    Target::Facility => {
                        set_field(&mut artifact.facility, field, value)?;
                        Ok(None)
                    }
                    Target::Patient => {
                        set_field(&mut artifact.clinical.patient, field, value)?;
                        Ok(None)
                    }
                    Target::Encounter => {
                        set_field(&mut artifact.clinical.encounter, field, value)?;
                        Ok(None)
                    }
                    Target::Clinical => {
                        set_field(&mut artifact.clinical, field, value)?;
                        Ok(None)
                    }
                    Target::Line { index } => {
                        let len = artifact.line_items.len();
                        let line = artifact
                            .line_items
                            .get_mut(*index)
                            .ok_or(SentinelError::LineOutOfRange { index: *index, len })?;
                        set_field(line, field, value)?;
                        Ok(Some(*index))
                    }
                }
            }
            Operation::DuplicateLine { index } => {
                let line = artifact
                    .line_items
                    .get(*index)
                    .cloned()
                    .ok_or(SentinelError::LineOutOfRange {
                        index: *index,
                        len: artifact.line_items.len(),
                    })?;
                artifact.line_items.push(line);
                Ok(Some(artifact.line_items.len() - 1))
            }
            Operation::AddLine { item } => {
                artifact.line_items.push(item.clone());
                Ok(Some(artifact.line_items.len() - 1))
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::SetField { target, field, value } => {
                write!(f, "set {}.{} = {}", target, field, value)
            }
            Operation::DuplicateLine { index } => write!(f, "duplicate line[{}]", index),
            Operation::AddLine { item } => {
                write!(f, "add line {} x{} @ {:.2}", item.full_code(), item.quantity, item.unit_price)
            }
        }
    }
}

/// Artifact-level fields are written directly rather than by round-tripping
/// the whole artifact through JSON
fn set_artifact_field(artifact: &mut BillArtifact, field: &str, value: &Value) -> Result<(), SentinelError> {
    let value = value.clone();
    match field {
        "subtotal" => artifact.subtotal = serde_json::from_value(value)?,
        "adjustments" => artifact.adjustments = serde_json::from_value(value)?,
        "insurance_paid" => artifact.insurance_paid = serde_json::from_value(value)?,
        "grand_total" => artifact.grand_total = serde_json::from_value(value)?,
        "estimate" => artifact.estimate = serde_json::from_value(value)?,
        "balance_billed" => artifact.balance_billed = serde_json::from_value(value)?,
        "network_status" => artifact.network_status = serde_json::from_value(value)?,
        "payer" => artifact.payer = serde_json::from_value(value)?,
        other => {
            return Err(SentinelError::InvalidOperation(format!(
                "artifact has no writable field '{}'",
                other
            )))
        }
    }
    Ok(())
}

/// Write one serialized field of `part`
fn set_field<T: Serialize + DeserializeOwned>(
    part: &mut T,
    field: &str,
    value: &Value,
) -> Result<(), SentinelError> {
    let mut json = serde_json::to_value(&*part)?;
    let object = json
        .as_object_mut()
        .ok_or_else(|| SentinelError::InvalidOperation("target is not an object".to_string()))?;
    object.insert(field.to_string(), value.clone());
    *part = serde_json::from_value(json)?;
    Ok(())
}
