//! Clinical truth - what actually happened during the encounter

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Documented complexity of the encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acuity {
    /// Straightforward problem, minimal workup
    Low,
    /// Moderate complexity
    Moderate,
    /// High complexity or threat to life
    High,
}

impl Acuity {
    /// Acuity name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Acuity::Low => "low",
            Acuity::Moderate => "moderate",
            Acuity::High => "high",
        }
    }

    /// Parse an acuity tag
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" | "minimal" | "straightforward" => Some(Acuity::Low),
            "moderate" | "medium" => Some(Acuity::Moderate),
            "high" | "severe" | "critical" => Some(Acuity::High),
            _ => None,
        }
    }
}

/// Anatomical side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Laterality {
    /// Left side
    Left,
    /// Right side
    Right,
    /// Both sides
    Bilateral,
}

impl Laterality {
    /// Side name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Laterality::Left => "left",
            Laterality::Right => "right",
            Laterality::Bilateral => "bilateral",
        }
    }

    /// Parse a side tag
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" | "lt" => Some(Laterality::Left),
            "right" | "rt" => Some(Laterality::Right),
            "bilateral" | "both" => Some(Laterality::Bilateral),
            _ => None,
        }
    }

    /// The billing modifier that encodes this side
    pub fn modifier(&self) -> &'static str {
        match self {
            Laterality::Left => "LT",
            Laterality::Right => "RT",
            Laterality::Bilateral => "50",
        }
    }

    /// Recover a side from a billing modifier
    pub fn from_modifier(modifier: &str) -> Option<Self> {
        match modifier.trim().to_uppercase().as_str() {
            "LT" => Some(Laterality::Left),
            "RT" => Some(Laterality::Right),
            "50" => Some(Laterality::Bilateral),
            _ => None,
        }
    }

    /// The contradicting side (bilateral has none)
    pub fn opposite(&self) -> Option<Self> {
        match self {
            Laterality::Left => Some(Laterality::Right),
            Laterality::Right => Some(Laterality::Left),
            Laterality::Bilateral => None,
        }
    }
}

/// Site of service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareSetting {
    /// Physician office / clinic
    Office,
    /// Emergency department
    Emergency,
    /// Hospital outpatient surgery
    OutpatientSurgery,
    /// Inpatient admission
    Inpatient,
}

impl CareSetting {
    /// Setting name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            CareSetting::Office => "office",
            CareSetting::Emergency => "emergency",
            CareSetting::OutpatientSurgery => "outpatient_surgery",
            CareSetting::Inpatient => "inpatient",
        }
    }

    /// Parse a setting tag
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "office" | "clinic" => Some(CareSetting::Office),
            "emergency" | "ed" | "er" => Some(CareSetting::Emergency),
            "outpatient_surgery" | "ambulatory_surgery" | "asc" => Some(CareSetting::OutpatientSurgery),
            "inpatient" | "hospital" => Some(CareSetting::Inpatient),
            _ => None,
        }
    }
}

/// Patient demographics (synthetic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientDescriptor {
    /// Patient full name
    pub name: String,
    /// Age in years
    pub age: u32,
    /// Administrative sex
    pub sex: String,
    /// Insurance member identifier
    pub member_id: String,
}

/// Encounter narrative in SOAP-like sections
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EncounterNarrative {
    /// Chief complaint
    pub chief_complaint: String,
    /// History of present illness
    pub history: String,
    /// Examination findings
    pub exam: String,
    /// Assessment
    pub assessment: String,
    /// Plan
    pub plan: String,
}

impl EncounterNarrative {
    /// All sections joined, for keyword scans
    pub fn full_text(&self) -> String {
        [
            self.chief_complaint.as_str(),
            self.history.as_str(),
            self.exam.as_str(),
            self.assessment.as_str(),
            self.plan.as_str(),
        ]
        .join(" ")
    }

    /// Side mentioned in the narrative, if exactly one side is mentioned
    pub fn mentioned_side(&self) -> Option<Laterality> {
        let text = self.full_text().to_lowercase();
        if text.contains("bilateral") {
            return Some(Laterality::Bilateral);
        }
        let left = text.contains("left");
        let right = text.contains("right");
        match (left, right) {
            (true, false) => Some(Laterality::Left),
            (false, true) => Some(Laterality::Right),
            _ => None,
        }
    }
}

/// A surgery performed before this encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorProcedure {
    /// Procedure code
    pub code: String,
    /// Description
    pub description: String,
    /// Date performed
    pub date: NaiveDate,
    /// Global surgical period in days
    pub global_days: u32,
}

impl PriorProcedure {
    /// Whether a date falls inside the global surgical period
    pub fn covers(&self, date: NaiveDate) -> bool {
        let elapsed = (date - self.date).num_days();
        elapsed > 0 && elapsed <= i64::from(self.global_days)
    }
}

/// Everything the Clinical phase decides about the encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalTruth {
    /// Patient descriptor
    pub patient: PatientDescriptor,
    /// Encounter narrative
    pub encounter: EncounterNarrative,
    /// Documented complexity
    pub acuity: Acuity,
    /// Anatomical side, when the encounter has one
    pub laterality: Option<Laterality>,
    /// Site of service
    pub setting: CareSetting,
    /// First service date
    pub admit_date: NaiveDate,
    /// Last service date
    pub discharge_date: NaiveDate,
    /// Earlier surgery with a global period, if any
    #[serde(default)]
    pub prior_procedure: Option<PriorProcedure>,
}

impl ClinicalTruth {
    /// Number of calendar days spanned by the encounter (at least 1)
    pub fn service_days(&self) -> u32 {
        let span = (self.discharge_date - self.admit_date).num_days();
        u32::try_from(span.max(0)).unwrap_or(0) + 1
    }

    /// Whether a date lies within the encounter
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.admit_date && date <= self.discharge_date
    }
}
