//! Coding truth - how the encounter was translated into billable codes

use serde::{Deserialize, Serialize};

/// Which bill a coded service belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    /// Single combined bill
    Combined,
    /// Facility (institutional) side of a split bill
    Facility,
    /// Professional (physician) side of a split bill
    Professional,
}

impl Track {
    /// Track name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Combined => "combined",
            Track::Facility => "facility",
            Track::Professional => "professional",
        }
    }
}

/// One coded service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeAssignment {
    /// Procedure code (modifiers kept separately)
    pub code: String,
    /// Billing-facing description
    pub description: String,
    /// Modifiers, e.g. `["TC"]` or `["LT"]`
    #[serde(default)]
    pub modifiers: Vec<String>,
    /// Units of service
    #[serde(default = "default_units")]
    pub units: u32,
    /// Which bill this service lands on
    #[serde(default = "default_track")]
    pub track: Track,
    /// Days after admission the service was rendered
    #[serde(default)]
    pub day_offset: u32,
}

fn default_units() -> u32 {
    1
}

fn default_track() -> Track {
    Track::Combined
}

impl CodeAssignment {
    /// Create a combined-track assignment with one unit on day zero
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            modifiers: Vec::new(),
            units: 1,
            track: Track::Combined,
            day_offset: 0,
        }
    }

    /// Attach a modifier
    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifiers.push(modifier.into());
        self
    }

    /// Set the units of service
    pub fn with_units(mut self, units: u32) -> Self {
        self.units = units;
        self
    }

    /// Move to another track
    pub fn on_track(mut self, track: Track) -> Self {
        self.track = track;
        self
    }

    /// Set the service-day offset
    pub fn on_day(mut self, day_offset: u32) -> Self {
        self.day_offset = day_offset;
        self
    }
}

/// A diagnosis code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisCode {
    /// ICD-10 code
    pub code: String,
    /// Description
    pub description: String,
}

/// The complete coding decision for an encounter
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CodingTruth {
    /// Procedure and service codes, in billing order
    pub procedures: Vec<CodeAssignment>,
    /// Diagnosis codes
    #[serde(default)]
    pub diagnoses: Vec<DiagnosisCode>,
}

impl CodingTruth {
    /// Assignments on the given track
    pub fn on_track(&self, track: Track) -> impl Iterator<Item = &CodeAssignment> {
        self.procedures.iter().filter(move |a| a.track == track)
    }

    /// Whether any assignment uses the given code
    pub fn contains_code(&self, code: &str) -> bool {
        self.procedures.iter().any(|a| a.code == code)
    }

    /// Whether the coding is split into facility and professional tracks
    pub fn is_split(&self) -> bool {
        self.procedures.iter().any(|a| a.track != Track::Combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let assignment = CodeAssignment::new("73030", "X-ray shoulder")
            .with_modifier("TC")
            .on_track(Track::Facility)
            .on_day(1);
        assert_eq!(assignment.modifiers, vec!["TC"]);
        assert_eq!(assignment.track, Track::Facility);
        assert_eq!(assignment.day_offset, 1);
        assert_eq!(assignment.units, 1);
    }

    #[test]
    fn test_track_filter() {
        let coding = CodingTruth {
            procedures: vec![
                CodeAssignment::new("99284", "ED visit").on_track(Track::Facility),
                CodeAssignment::new("99284", "ED visit").on_track(Track::Professional),
            ],
            diagnoses: vec![],
        };
        assert!(coding.is_split());
        assert_eq!(coding.on_track(Track::Facility).count(), 1);
    }

    #[test]
    fn test_defaults_from_json() {
        let assignment: CodeAssignment =
            serde_json::from_str(r#"{"code": "85025", "description": "CBC"}"#).unwrap();
        assert_eq!(assignment.units, 1);
        assert_eq!(assignment.track, Track::Combined);
    }
}
