//! Procedure code catalogue
//!
//! Static knowledge about the codes BillForge emits: families, evaluation
//! levels, standard panels, global surgical periods and revenue codes. The
//! catalogue is intentionally small; it covers what the generator produces
//! and what the guardians reason about.

use crate::clinical::{Acuity, CareSetting};

/// Broad code family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeFamily {
    /// Evaluation and management visit
    Evaluation(CareSetting),
    /// Laboratory test or panel
    Lab,
    /// Diagnostic imaging
    Imaging,
    /// Cardiology diagnostics
    Cardiology,
    /// Minor procedure or injection
    Procedure,
    /// Surgery with a global period
    Surgery,
    /// Drug or supply
    Drug,
    /// Anything else
    Other,
}

/// A standard laboratory panel
#[derive(Debug, Clone, Copy)]
pub struct Panel {
    /// Panel code
    pub code: &'static str,
    /// Panel name
    pub name: &'static str,
    /// Component test codes
    pub components: &'static [&'static str],
}

/// Standard panels enforced by the bundling policy
pub const PANELS: &[Panel] = &[
    Panel {
        code: "80048",
        name: "Basic metabolic panel",
        components: &["82310", "82374", "82435", "82565", "82947", "84132", "84295", "84520"],
    },
    Panel {
        code: "80053",
        name: "Comprehensive metabolic panel",
        components: &[
            "82040", "82247", "82310", "82374", "82435", "82565", "82947", "84075", "84132",
            "84155", "84295", "84450", "84460", "84520",
        ],
    },
    Panel {
        code: "80061",
        name: "Lipid panel",
        components: &["82465", "83718", "84478"],
    },
];

const DESCRIPTIONS: &[(&str, &str)] = &[
    ("99211", "Office visit, established, minimal"),
    ("99212", "Office visit, established, straightforward"),
    ("99213", "Office visit, established, low complexity"),
    ("99214", "Office visit, established, moderate complexity"),
    ("99215", "Office visit, established, high complexity"),
    ("99281", "Emergency dept visit, minimal"),
    ("99282", "Emergency dept visit, straightforward"),
    ("99283", "Emergency dept visit, low complexity"),
    ("99284", "Emergency dept visit, moderate complexity"),
    ("99285", "Emergency dept visit, high complexity"),
    ("99221", "Initial hospital care, low complexity"),
    ("99222", "Initial hospital care, moderate complexity"),
    ("99223", "Initial hospital care, high complexity"),
    ("99231", "Subsequent hospital care, low complexity"),
    ("99232", "Subsequent hospital care, moderate complexity"),
    ("99233", "Subsequent hospital care, high complexity"),
    ("99238", "Hospital discharge day management"),
    ("80048", "Basic metabolic panel"),
    ("80053", "Comprehensive metabolic panel"),
    ("80061", "Lipid panel"),
    ("82040", "Albumin, serum"),
    ("82247", "Bilirubin, total"),
    ("82310", "Calcium, total"),
    ("82374", "Carbon dioxide (bicarbonate)"),
    ("82435", "Chloride, blood"),
    ("82465", "Cholesterol, serum"),
    ("82565", "Creatinine, blood"),
    ("82947", "Glucose, quantitative"),
    ("83718", "HDL cholesterol"),
    ("84075", "Alkaline phosphatase"),
    ("84132", "Potassium, serum"),
    ("84155", "Protein, total"),
    ("84295", "Sodium, serum"),
    ("84450", "Transferase (AST)"),
    ("84460", "Transferase (ALT)"),
    ("84478", "Triglycerides"),
    ("84520", "Urea nitrogen (BUN)"),
    ("85025", "Complete blood count with differential"),
    ("36415", "Routine venipuncture"),
    ("71046", "X-ray chest, 2 views"),
    ("73030", "X-ray shoulder, 2+ views"),
    ("73560", "X-ray knee, 1-2 views"),
    ("73610", "X-ray ankle, 3+ views"),
    ("73721", "MRI lower extremity joint without contrast"),
    ("70450", "CT head without contrast"),
    ("93000", "Electrocardiogram, complete"),
    ("96372", "Therapeutic injection, IM/SC"),
    ("20610", "Arthrocentesis/injection, major joint"),
    ("12001", "Simple repair of superficial wound, 2.5 cm or less"),
    ("10060", "Incision and drainage of abscess"),
    ("29881", "Knee arthroscopy with meniscectomy"),
    ("27447", "Total knee arthroplasty"),
    ("92950", "Cardiopulmonary resuscitation"),
    ("31500", "Emergency endotracheal intubation"),
    ("36556", "Insertion of central venous catheter"),
    ("94002", "Ventilation management, initial day"),
    ("94003", "Ventilation management, subsequent day"),
    ("J1885", "Injection, ketorolac, 15 mg"),
    ("J2405", "Injection, ondansetron, 1 mg"),
];

const GLOBAL_DAYS: &[(&str, u32)] = &[
    ("27447", 90),
    ("29881", 90),
    ("12001", 10),
    ("10060", 10),
    ("20610", 0),
];

/// Unplanned critical-care services billed on the day care escalates
pub const ESCALATION_SERVICES: &[&str] = &["92950", "31500", "36556", "94002"];

/// Billed once per later day of an escalated stay
pub const ESCALATION_DAILY: &str = "94003";

const LATERAL_CODES: &[&str] = &["73030", "73560", "73610", "73721", "20610", "29881", "27447"];

/// Strip modifiers and whitespace from a code (`"99213-25"` → `"99213"`)
pub fn base_code(code: &str) -> &str {
    let trimmed = code.trim();
    trimmed
        .split(|c: char| c == '-' || c == ' ' || c == ':')
        .next()
        .unwrap_or(trimmed)
}

/// Catalogue description for a code
pub fn describe(code: &str) -> Option<&'static str> {
    let base = base_code(code);
    DESCRIPTIONS
        .iter()
        .find(|(c, _)| *c == base)
        .map(|(_, description)| *description)
}

/// Whether the catalogue knows this code
pub fn is_known(code: &str) -> bool {
    describe(code).is_some()
}

/// Classify a code into its family
pub fn family(code: &str) -> CodeFamily {
    let base = base_code(code);
    if let Some(setting) = evaluation_setting(base) {
        return CodeFamily::Evaluation(setting);
    }
    if base.starts_with('J') {
        return CodeFamily::Drug;
    }
    if global_period_days(base).map(|d| d > 0).unwrap_or(false) || base == "27447" {
        return CodeFamily::Surgery;
    }
    match base.chars().next() {
        Some('8') => CodeFamily::Lab,
        Some('7') => CodeFamily::Imaging,
        _ if base == "36415" => CodeFamily::Lab,
        _ if base == "93000" => CodeFamily::Cardiology,
        Some('9') | Some('3') | Some('2') | Some('1') => CodeFamily::Procedure,
        _ => CodeFamily::Other,
    }
}

/// The setting an evaluation code belongs to
pub fn evaluation_setting(code: &str) -> Option<CareSetting> {
    let number: u32 = base_code(code).parse().ok()?;
    match number {
        99202..=99215 => Some(CareSetting::Office),
        99281..=99285 => Some(CareSetting::Emergency),
        99221..=99239 => Some(CareSetting::Inpatient),
        _ => None,
    }
}

/// Whether a code is an evaluation and management visit
pub fn is_evaluation(code: &str) -> bool {
    evaluation_setting(code).is_some()
}

/// Evaluation level (1-5) encoded in the last digit
pub fn evaluation_level(code: &str) -> Option<u8> {
    evaluation_setting(code)?;
    let base = base_code(code);
    let last = base.chars().last()?.to_digit(10)? as u8;
    match evaluation_setting(base)? {
        CareSetting::Inpatient => Some(last.clamp(1, 3)),
        _ => Some(last),
    }
}

/// Highest evaluation level the documented acuity supports
pub fn max_level_for(acuity: Acuity, setting: CareSetting) -> u8 {
    match (setting, acuity) {
        (CareSetting::Inpatient, Acuity::Low) => 1,
        (CareSetting::Inpatient, Acuity::Moderate) => 2,
        (CareSetting::Inpatient, Acuity::High) => 3,
        (_, Acuity::Low) => 3,
        (_, Acuity::Moderate) => 4,
        (_, Acuity::High) => 5,
    }
}

/// The evaluation code matching a setting and acuity
pub fn evaluation_code_for(setting: CareSetting, acuity: Acuity) -> &'static str {
    match (setting, acuity) {
        (CareSetting::Office, Acuity::Low) => "99213",
        (CareSetting::Office, Acuity::Moderate) => "99214",
        (CareSetting::Office, Acuity::High) => "99215",
        (CareSetting::Emergency, Acuity::Low) => "99282",
        (CareSetting::Emergency, Acuity::Moderate) => "99284",
        (CareSetting::Emergency, Acuity::High) => "99285",
        (CareSetting::Inpatient, Acuity::Low) => "99221",
        (CareSetting::Inpatient, Acuity::Moderate) => "99222",
        (CareSetting::Inpatient, Acuity::High) => "99223",
        (CareSetting::OutpatientSurgery, Acuity::Low) => "99213",
        (CareSetting::OutpatientSurgery, Acuity::Moderate) => "99214",
        (CareSetting::OutpatientSurgery, Acuity::High) => "99215",
    }
}

/// The top evaluation code for a setting, used when upcoding
pub fn top_evaluation_code(setting: CareSetting) -> &'static str {
    evaluation_code_for(setting, Acuity::High)
}

/// Whether the code is an unplanned critical-care escalation service
pub fn is_escalation(code: &str) -> bool {
    let base = base_code(code);
    base == ESCALATION_DAILY || ESCALATION_SERVICES.contains(&base)
}

/// Panel whose code this is
pub fn panel(code: &str) -> Option<&'static Panel> {
    let base = base_code(code);
    PANELS.iter().find(|p| p.code == base)
}

/// Smallest panel containing this component
pub fn panel_for_component(code: &str) -> Option<&'static Panel> {
    let base = base_code(code);
    PANELS
        .iter()
        .filter(|p| p.components.contains(&base))
        .min_by_key(|p| p.components.len())
}

/// Global surgical period for a code
pub fn global_period_days(code: &str) -> Option<u32> {
    let base = base_code(code);
    GLOBAL_DAYS
        .iter()
        .find(|(c, _)| *c == base)
        .map(|(_, days)| *days)
}

/// Whether the code describes a sided body part
pub fn requires_laterality(code: &str) -> bool {
    LATERAL_CODES.contains(&base_code(code))
}

/// Whether the code splits into technical and professional components
pub fn splits_by_component(code: &str) -> bool {
    matches!(family(code), CodeFamily::Imaging | CodeFamily::Cardiology)
}

/// Revenue code a line should carry in the given setting
pub fn revenue_code_for(code: &str, setting: CareSetting) -> &'static str {
    match family(code) {
        CodeFamily::Evaluation(_) => match setting {
            CareSetting::Emergency => "0450",
            CareSetting::Inpatient => "0110",
            CareSetting::OutpatientSurgery => "0490",
            CareSetting::Office => "0510",
        },
        CodeFamily::Lab => "0300",
        CodeFamily::Imaging => {
            let base = base_code(code);
            if base.starts_with("737") {
                "0610"
            } else if base.starts_with("704") {
                "0350"
            } else {
                "0320"
            }
        }
        CodeFamily::Cardiology => "0730",
        CodeFamily::Surgery => match setting {
            CareSetting::OutpatientSurgery => "0490",
            _ => "0360",
        },
        CodeFamily::Procedure => match setting {
            CareSetting::Emergency => "0450",
            _ => "0761",
        },
        CodeFamily::Drug => "0636",
        CodeFamily::Other => "0999",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_code() {
        assert_eq!(base_code("99213-25"), "99213");
        assert_eq!(base_code(" 73030 "), "73030");
        assert_eq!(base_code("J1885"), "J1885");
    }

    #[test]
    fn test_families() {
        assert_eq!(family("99284"), CodeFamily::Evaluation(CareSetting::Emergency));
        assert_eq!(family("80053"), CodeFamily::Lab);
        assert_eq!(family("73030"), CodeFamily::Imaging);
        assert_eq!(family("29881"), CodeFamily::Surgery);
        assert_eq!(family("J2405"), CodeFamily::Drug);
        assert_eq!(family("93000"), CodeFamily::Cardiology);
        assert_eq!(family("31500"), CodeFamily::Procedure);
    }

    #[test]
    fn test_escalation_services() {
        for code in ESCALATION_SERVICES.iter().chain([&ESCALATION_DAILY]) {
            assert!(is_escalation(code));
            assert!(is_known(code));
            assert!(!is_evaluation(code));
            assert!(!requires_laterality(code));
            assert!(!splits_by_component(code));
        }
        assert!(is_escalation("94003-25"));
        assert!(!is_escalation("99223"));
    }

    #[test]
    fn test_evaluation_levels() {
        assert_eq!(evaluation_level("99215"), Some(5));
        assert_eq!(evaluation_level("99282"), Some(2));
        assert_eq!(evaluation_level("85025"), None);
        assert!(max_level_for(Acuity::Low, CareSetting::Office) < 5);
    }

    #[test]
    fn test_evaluation_code_matches_acuity() {
        for setting in [CareSetting::Office, CareSetting::Emergency, CareSetting::Inpatient] {
            for acuity in [Acuity::Low, Acuity::Moderate, Acuity::High] {
                let code = evaluation_code_for(setting, acuity);
                assert_eq!(evaluation_setting(code), Some(setting));
                assert!(evaluation_level(code).unwrap() <= max_level_for(acuity, setting));
            }
        }
    }

    #[test]
    fn test_panel_lookup() {
        assert_eq!(panel_for_component("84295").map(|p| p.code), Some("80048"));
        assert_eq!(panel_for_component("84450").map(|p| p.code), Some("80053"));
        assert_eq!(panel("80061").map(|p| p.name), Some("Lipid panel"));
        assert!(panel_for_component("85025").is_none());
    }

    #[test]
    fn test_revenue_codes() {
        assert_eq!(revenue_code_for("99284", CareSetting::Emergency), "0450");
        assert_eq!(revenue_code_for("99214", CareSetting::Office), "0510");
        assert_eq!(revenue_code_for("73721", CareSetting::Office), "0610");
        assert_eq!(revenue_code_for("85025", CareSetting::Emergency), "0300");
    }

    #[test]
    fn test_every_described_code_has_a_family() {
        for (code, _) in DESCRIPTIONS {
            assert_ne!(family(code), CodeFamily::Other, "{}", code);
        }
    }
}
