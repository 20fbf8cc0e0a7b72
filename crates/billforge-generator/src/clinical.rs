//! Clinical phase: the encounter the bill is about
//!
//! The scenario decides the encounter's shape (setting, acuity, documented
//! side, prior surgery) before the oracle writes any prose, so a narrative
//! can never talk the pipeline out of the irregularity it was asked for.

use crate::phase::{consult, stage, Notes};
use crate::prompt::{PromptBuilder, CLINICAL_INSTRUCTIONS, CLINICAL_SCHEMA, CLINICAL_TASK};
use billforge_domain::codes::{describe, global_period_days};
use billforge_domain::{
    Acuity, CareSetting, ClinicalTruth, EncounterNarrative, Irregularity, Laterality, NoteKind,
    PatientDescriptor, PayerClass, PriorProcedure,
};
use billforge_llm::Oracle;
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

/// Surgery whose global period the follow-up visit falls into
pub(crate) const PRIOR_SURGERY: &str = "29881";

const STUB_NAMES: &[&str] = &[
    "Alex Morgan",
    "Riley Chen",
    "Jordan Patel",
    "Casey Nguyen",
    "Taylor Brooks",
    "Morgan Alvarez",
    "Jamie Okoro",
    "Quinn Larsen",
];

/// Encounter shape fixed before any prose is written
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Shape {
    pub setting: CareSetting,
    pub acuity: Acuity,
    pub laterality: Option<Laterality>,
    pub admit_date: NaiveDate,
    pub discharge_date: NaiveDate,
    pub prior_procedure: Option<PriorProcedure>,
}

fn anchor_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 5).unwrap_or_default()
}

/// Pick the encounter shape a scenario needs
pub(crate) fn shape_for(scenario: Irregularity, rng: &mut StdRng) -> Shape {
    let admit_date = anchor_date() + Duration::days(rng.gen_range(0..300));

    let (setting, acuity) = match scenario {
        Irregularity::Upcoding => (CareSetting::Emergency, Acuity::Moderate),
        Irregularity::Unbundling | Irregularity::GlobalPeriod => (CareSetting::Office, Acuity::Moderate),
        Irregularity::EstimateVariance => (CareSetting::Inpatient, Acuity::High),
        Irregularity::LateralityMismatch => {
            let setting = if rng.gen_bool(0.5) { CareSetting::Emergency } else { CareSetting::Office };
            (setting, Acuity::Moderate)
        }
        _ => {
            let settings = [CareSetting::Office, CareSetting::Emergency, CareSetting::Inpatient];
            let acuities = [Acuity::Low, Acuity::Moderate, Acuity::High];
            (
                settings.choose(rng).copied().unwrap_or(CareSetting::Office),
                acuities.choose(rng).copied().unwrap_or(Acuity::Moderate),
            )
        }
    };

    let laterality = (scenario == Irregularity::LateralityMismatch)
        .then(|| if rng.gen_bool(0.5) { Laterality::Left } else { Laterality::Right });

    let discharge_date = if setting == CareSetting::Inpatient {
        admit_date + Duration::days(rng.gen_range(2..=4))
    } else {
        admit_date
    };

    let prior_procedure = (scenario == Irregularity::GlobalPeriod).then(|| PriorProcedure {
        code: PRIOR_SURGERY.to_string(),
        description: describe(PRIOR_SURGERY).unwrap_or("Knee arthroscopy").to_string(),
        date: admit_date - Duration::days(rng.gen_range(14..=60)),
        global_days: global_period_days(PRIOR_SURGERY).unwrap_or(90),
    });

    Shape {
        setting,
        acuity,
        laterality,
        admit_date,
        discharge_date,
        prior_procedure,
    }
}

#[derive(Debug, Deserialize)]
struct PatientFragment {
    name: String,
    age: u32,
    sex: String,
}

#[derive(Debug, Deserialize)]
struct ClinicalFragment {
    patient: PatientFragment,
    encounter: EncounterNarrative,
}

fn narrative_problems(encounter: &EncounterNarrative, documented: Option<Laterality>) -> Vec<String> {
    let mut problems = Vec::new();
    let sections = [
        ("chief complaint", &encounter.chief_complaint),
        ("history", &encounter.history),
        ("exam", &encounter.exam),
        ("assessment", &encounter.assessment),
        ("plan", &encounter.plan),
    ];
    for (name, text) in sections {
        if text.trim().is_empty() {
            problems.push(format!("blank {}", name));
        }
    }

    let mentioned = encounter.mentioned_side();
    match documented {
        Some(side) if mentioned != Some(side) => {
            problems.push(format!("narrative does not document the {} side", side.as_str()));
        }
        None if mentioned.is_some() => problems.push("narrative mentions a body side".to_string()),
        _ => {}
    }
    problems
}

fn side_word(side: Laterality) -> &'static str {
    match side {
        Laterality::Left => "left",
        Laterality::Right => "right",
        Laterality::Bilateral => "bilateral",
    }
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Minimal encounter matching the shape
pub(crate) fn stub_encounter(shape: &Shape) -> EncounterNarrative {
    if let Some(side) = shape.laterality {
        let word = side_word(side);
        return EncounterNarrative {
            chief_complaint: format!("{} shoulder pain after a fall", capitalized(word)),
            history: "Fell onto an outstretched arm yesterday, pain worse with lifting".to_string(),
            exam: format!("Tenderness over the {} shoulder, reduced range of motion", word),
            assessment: format!("{} shoulder contusion, fracture to be excluded", capitalized(word)),
            plan: "Shoulder x-ray, sling and analgesia".to_string(),
        };
    }

    if let Some(prior) = &shape.prior_procedure {
        return EncounterNarrative {
            chief_complaint: "Knee stiffness at postoperative follow-up".to_string(),
            history: format!("Arthroscopic meniscectomy on {}, walking without crutches", prior.date),
            exam: "Portal sites healed, mild effusion, no warmth".to_string(),
            assessment: "Expected postoperative course".to_string(),
            plan: "Continue physical therapy, review in four weeks".to_string(),
        };
    }

    let severity = match shape.acuity {
        Acuity::Low => "Symptoms mild and improving without treatment.",
        Acuity::Moderate => "Symptoms persistent, workup needed to exclude serious causes.",
        Acuity::High => "Symptoms severe, required IV medication and close monitoring.",
    };

    match shape.setting {
        CareSetting::Emergency => EncounterNarrative {
            chief_complaint: "Chest tightness since this morning".to_string(),
            history: format!("Intermittent pressure at rest, no prior cardiac history. {}", severity),
            exam: "Vitals stable, lungs clear, no distress".to_string(),
            assessment: "Chest pain, acute coronary syndrome excluded".to_string(),
            plan: "Discharge home with primary care follow-up".to_string(),
        },
        CareSetting::Inpatient => EncounterNarrative {
            chief_complaint: "Fever and productive cough for four days".to_string(),
            history: format!("Worsening shortness of breath despite oral antibiotics. {}", severity),
            exam: "Crackles at the lung base, oxygen saturation 90% on room air".to_string(),
            assessment: "Community-acquired pneumonia".to_string(),
            plan: "Admit for IV antibiotics and oxygen, discharge when stable".to_string(),
        },
        CareSetting::Office | CareSetting::OutpatientSurgery => EncounterNarrative {
            chief_complaint: "Follow-up of elevated cholesterol".to_string(),
            history: format!("Taking statin as prescribed, no muscle aches. {}", severity),
            exam: "Blood pressure 128/82, heart regular".to_string(),
            assessment: "Hyperlipidemia, stable".to_string(),
            plan: "Repeat lipid panel and continue statin".to_string(),
        },
    }
}

fn stub_patient(rng: &mut StdRng) -> (String, u32, String) {
    let name = STUB_NAMES.choose(rng).copied().unwrap_or("Alex Morgan").to_string();
    let age = rng.gen_range(24..=84);
    let sex = if rng.gen_bool(0.5) { "F" } else { "M" };
    (name, age, sex.to_string())
}

fn member_id(scenario: Irregularity, payer: PayerClass, rng: &mut StdRng) -> String {
    let number: u32 = rng.gen_range(0..100_000_000);
    if scenario == Irregularity::MissingField {
        return String::new();
    }
    let prefix = if payer.is_insured() { "MBR" } else { "ACCT" };
    format!("{}{:08}", prefix, number)
}

/// Build the clinical truth
pub(crate) async fn build(
    scenario: Irregularity,
    payer: PayerClass,
    oracle: Option<&Oracle>,
    rng: &mut StdRng,
    notes: &mut Notes,
) -> ClinicalTruth {
    let shape = shape_for(scenario, rng);

    let mut prompt = PromptBuilder::new(CLINICAL_TASK, CLINICAL_INSTRUCTIONS, CLINICAL_SCHEMA)
        .context("Care setting", shape.setting.as_str())
        .context("Acuity", shape.acuity.as_str())
        .context("Documented side", shape.laterality.map(side_word).unwrap_or("none"))
        .context("Service dates", format!("{} to {}", shape.admit_date, shape.discharge_date));
    if let Some(prior) = &shape.prior_procedure {
        prompt = prompt.context(
            "Prior procedure",
            format!("{} ({}) on {}", prior.code, prior.description, prior.date),
        );
    }
    let prompt = prompt.build();

    let fragment = consult::<ClinicalFragment>(oracle, stage::CLINICAL, &prompt, CLINICAL_SCHEMA, notes).await;
    let (stub_name, stub_age, stub_sex) = stub_patient(rng);

    let (patient, encounter) = match fragment {
        Some(fragment) => {
            let patient_ok = !fragment.patient.name.trim().is_empty()
                && fragment.patient.age <= 110
                && matches!(fragment.patient.sex.trim(), "M" | "F");
            let patient = if patient_ok {
                (fragment.patient.name.trim().to_string(), fragment.patient.age, fragment.patient.sex.trim().to_string())
            } else {
                notes.push(stage::CLINICAL, NoteKind::ValidationFailure, "Oracle patient rejected, stub used");
                (stub_name, stub_age, stub_sex)
            };

            let problems = narrative_problems(&fragment.encounter, shape.laterality);
            let encounter = if problems.is_empty() {
                fragment.encounter
            } else {
                notes.push(
                    stage::CLINICAL,
                    NoteKind::ValidationFailure,
                    format!("Oracle narrative rejected ({}), stub used", problems.join(", ")),
                );
                stub_encounter(&shape)
            };
            (patient, encounter)
        }
        None => ((stub_name, stub_age, stub_sex), stub_encounter(&shape)),
    };

    let (name, age, sex) = patient;
    ClinicalTruth {
        patient: PatientDescriptor {
            name,
            age,
            sex,
            member_id: member_id(scenario, payer, rng),
        },
        encounter,
        acuity: shape.acuity,
        laterality: shape.laterality,
        setting: shape.setting,
        admit_date: shape.admit_date,
        discharge_date: shape.discharge_date,
        prior_procedure: shape.prior_procedure,
    }
}
