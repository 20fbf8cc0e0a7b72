//! Coding phase: encounter to billable codes
//!
//! Whatever the oracle proposes goes through the same deterministic
//! normalization as the stub coding: unknown codes are dropped, one E/M
//! visit survives per encounter, lateral codes carry the documented side and
//! panel components are bundled. Scenario-specific coding (an inflated E/M
//! level, a contradicting side, separately billed panel components) is
//! applied last.

use crate::phase::{consult, stage, Notes};
use crate::prompt::{PromptBuilder, CODING_INSTRUCTIONS, CODING_SCHEMA, CODING_TASK};
use billforge_domain::codes::{
    base_code, describe, evaluation_code_for, evaluation_level, evaluation_setting, is_evaluation,
    is_known, max_level_for, panel, panel_for_component, requires_laterality, splits_by_component,
    top_evaluation_code, ESCALATION_DAILY, ESCALATION_SERVICES, PANELS,
};
use billforge_domain::{
    Acuity, BillingModel, CareSetting, ClinicalTruth, CodeAssignment, CodingTruth, DiagnosisCode,
    Irregularity, Laterality, NoteKind, Track,
};
use billforge_llm::Oracle;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;

const UNBUNDLED_PANEL: &str = "80061";
const LATERAL_FALLBACK_CODE: &str = "73030";
const MAX_UNITS: u32 = 10;

/// One distinct follow-up service per inpatient day
const INPATIENT_DAILY: &[&str] = &["85025", "80048", "93000", "36415"];

#[derive(Debug, Clone, Deserialize)]
struct ProposedService {
    code: String,
    #[serde(default = "one")]
    units: u32,
    #[serde(default)]
    day_offset: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct CodingFragment {
    #[serde(default)]
    procedures: Vec<ProposedService>,
    #[serde(default)]
    diagnoses: Vec<DiagnosisCode>,
}

fn service(code: &str, day_offset: u32) -> ProposedService {
    ProposedService {
        code: code.to_string(),
        units: 1,
        day_offset,
    }
}

/// E/M settings share code families: outpatient surgery bills office visits
fn evaluation_family(setting: CareSetting) -> CareSetting {
    match setting {
        CareSetting::OutpatientSurgery => CareSetting::Office,
        other => other,
    }
}

/// Services the stub coding bills for an encounter
fn stub_services(clinical: &ClinicalTruth, scenario: Irregularity) -> Vec<ProposedService> {
    let evaluation = evaluation_code_for(clinical.setting, clinical.acuity);
    let mut services = vec![service(evaluation, 0)];

    if clinical.laterality.is_some() {
        services.push(service(LATERAL_FALLBACK_CODE, 0));
        services.push(service("J1885", 0));
        services.push(service("96372", 0));
        return services;
    }

    if clinical.prior_procedure.is_some() {
        services.push(service("85025", 0));
        services.push(service("36415", 0));
        return services;
    }

    match clinical.setting {
        CareSetting::Emergency => {
            services.push(service("85025", 0));
            services.push(service("71046", 0));
            services.push(service("93000", 0));
            if clinical.acuity == Acuity::High {
                services.push(service("J2405", 0));
                services.push(service("96372", 0));
            }
        }
        CareSetting::Inpatient => {
            services.push(service("71046", 0));
            services.push(service("80053", 0));
            for (day, code) in (1..clinical.service_days()).zip(INPATIENT_DAILY.iter().cycle()) {
                services.push(service(code, day));
            }
        }
        CareSetting::Office | CareSetting::OutpatientSurgery => {
            services.push(service(UNBUNDLED_PANEL, 0));
            services.push(service("36415", 0));
        }
    }

    // Care escalated past what the estimate covered
    if scenario == Irregularity::EstimateVariance {
        services.extend(ESCALATION_SERVICES.iter().map(|code| service(code, 0)));
        for day in 1..clinical.service_days() {
            services.push(service(ESCALATION_DAILY, day));
        }
    }

    if scenario == Irregularity::Unbundling && !services.iter().any(|s| s.code == UNBUNDLED_PANEL) {
        services.push(service(UNBUNDLED_PANEL, 0));
    }
    services
}

fn stub_diagnoses(clinical: &ClinicalTruth) -> Vec<DiagnosisCode> {
    let (code, description) = match (clinical.laterality, &clinical.prior_procedure, clinical.setting) {
        (Some(Laterality::Left), _, _) => ("M25.512", "Pain in left shoulder"),
        (Some(_), _, _) => ("M25.511", "Pain in right shoulder"),
        (None, Some(_), _) => ("Z48.89", "Encounter for other specified surgical aftercare"),
        (None, None, CareSetting::Emergency) => ("R07.9", "Chest pain, unspecified"),
        (None, None, CareSetting::Inpatient) => ("J18.9", "Pneumonia, unspecified organism"),
        (None, None, _) => ("E78.5", "Hyperlipidemia, unspecified"),
    };
    vec![DiagnosisCode {
        code: code.to_string(),
        description: description.to_string(),
    }]
}

/// Deterministic normalization of proposed services into combined-track assignments
fn normalize(
    proposed: Vec<ProposedService>,
    clinical: &ClinicalTruth,
    scenario: Irregularity,
    notes: &mut Notes,
) -> Vec<CodeAssignment> {
    let last_day = clinical.service_days().saturating_sub(1);
    let mut corrections = Vec::new();
    let mut assignments: Vec<CodeAssignment> = Vec::new();
    let mut seen: BTreeSet<(String, u32)> = BTreeSet::new();
    let mut has_evaluation = false;

    for proposal in proposed {
        let code = base_code(&proposal.code).to_uppercase();
        let Some(description) = describe(&code) else {
            corrections.push(format!("dropped unknown code {}", code));
            continue;
        };

        if is_evaluation(&code) {
            let fits_setting = evaluation_setting(&code) == Some(evaluation_family(clinical.setting));
            if !fits_setting || has_evaluation {
                corrections.push(format!("dropped extra E/M code {}", code));
                continue;
            }
            has_evaluation = true;
        }

        if requires_laterality(&code) && clinical.laterality.is_none() {
            corrections.push(format!("dropped sided code {} without a documented side", code));
            continue;
        }

        let day_offset = proposal.day_offset.min(last_day);
        // Low-acuity stays are collapsed to one day, so a repeat would land on the same date.
        let day_key = if clinical.acuity == Acuity::Low { 0 } else { day_offset };
        if !seen.insert((code.clone(), day_key)) {
            corrections.push(format!("merged repeated code {}", code));
            continue;
        }

        let units = if is_evaluation(&code) { 1 } else { proposal.units.clamp(1, MAX_UNITS) };
        assignments.push(CodeAssignment::new(code, description).with_units(units).on_day(day_offset));
    }

    if !has_evaluation {
        let code = evaluation_code_for(clinical.setting, clinical.acuity);
        corrections.push(format!("added missing E/M code {}", code));
        assignments.insert(0, CodeAssignment::new(code, describe(code).unwrap_or("Evaluation and management")));
    }

    // The documented acuity caps the E/M level.
    let supported = max_level_for(clinical.acuity, clinical.setting);
    for assignment in assignments.iter_mut().filter(|a| is_evaluation(&a.code)) {
        if evaluation_level(&assignment.code).unwrap_or(0) > supported {
            let code = evaluation_code_for(clinical.setting, clinical.acuity);
            corrections.push(format!("lowered E/M code {} to {}", assignment.code, code));
            *assignment = CodeAssignment::new(code, describe(code).unwrap_or("Evaluation and management"))
                .on_day(assignment.day_offset);
        }
    }

    if !scenario.allows_unbundled_panels() {
        bundle_panels(&mut assignments, &mut corrections);
    }

    for correction in corrections {
        debug!("Coding: {}", correction);
        notes.push(stage::CODING, NoteKind::Corrected, correction);
    }
    assignments
}

/// Replace same-day panel components with the panel code
///
/// Largest panels are matched first when every component is present; any
/// remaining group of two or more components becomes its smallest panel.
fn bundle_panels(assignments: &mut Vec<CodeAssignment>, corrections: &mut Vec<String>) {
    let days: BTreeSet<u32> = assignments.iter().map(|a| a.day_offset).collect();

    for day in days {
        let mut by_size: Vec<_> = PANELS.iter().collect();
        by_size.sort_by_key(|p| std::cmp::Reverse(p.components.len()));

        let mut groups = Vec::new();
        for candidate in by_size {
            let complete = candidate.components.iter().all(|component| {
                assignments.iter().any(|a| a.day_offset == day && a.code == *component)
            });
            if complete {
                groups.push(candidate);
                assignments.retain(|a| !(a.day_offset == day && candidate.components.contains(&a.code.as_str())));
            }
        }

        for candidate in PANELS {
            let present = assignments
                .iter()
                .filter(|a| a.day_offset == day && panel_for_component(&a.code).map(|p| p.code) == Some(candidate.code))
                .count();
            if present >= 2 {
                groups.push(candidate);
                assignments.retain(|a| {
                    !(a.day_offset == day && panel_for_component(&a.code).map(|p| p.code) == Some(candidate.code))
                });
            }
        }

        for bundled in groups {
            let already = assignments.iter().any(|a| a.day_offset == day && a.code == bundled.code);
            corrections.push(format!("bundled {} components into {}", bundled.name, bundled.code));
            if !already {
                assignments.push(CodeAssignment::new(bundled.code, bundled.name).on_day(day));
            }
        }
    }
}

/// Apply the scenario's deliberate coding
fn apply_scenario(assignments: &mut Vec<CodeAssignment>, clinical: &ClinicalTruth, scenario: Irregularity) {
    if let Some(side) = clinical.laterality {
        let coded = match scenario {
            Irregularity::LateralityMismatch => side.opposite().unwrap_or(side),
            _ => side,
        };
        if scenario == Irregularity::LateralityMismatch && !assignments.iter().any(|a| requires_laterality(&a.code)) {
            assignments.push(CodeAssignment::new(
                LATERAL_FALLBACK_CODE,
                describe(LATERAL_FALLBACK_CODE).unwrap_or("X-ray"),
            ));
        }
        for assignment in assignments.iter_mut().filter(|a| requires_laterality(&a.code)) {
            assignment.modifiers.push(coded.modifier().to_string());
        }
    }

    match scenario {
        Irregularity::Upcoding => {
            let top = top_evaluation_code(clinical.setting);
            for assignment in assignments.iter_mut().filter(|a| is_evaluation(&a.code)) {
                *assignment = CodeAssignment::new(top, describe(top).unwrap_or("Evaluation and management"))
                    .on_day(assignment.day_offset);
            }
        }
        Irregularity::Unbundling => unbundle(assignments),
        _ => {}
    }
}

/// Bill the lipid panel's components as separate lines
fn unbundle(assignments: &mut Vec<CodeAssignment>) {
    let Some(lipid) = panel(UNBUNDLED_PANEL) else {
        return;
    };
    let already_split = assignments
        .iter()
        .filter(|a| lipid.components.contains(&a.code.as_str()))
        .count()
        >= 2;
    if already_split {
        return;
    }

    let day = assignments
        .iter()
        .find(|a| a.code == lipid.code)
        .map(|a| a.day_offset)
        .unwrap_or(0);
    assignments.retain(|a| a.code != lipid.code);
    for component in lipid.components {
        if !assignments.iter().any(|a| a.code == *component && a.day_offset == day) {
            assignments.push(CodeAssignment::new(*component, describe(component).unwrap_or(lipid.name)).on_day(day));
        }
    }
}

/// Partition combined assignments into facility and professional tracks
///
/// Component-split codes carry `TC` on the facility side and `26` on the
/// professional side; everything else appears on both tracks unmodified.
pub(crate) fn split_tracks(assignments: Vec<CodeAssignment>) -> Vec<CodeAssignment> {
    let mut facility = Vec::new();
    let mut professional = Vec::new();
    for assignment in assignments {
        let split = splits_by_component(&assignment.code);
        let mut technical = assignment.clone().on_track(Track::Facility);
        let mut interpretation = assignment.on_track(Track::Professional);
        if split {
            technical.modifiers.push("TC".to_string());
            interpretation.modifiers.push("26".to_string());
        }
        facility.push(technical);
        professional.push(interpretation);
    }
    facility.extend(professional);
    facility
}

/// Build the coding truth
pub(crate) async fn build(
    scenario: Irregularity,
    clinical: &ClinicalTruth,
    billing_model: BillingModel,
    oracle: Option<&Oracle>,
    notes: &mut Notes,
) -> CodingTruth {
    let prompt = PromptBuilder::new(CODING_TASK, CODING_INSTRUCTIONS, CODING_SCHEMA)
        .context("Care setting", clinical.setting.as_str())
        .context("Acuity", clinical.acuity.as_str())
        .context("Service days", clinical.service_days().to_string())
        .context("Encounter", clinical.encounter.full_text())
        .build();

    let (proposed, diagnoses) = match consult::<CodingFragment>(oracle, stage::CODING, &prompt, CODING_SCHEMA, notes).await {
        Some(fragment) if fragment.procedures.iter().any(|p| is_known(&p.code)) => {
            let diagnoses: Vec<DiagnosisCode> = fragment
                .diagnoses
                .into_iter()
                .filter(|d| !d.code.trim().is_empty())
                .collect();
            let diagnoses = if diagnoses.is_empty() { stub_diagnoses(clinical) } else { diagnoses };
            (fragment.procedures, diagnoses)
        }
        Some(_) => {
            notes.push(stage::CODING, NoteKind::ValidationFailure, "Oracle coding had no known codes, stub used");
            (stub_services(clinical, scenario), stub_diagnoses(clinical))
        }
        None => (stub_services(clinical, scenario), stub_diagnoses(clinical)),
    };

    let mut assignments = normalize(proposed, clinical, scenario, notes);
    apply_scenario(&mut assignments, clinical, scenario);

    let procedures = match billing_model {
        BillingModel::Combined => assignments,
        BillingModel::Split => split_tracks(assignments),
    };

    CodingTruth { procedures, diagnoses }
}
