//! The Judge: arbitrates intended versus detected
//!
//! The Judge is the single arbitration point. It cross-checks every failing
//! result against the raw artifact before trusting it, then compares what
//! survived with the irregularity the artifact was built to carry.

use billforge_domain::codes::base_code;
use billforge_domain::{BillArtifact, GuardianResult, GuardianRule, Irregularity, SimulationQualityReport, Verdict};
use tracing::debug;

const MISSED_PENALTY: i32 = 60;
const EXTRA_FINDING_PENALTY: i32 = 10;
const HALLUCINATION_PENALTY: i32 = 25;
const ERRORED_PENALTY: i32 = 5;

/// Why a failing result was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum Contradiction {
    /// A cited line does not exist
    MissingLine(usize),
    /// A cited code is not billed
    MissingCode(String),
    /// An arithmetic claim does not hold on the artifact
    ArithmeticHolds,
}

/// Arbitrates guardian findings
#[derive(Debug, Clone, Default)]
pub struct Judge;

impl Judge {
    /// Create a judge
    pub fn new() -> Self {
        Self
    }

    /// Cross-validate one failing result against the artifact
    ///
    /// Returns the contradictions found; an empty list means the finding
    /// is consistent with the artifact's own data.
    pub fn cross_validate(&self, artifact: &BillArtifact, result: &GuardianResult) -> Vec<Contradiction> {
        let mut found = Vec::new();
        let Some(detail) = &result.failure else {
            return found;
        };

        for index in &detail.line_indices {
            if *index >= artifact.line_items.len() {
                found.push(Contradiction::MissingLine(*index));
            }
        }

        for code in &detail.codes {
            let cited = base_code(code);
            if !artifact.line_items.iter().any(|line| base_code(&line.code) == cited) {
                found.push(Contradiction::MissingCode(code.clone()));
            }
        }

        if result.rule == GuardianRule::Arithmetic {
            let claim_holds = if detail.line_indices.is_empty() {
                !artifact.balance_consistent()
            } else {
                detail
                    .line_indices
                    .iter()
                    .filter_map(|i| artifact.line_items.get(*i))
                    .any(|line| !line.is_total_consistent())
            };
            if !claim_holds {
                found.push(Contradiction::ArithmeticHolds);
            }
        }

        found
    }

    /// Score the audit against the intended irregularity
    pub fn evaluate(&self, artifact: &BillArtifact, results: &[GuardianResult]) -> SimulationQualityReport {
        let intended = artifact.scenario;
        let primary = intended.primary_guardian();

        let mut confirmed = Vec::new();
        let mut hallucinated = Vec::new();
        let mut errored = Vec::new();
        for result in results.iter().filter(|r| !r.passed) {
            if result.errored {
                errored.push(result.rule);
                continue;
            }
            let contradictions = self.cross_validate(artifact, result);
            if contradictions.is_empty() {
                confirmed.push(result.rule);
            } else {
                debug!("Rejected {} finding: {:?}", result.rule, contradictions);
                hallucinated.push(result.rule);
            }
        }

        let injection_met = match primary {
            Some(rule) => confirmed.contains(&rule),
            None => confirmed.is_empty(),
        };
        let extras: Vec<GuardianRule> = confirmed
            .iter()
            .copied()
            .filter(|rule| Some(*rule) != primary)
            .collect();

        let verdict = if !hallucinated.is_empty() {
            Verdict::HallucinationDetected
        } else if injection_met && extras.is_empty() {
            Verdict::Effective
        } else {
            Verdict::LogicGapDetected
        };

        let mut score = 100;
        if !injection_met && primary.is_some() {
            score -= MISSED_PENALTY;
        }
        score -= EXTRA_FINDING_PENALTY * extras.len() as i32;
        score -= HALLUCINATION_PENALTY * hallucinated.len() as i32;
        score -= ERRORED_PENALTY * errored.len() as i32;
        let fidelity_score = u8::try_from(score.clamp(0, 100)).unwrap_or(0);

        SimulationQualityReport {
            intended,
            injection_met,
            fidelity_score,
            verdict,
            justification: justify(intended, primary, injection_met, &extras, &hallucinated, &errored),
        }
    }
}

fn names(rules: &[GuardianRule]) -> String {
    rules.iter().map(|r| r.name()).collect::<Vec<_>>().join(", ")
}

fn justify(
    intended: Irregularity,
    primary: Option<GuardianRule>,
    injection_met: bool,
    extras: &[GuardianRule],
    hallucinated: &[GuardianRule],
    errored: &[GuardianRule],
) -> String {
    let mut parts = Vec::new();
    match (primary, injection_met) {
        (None, true) => parts.push("Clean bill and no guardian raised a confirmed finding.".to_string()),
        (None, false) => parts.push("Clean bill, but guardians raised confirmed findings.".to_string()),
        (Some(rule), true) => parts.push(format!("{} was detected by the {} guardian.", intended.label(), rule)),
        (Some(rule), false) => parts.push(format!("{} was not detected by the {} guardian.", intended.label(), rule)),
    }
    if !extras.is_empty() {
        parts.push(format!("Additional confirmed findings: {}.", names(extras)));
    }
    if !hallucinated.is_empty() {
        parts.push(format!("Findings contradicted by the bill itself: {}.", names(hallucinated)));
    }
    if !errored.is_empty() {
        parts.push(format!("Guardians that did not complete: {}.", names(errored)));
    }
    parts.join(" ")
}
