//! Verify / plan / execute

use crate::detect::{self, Observation};
use crate::operation::Operation;
use crate::planner::{Plan, Planner};
use crate::policy::SentinelPolicy;
use billforge_domain::{BillArtifact, InterventionMarker, Irregularity, NoteKind};
use billforge_llm::Oracle;
use billforge_pricing::PricingResolver;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Provenance stage name
pub const STAGE: &str = "sentinel";

/// Sentinel states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelState {
    /// Irregularity observable, nothing changed
    Verified,
    /// Irregularity missing, a repair is being planned
    NeedsRepair,
    /// Repair not attempted or failed; artifact unchanged
    RepairDeclined,
    /// Repair applied
    Repaired,
}

/// Result of one Sentinel pass
#[derive(Debug, Clone)]
pub struct SentinelOutcome {
    /// The artifact, repaired or as received
    pub artifact: BillArtifact,
    /// Terminal state
    pub state: SentinelState,
    /// Every state visited, in order
    pub trace: Vec<SentinelState>,
    /// Why the pass ended where it did
    pub rationale: String,
    /// Operations applied (empty unless repaired)
    pub operations: Vec<Operation>,
}

#[derive(Debug, Deserialize)]
struct OracleVerdict {
    observable: bool,
    #[serde(default)]
    rationale: String,
}

/// The Compliance Sentinel
#[derive(Debug, Clone)]
pub struct Sentinel {
    policy: SentinelPolicy,
    pricing: PricingResolver,
    oracle: Option<Oracle>,
}

impl Sentinel {
    /// Create a sentinel without an oracle
    pub fn new(policy: SentinelPolicy, pricing: PricingResolver) -> Self {
        Self {
            policy,
            pricing,
            oracle: None,
        }
    }

    /// Attach the oracle used for narrative scenarios
    pub fn with_oracle(mut self, oracle: Oracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// The active policy
    pub fn policy(&self) -> &SentinelPolicy {
        &self.policy
    }

    /// Whether the artifact's scenario is observable
    pub async fn verify(&self, artifact: &BillArtifact) -> Observation {
        let scenario = artifact.scenario;
        if scenario.is_narrative() && self.policy.allow_oracle_verification {
            if let Some(oracle) = &self.oracle {
                if let Some(seen) = self.ask_oracle(oracle, artifact).await {
                    return seen;
                }
            }
        }
        detect::observe(artifact, scenario, &self.pricing).await
    }

    async fn ask_oracle(&self, oracle: &Oracle, artifact: &BillArtifact) -> Option<Observation> {
        let prompt = format!(
            "TASK: sentinel-verify\n\
             Does this bill contain the irregularity \"{}\" ({})?\n\
             Encounter: setting {}, acuity {}, laterality {}.\n\
             Narrative: {}\n\
             Lines: {}\n\
             Respond with JSON only: {{\"observable\": true|false, \"rationale\": \"...\"}}",
            artifact.scenario.as_str(),
            artifact.scenario.label(),
            artifact.clinical.setting.as_str(),
            artifact.clinical.acuity.as_str(),
            artifact.clinical.laterality.map(|l| l.as_str()).unwrap_or("none"),
            artifact.clinical.encounter.full_text(),
            artifact
                .line_items
                .iter()
                .enumerate()
                .map(|(i, l)| format!("[{}] {} {} {}", i, l.date, l.full_code(), l.description))
                .collect::<Vec<_>>()
                .join("; "),
        );

        match oracle.ask::<OracleVerdict>(&prompt, r#"{"observable": bool, "rationale": string}"#).await {
            Ok(verdict) => {
                // The oracle does not cite lines; borrow them from the heuristic.
                let heuristic = detect::observe(artifact, artifact.scenario, &self.pricing).await;
                Some(Observation {
                    observable: verdict.observable,
                    rationale: verdict.rationale,
                    lines: if verdict.observable { heuristic.lines } else { Vec::new() },
                })
            }
            Err(e) => {
                warn!("Oracle verification failed, using heuristic: {}", e);
                None
            }
        }
    }

    fn planner(&self) -> Planner {
        let planner = Planner::new(self.pricing.clone());
        match (&self.oracle, self.policy.allow_oracle_planning) {
            (Some(oracle), true) => planner.with_oracle(oracle.clone()),
            _ => planner,
        }
    }

    /// Run one bounded verify / plan / execute pass
    pub async fn run(&self, mut artifact: BillArtifact) -> SentinelOutcome {
        let scenario = artifact.scenario;
        if scenario == Irregularity::None {
            return SentinelOutcome {
                artifact,
                state: SentinelState::Verified,
                trace: vec![SentinelState::Verified],
                rationale: "Clean bill, nothing to verify".to_string(),
                operations: Vec::new(),
            };
        }

        let seen = self.verify(&artifact).await;
        if seen.observable {
            debug!("{} verified: {}", scenario, seen.rationale);
            for index in &seen.lines {
                artifact.ground_truth.mark_line(*index);
            }
            return SentinelOutcome {
                artifact,
                state: SentinelState::Verified,
                trace: vec![SentinelState::Verified],
                rationale: seen.rationale,
                operations: Vec::new(),
            };
        }

        info!("{} not observable ({}), planning repair", scenario, seen.rationale);
        let mut trace = vec![SentinelState::NeedsRepair];

        if !self.policy.may_repair(scenario) {
            let reason = format!("Policy does not allow repairing {}", scenario);
            return declined(artifact, trace, reason);
        }

        let plan = match self.planner().plan(&artifact, scenario).await {
            Ok(plan) => plan,
            Err(reason) => return declined(artifact, trace, reason),
        };

        let mut repaired = artifact.clone();
        let mut touched = Vec::new();
        for op in &plan.operations {
            match op.apply(&mut repaired) {
                Ok(Some(index)) => touched.push(index),
                Ok(None) => {}
                Err(e) => {
                    let reason = format!("Operation '{}' failed: {}", op, e);
                    return declined(artifact, trace, reason);
                }
            }
        }

        record_repair(&mut repaired, &plan, &touched);

        if self.policy.verify_after_repair {
            let check = detect::observe(&repaired, scenario, &self.pricing).await;
            if !check.observable {
                warn!("{} still not observable after repair", scenario);
                repaired.note(
                    STAGE,
                    NoteKind::ValidationFailure,
                    format!("Repair applied but {} is still not observable: {}", scenario, check.rationale),
                );
            }
        }

        info!("Repaired {} with {} operations", scenario, plan.operations.len());
        trace.push(SentinelState::Repaired);
        SentinelOutcome {
            artifact: repaired,
            state: SentinelState::Repaired,
            trace,
            rationale: plan.rationale,
            operations: plan.operations,
        }
    }
}

fn declined(mut artifact: BillArtifact, mut trace: Vec<SentinelState>, reason: String) -> SentinelOutcome {
    warn!("Repair declined: {}", reason);
    artifact.note(STAGE, NoteKind::InjectionDeclined, reason.clone());
    trace.push(SentinelState::RepairDeclined);
    SentinelOutcome {
        artifact,
        state: SentinelState::RepairDeclined,
        trace,
        rationale: reason,
        operations: Vec::new(),
    }
}

fn record_repair(artifact: &mut BillArtifact, plan: &Plan, touched: &[usize]) {
    if let Some(fallback) = &plan.oracle_fallback {
        artifact.note(STAGE, NoteKind::OracleFallback, fallback.clone());
    }

    artifact.interventions.push(InterventionMarker {
        reason: plan.rationale.clone(),
        operations: plan.operations.iter().map(ToString::to_string).collect(),
        applied_at: Utc::now(),
    });

    let truth = &mut artifact.ground_truth;
    truth.irregularity = artifact.scenario;
    for index in touched {
        truth.mark_line(*index);
    }
    if truth.explanation.trim().is_empty() {
        truth.explanation = plan.rationale.clone();
    }
    if !plan.expected_vs_actual.is_empty() {
        truth.expected_vs_actual = plan.expected_vs_actual.clone();
    }
}
