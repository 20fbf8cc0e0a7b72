//! Audit orchestration: fan out, fan in, judge

use crate::guardians::{self, GuardianContext};
use crate::judge::Judge;
use crate::{AuditConfig, AuditError};
use billforge_domain::{AuditReport, BillArtifact, GuardianResult, GuardianRule};
use billforge_llm::Oracle;
use billforge_pricing::PricingResolver;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Runs the guardians and the Judge over finished artifacts
///
/// An auditor holds no per-artifact state; one instance can audit any
/// number of artifacts, any number of times.
#[derive(Debug, Clone)]
pub struct Auditor {
    config: AuditConfig,
    pricing: PricingResolver,
    oracle: Option<Oracle>,
    judge: Judge,
}

impl Auditor {
    /// Create an auditor with the built-in benchmark table and no oracle
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        config.validate().map_err(AuditError::Config)?;
        Ok(Self {
            config,
            pricing: PricingResolver::default(),
            oracle: None,
            judge: Judge::new(),
        })
    }

    /// Use a specific pricing resolver
    pub fn with_pricing(mut self, pricing: PricingResolver) -> Self {
        self.pricing = pricing;
        self
    }

    /// Let narrative guardians consult the oracle, bounded by the configured timeout
    pub fn with_oracle(mut self, oracle: Oracle) -> Self {
        self.oracle = Some(oracle.with_timeout(self.config.oracle_timeout()));
        self
    }

    /// The active configuration
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Run every guardian concurrently and return one result per rule, in
    /// report order
    pub async fn run_guardians(&self, artifact: &BillArtifact) -> Vec<GuardianResult> {
        let snapshot = Arc::new(artifact.clone());
        let ctx = Arc::new(GuardianContext {
            config: self.config.clone(),
            pricing: self.pricing.clone(),
            oracle: self.oracle.clone(),
        });

        let mut join_set = JoinSet::new();
        for rule in GuardianRule::ALL {
            let snapshot = Arc::clone(&snapshot);
            let ctx = Arc::clone(&ctx);
            join_set.spawn(async move { guardians::run(rule, &snapshot, &ctx).await });
        }

        let mut slots: BTreeMap<GuardianRule, GuardianResult> = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => {
                    slots.insert(result.rule, result);
                }
                Err(e) => error!("Guardian task failed: {}", e),
            }
        }

        GuardianRule::ALL
            .into_iter()
            .map(|rule| {
                slots
                    .remove(&rule)
                    .unwrap_or_else(|| GuardianResult::errored(rule, "task did not return"))
            })
            .collect()
    }

    /// Audit an artifact
    pub async fn audit(&self, artifact: &BillArtifact) -> AuditReport {
        let results = self.run_guardians(artifact).await;
        let health_score = health_score(&results);
        let executive_summary = executive_summary(&results);
        let quality = self.judge.evaluate(artifact, &results);

        info!(
            "Audited {}: health {} / 100, verdict {}",
            artifact.id,
            health_score,
            quality.verdict.as_str()
        );

        AuditReport {
            artifact_id: artifact.id,
            results,
            health_score,
            executive_summary,
            quality,
            audited_at: Utc::now(),
        }
    }
}

/// `round(100 × passed / total)`; an empty result set scores 100
pub fn health_score(results: &[GuardianResult]) -> u8 {
    if results.is_empty() {
        return 100;
    }
    let passed = results.iter().filter(|r| r.passed).count();
    let score = (100.0 * passed as f64 / results.len() as f64).round();
    score.clamp(0.0, 100.0) as u8
}

/// Failing guardian names, or a clean message
pub fn executive_summary(results: &[GuardianResult]) -> String {
    let failing: Vec<&str> = results.iter().filter(|r| !r.passed).map(|r| r.rule.name()).collect();
    if failing.is_empty() {
        format!("All {} guardians passed; no irregularities found.", results.len())
    } else {
        format!(
            "{} of {} guardians flagged the bill: {}.",
            failing.len(),
            results.len(),
            failing.join(", ")
        )
    }
}

/// Serialize a report as pretty JSON
pub fn report_json(report: &AuditReport) -> Result<String, AuditError> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::artifact;
    use billforge_domain::{Irregularity, Verdict};
    use billforge_llm::MockProvider;
    use proptest::prelude::*;

    #[test]
    fn test_health_score_bounds() {
        let pass: Vec<GuardianResult> = GuardianRule::ALL.iter().map(|r| GuardianResult::pass(*r, "ok")).collect();
        let fail: Vec<GuardianResult> =
            GuardianRule::ALL.iter().map(|r| GuardianResult::errored(*r, "down")).collect();

        assert_eq!(health_score(&pass), 100);
        assert_eq!(health_score(&fail), 0);
        assert_eq!(health_score(&pass[..2]), 100);

        let mut mixed = pass.clone();
        mixed[0] = GuardianResult::errored(GuardianRule::ALL[0], "down");
        // 10 of 11 is 90.9
        assert_eq!(health_score(&mixed), 91);
    }

    #[test]
    fn test_executive_summary() {
        let mut results: Vec<GuardianResult> =
            GuardianRule::ALL.iter().map(|r| GuardianResult::pass(*r, "ok")).collect();
        assert!(executive_summary(&results).starts_with("All 11 guardians passed"));

        results[6] = GuardianResult::errored(GuardianRule::Duplicate, "down");
        assert_eq!(executive_summary(&results), "1 of 11 guardians flagged the bill: duplicate.");
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = AuditConfig {
            sensitivity: -1.0,
            ..AuditConfig::default()
        };
        assert!(matches!(Auditor::new(config), Err(AuditError::Config(_))));
    }

    #[tokio::test]
    async fn test_clean_bill_audit() {
        let auditor = Auditor::new(AuditConfig::offline()).unwrap();
        let report = auditor.audit(&artifact(4)).await;

        assert_eq!(report.results.len(), 11);
        assert_eq!(report.health_score, 100);
        assert_eq!(report.quality.verdict, Verdict::Effective);
        let order: Vec<GuardianRule> = report.results.iter().map(|r| r.rule).collect();
        assert_eq!(order, GuardianRule::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_duplicate_detected_end_to_end() {
        let mut a = artifact(3);
        a.scenario = Irregularity::Duplicate;
        a.line_items.push(a.line_items[0].clone());
        a.recompute_totals();

        let auditor = Auditor::new(AuditConfig::offline()).unwrap();
        let report = auditor.audit(&a).await;

        let duplicate = report.result_for(GuardianRule::Duplicate).unwrap();
        assert!(!duplicate.passed);
        assert!(report.quality.injection_met);
        assert_eq!(report.quality.verdict, Verdict::Effective);
    }

    #[tokio::test]
    async fn test_oracle_outage_degrades_slots() {
        let auditor = Auditor::new(AuditConfig::default())
            .unwrap()
            .with_oracle(Oracle::new(MockProvider::failing()));
        let report = auditor.audit(&artifact(4)).await;

        // The E/M line is ambiguous for upcoding; nothing else needs the oracle.
        let errored: Vec<GuardianRule> = report.results.iter().filter(|r| r.errored).map(|r| r.rule).collect();
        assert_eq!(errored, vec![GuardianRule::Upcoding]);
        assert_eq!(report.health_score, 91);
        assert_ne!(report.quality.verdict, Verdict::HallucinationDetected);
    }

    #[tokio::test]
    async fn test_report_json() {
        let report = Auditor::new(AuditConfig::offline()).unwrap().audit(&artifact(1)).await;
        let json = report_json(&report).unwrap();
        assert!(json.contains("\"health_score\": 100"));
    }

    proptest! {
        #[test]
        fn health_score_in_range(passes in proptest::collection::vec(any::<bool>(), 0..40)) {
            let results: Vec<GuardianResult> = passes
                .iter()
                .map(|p| if *p {
                    GuardianResult::pass(GuardianRule::Duplicate, "ok")
                } else {
                    GuardianResult::errored(GuardianRule::Duplicate, "down")
                })
                .collect();
            let score = health_score(&results);
            prop_assert!(score <= 100);
            if !passes.is_empty() && passes.iter().all(|p| *p) {
                prop_assert_eq!(score, 100);
            }
            if !passes.is_empty() && passes.iter().all(|p| !*p) {
                prop_assert_eq!(score, 0);
            }
        }
    }
}
