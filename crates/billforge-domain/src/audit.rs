//! Audit results - guardian verdicts and the Judge's report

use crate::scenario::Irregularity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An independent audit rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardianRule {
    /// Evaluation level plausibility
    Upcoding,
    /// Anatomical side consistency
    Laterality,
    /// Post-procedure global period billing
    GlobalPeriod,
    /// Line and balance arithmetic
    Arithmetic,
    /// Price versus benchmark
    PriceBenchmark,
    /// Panel fragmentation
    Unbundling,
    /// Same-day duplication
    Duplicate,
    /// Estimate versus final bill
    EstimateVariance,
    /// Out-of-network balance billing
    BalanceBilling,
    /// Missing critical fields
    MissingField,
    /// Ghost charges and invalid provider identifiers
    GhostCharge,
}

impl GuardianRule {
    /// Every guardian, in report order
    pub const ALL: [GuardianRule; 11] = [
        GuardianRule::Upcoding,
        GuardianRule::Laterality,
        GuardianRule::GlobalPeriod,
        GuardianRule::Arithmetic,
        GuardianRule::PriceBenchmark,
        GuardianRule::Unbundling,
        GuardianRule::Duplicate,
        GuardianRule::EstimateVariance,
        GuardianRule::BalanceBilling,
        GuardianRule::MissingField,
        GuardianRule::GhostCharge,
    ];

    /// Guardian name
    pub fn name(&self) -> &'static str {
        match self {
            GuardianRule::Upcoding => "upcoding",
            GuardianRule::Laterality => "laterality",
            GuardianRule::GlobalPeriod => "global-period",
            GuardianRule::Arithmetic => "arithmetic",
            GuardianRule::PriceBenchmark => "price-benchmark",
            GuardianRule::Unbundling => "unbundling",
            GuardianRule::Duplicate => "duplicate",
            GuardianRule::EstimateVariance => "estimate-variance",
            GuardianRule::BalanceBilling => "balance-billing",
            GuardianRule::MissingField => "missing-field",
            GuardianRule::GhostCharge => "ghost-charge",
        }
    }

    /// Whether a finding of this guardian supports the given scenario
    pub fn detects(&self, irregularity: Irregularity) -> bool {
        irregularity.primary_guardian() == Some(*self)
    }
}

impl fmt::Display for GuardianRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How far outside the norm a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Past the flag threshold
    Outlier,
    /// Past 1.2× the flag threshold
    Major,
    /// Past 2.0× the flag threshold
    Extreme,
}

/// Structured detail attached to a failing result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Offending line indices
    #[serde(default)]
    pub line_indices: Vec<usize>,
    /// Codes the finding cites
    #[serde(default)]
    pub codes: Vec<String>,
    /// What the guardian expected
    #[serde(default)]
    pub expected: String,
    /// What the bill shows
    #[serde(default)]
    pub actual: String,
    /// Severity, for graded findings
    #[serde(default)]
    pub severity: Option<Severity>,
}

impl FailureDetail {
    /// Detail citing the given lines
    pub fn lines(line_indices: Vec<usize>) -> Self {
        Self {
            line_indices,
            ..Default::default()
        }
    }

    /// Set expected and actual
    pub fn expected_actual(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = expected.into();
        self.actual = actual.into();
        self
    }

    /// Cite codes
    pub fn with_codes(mut self, codes: Vec<String>) -> Self {
        self.codes = codes;
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }
}

/// One guardian's verdict; never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianResult {
    /// Rule that produced the result
    pub rule: GuardianRule,
    /// Whether the artifact passed the rule
    pub passed: bool,
    /// Evidence supporting the verdict
    pub evidence: String,
    /// Structured failure detail
    pub failure: Option<FailureDetail>,
    /// Whether the oracle was consulted
    #[serde(default)]
    pub oracle_consulted: bool,
    /// The guardian could not run to completion
    #[serde(default)]
    pub errored: bool,
}

impl GuardianResult {
    /// A passing result
    pub fn pass(rule: GuardianRule, evidence: impl Into<String>) -> Self {
        Self {
            rule,
            passed: true,
            evidence: evidence.into(),
            failure: None,
            oracle_consulted: false,
            errored: false,
        }
    }

    /// A failing result
    pub fn fail(rule: GuardianRule, evidence: impl Into<String>, detail: FailureDetail) -> Self {
        Self {
            rule,
            passed: false,
            evidence: evidence.into(),
            failure: Some(detail),
            oracle_consulted: false,
            errored: false,
        }
    }

    /// Failure sentinel for a guardian that could not complete
    pub fn errored(rule: GuardianRule, reason: impl Into<String>) -> Self {
        Self {
            rule,
            passed: false,
            evidence: format!("Guardian did not complete: {}", reason.into()),
            failure: None,
            oracle_consulted: true,
            errored: true,
        }
    }

    /// Mark the result as oracle-backed
    pub fn consulted(mut self) -> Self {
        self.oracle_consulted = true;
        self
    }
}

/// The Judge's classification of a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Intended irregularity present and correctly detected, no spurious findings
    Effective,
    /// Intended irregularity missed, or extra real findings muddy the label
    LogicGapDetected,
    /// A guardian reported something the artifact's own data contradicts
    HallucinationDetected,
}

impl Verdict {
    /// Verdict name
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Effective => "Effective",
            Verdict::LogicGapDetected => "LogicGapDetected",
            Verdict::HallucinationDetected => "HallucinationDetected",
        }
    }
}

/// The Judge's report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationQualityReport {
    /// Irregularity the artifact was meant to carry
    pub intended: Irregularity,
    /// Whether the intended irregularity was detected
    pub injection_met: bool,
    /// Agreement score, 0-100
    pub fidelity_score: u8,
    /// Overall verdict
    pub verdict: Verdict,
    /// Reasoning
    pub justification: String,
}

/// Full result of one audit invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Audited artifact
    pub artifact_id: Uuid,
    /// One result per guardian
    pub results: Vec<GuardianResult>,
    /// `round(100 * passed / total)`
    pub health_score: u8,
    /// Failing guardian names or a clean message
    pub executive_summary: String,
    /// Judge's report
    pub quality: SimulationQualityReport,
    /// When the audit ran
    pub audited_at: DateTime<Utc>,
}

impl AuditReport {
    /// Results that did not pass
    pub fn failures(&self) -> impl Iterator<Item = &GuardianResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Result for a specific rule
    pub fn result_for(&self, rule: GuardianRule) -> Option<&GuardianResult> {
        self.results.iter().find(|r| r.rule == rule)
    }
}
