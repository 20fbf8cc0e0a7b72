//! The eleven guardians
//!
//! Each guardian reads a shared snapshot and produces one [`GuardianResult`].
//! A guardian first runs its deterministic check. A clear failure or a clear
//! pass is final; an ambiguous case goes to the oracle when one is
//! configured. An oracle failure degrades the slot to an errored result.

use crate::AuditConfig;
use billforge_domain::codes::{base_code, evaluation_level, is_evaluation, max_level_for};
use billforge_domain::{
    BillArtifact, FailureDetail, GuardianResult, GuardianRule, Laterality, NetworkStatus, Severity,
};
use billforge_llm::Oracle;
use billforge_pricing::{locality_reference, Location, PricingResolver};
use serde::Deserialize;
use tracing::{debug, warn};

/// Slack for cent rounding when comparing against a threshold
const ROUNDING_SLACK: f64 = 0.01;

/// Read-only state shared by every guardian task
#[derive(Debug)]
pub(crate) struct GuardianContext {
    pub config: AuditConfig,
    pub pricing: PricingResolver,
    pub oracle: Option<Oracle>,
}

/// Outcome of a guardian's deterministic check
enum Check {
    Pass(String),
    Fail(String, FailureDetail),
    /// Needs judgment; `offline` stands when no oracle is available
    Ambiguous { question: String, offline: GuardianResult },
}

#[derive(Debug, Deserialize)]
struct OracleFinding {
    passed: bool,
    #[serde(default)]
    evidence: String,
    #[serde(default)]
    line_indices: Vec<usize>,
    #[serde(default)]
    codes: Vec<String>,
}

/// Run one guardian
pub(crate) async fn run(rule: GuardianRule, artifact: &BillArtifact, ctx: &GuardianContext) -> GuardianResult {
    let check = match rule {
        GuardianRule::Upcoding => upcoding(artifact),
        GuardianRule::Laterality => laterality(artifact),
        GuardianRule::GlobalPeriod => global_period(artifact),
        GuardianRule::Arithmetic => arithmetic(artifact),
        GuardianRule::PriceBenchmark => price_benchmark(artifact, ctx).await,
        GuardianRule::Unbundling => unbundling(artifact),
        GuardianRule::Duplicate => duplicate(artifact),
        GuardianRule::EstimateVariance => estimate_variance(artifact, &ctx.config),
        GuardianRule::BalanceBilling => balance_billing(artifact),
        GuardianRule::MissingField => missing_field(artifact),
        GuardianRule::GhostCharge => ghost_charge(artifact),
    };
    settle(rule, check, artifact, ctx).await
}

async fn settle(rule: GuardianRule, check: Check, artifact: &BillArtifact, ctx: &GuardianContext) -> GuardianResult {
    match check {
        Check::Pass(evidence) => GuardianResult::pass(rule, evidence),
        Check::Fail(evidence, detail) => GuardianResult::fail(rule, evidence, detail),
        Check::Ambiguous { question, offline } => match (&ctx.oracle, ctx.config.use_oracle) {
            (Some(oracle), true) => ask_oracle(rule, oracle, &question, artifact).await,
            _ => offline,
        },
    }
}

async fn ask_oracle(rule: GuardianRule, oracle: &Oracle, question: &str, artifact: &BillArtifact) -> GuardianResult {
    let prompt = format!(
        "TASK: guardian-{}\n\
         You are auditing a medical bill. {}\n\
         {}\n\
         Respond with JSON only: {{\"passed\": true|false, \"evidence\": \"...\", \"line_indices\": [...], \"codes\": [...]}}",
        rule.name(),
        question,
        summarize(artifact),
    );
    debug!("Guardian {} prompt: {} chars", rule, prompt.len());

    match oracle
        .ask::<OracleFinding>(&prompt, r#"{"passed": bool, "evidence": string, "line_indices": [int], "codes": [string]}"#)
        .await
    {
        Ok(finding) if finding.passed => GuardianResult::pass(rule, finding.evidence).consulted(),
        Ok(finding) => GuardianResult::fail(
            rule,
            finding.evidence,
            FailureDetail::lines(finding.line_indices).with_codes(finding.codes),
        )
        .consulted(),
        Err(e) => {
            warn!("Guardian {} oracle call failed: {}", rule, e);
            GuardianResult::errored(rule, e.to_string())
        }
    }
}

fn summarize(artifact: &BillArtifact) -> String {
    let clinical = &artifact.clinical;
    let mut out = format!(
        "Facility: {} ({}, {})\nSetting: {}, acuity: {}, laterality: {}\nService dates: {} to {}\nNarrative: {}\n",
        artifact.facility.name,
        artifact.facility.city,
        artifact.facility.region,
        clinical.setting.as_str(),
        clinical.acuity.as_str(),
        clinical.laterality.map(|l| l.as_str()).unwrap_or("none"),
        clinical.admit_date,
        clinical.discharge_date,
        clinical.encounter.full_text(),
    );
    if let Some(prior) = &clinical.prior_procedure {
        out.push_str(&format!(
            "Prior procedure: {} on {} ({}-day global period)\n",
            prior.code, prior.date, prior.global_days
        ));
    }
    out.push_str("Lines:\n");
    for (i, line) in artifact.line_items.iter().enumerate() {
        out.push_str(&format!(
            "[{}] {} {} {} x{} @ {:.2} = {:.2}\n",
            i,
            line.date,
            line.full_code(),
            line.description,
            line.quantity,
            line.unit_price,
            line.total
        ));
    }
    out
}

fn codes_of(artifact: &BillArtifact, lines: &[usize]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|i| artifact.line_items.get(*i))
        .map(|line| line.code.clone())
        .collect()
}

fn upcoding(artifact: &BillArtifact) -> Check {
    let clinical = &artifact.clinical;
    let ceiling = max_level_for(clinical.acuity, clinical.setting);
    let flagged: Vec<usize> = artifact
        .line_items
        .iter()
        .enumerate()
        .filter(|(_, line)| evaluation_level(&line.code).is_some_and(|level| level > ceiling))
        .map(|(i, _)| i)
        .collect();

    if let Some(first) = flagged.first() {
        let line = &artifact.line_items[*first];
        return Check::Fail(
            format!(
                "{} billed for {} acuity; level {} or lower expected",
                line.code,
                clinical.acuity.as_str(),
                ceiling
            ),
            FailureDetail::lines(flagged.clone())
                .with_codes(codes_of(artifact, &flagged))
                .expected_actual(format!("level <= {}", ceiling), line.code.clone()),
        );
    }

    let evaluations = artifact.line_items.iter().filter(|l| is_evaluation(&l.code)).count();
    if evaluations == 0 {
        return Check::Pass("No E/M lines billed".to_string());
    }
    Check::Ambiguous {
        question: "Does the documented encounter support the E/M level billed?".to_string(),
        offline: GuardianResult::pass(
            GuardianRule::Upcoding,
            format!("E/M levels within the {} acuity ceiling", clinical.acuity.as_str()),
        ),
    }
}

fn laterality(artifact: &BillArtifact) -> Check {
    let documented = artifact
        .clinical
        .laterality
        .or_else(|| artifact.clinical.encounter.mentioned_side());

    let sided: Vec<(usize, Laterality)> = artifact
        .line_items
        .iter()
        .enumerate()
        .flat_map(|(i, line)| {
            line.modifiers
                .iter()
                .filter_map(|m| Laterality::from_modifier(m))
                .map(move |side| (i, side))
        })
        .collect();

    if sided.is_empty() {
        return Check::Pass("No sided procedures billed".to_string());
    }

    let Some(documented) = documented else {
        return Check::Ambiguous {
            question: "The record does not tag a side. Do the side modifiers agree with the narrative?".to_string(),
            offline: GuardianResult::pass(GuardianRule::Laterality, "No documented side to contradict"),
        };
    };

    let mismatched: Vec<usize> = sided
        .iter()
        .filter(|(_, side)| *side != documented)
        .map(|(i, _)| *i)
        .collect();
    if mismatched.is_empty() {
        return Check::Pass(format!("Coded sides match the documented {} side", documented.as_str()));
    }

    let line = &artifact.line_items[mismatched[0]];
    Check::Fail(
        format!("{} contradicts the documented {} side", line.full_code(), documented.as_str()),
        FailureDetail::lines(mismatched.clone())
            .with_codes(codes_of(artifact, &mismatched))
            .expected_actual(documented.modifier(), line.full_code()),
    )
}

fn global_period(artifact: &BillArtifact) -> Check {
    let Some(prior) = &artifact.clinical.prior_procedure else {
        return Check::Pass("No prior procedure with a global period".to_string());
    };
    let inside: Vec<usize> = artifact
        .line_items
        .iter()
        .enumerate()
        .filter(|(_, line)| is_evaluation(&line.code) && prior.covers(line.date))
        .map(|(i, _)| i)
        .collect();

    if inside.is_empty() {
        return Check::Ambiguous {
            question: format!(
                "A {} was performed on {} with a {}-day global period. Is any service billed here part of that global package?",
                prior.code, prior.date, prior.global_days
            ),
            offline: GuardianResult::pass(GuardianRule::GlobalPeriod, "No E/M inside the global period"),
        };
    }

    let line = &artifact.line_items[inside[0]];
    Check::Fail(
        format!(
            "{} on {} falls inside the {}-day global period of {} ({})",
            line.code, line.date, prior.global_days, prior.code, prior.date
        ),
        FailureDetail::lines(inside.clone())
            .with_codes(codes_of(artifact, &inside))
            .expected_actual("no separate E/M within the global period", line.code.clone()),
    )
}

fn arithmetic(artifact: &BillArtifact) -> Check {
    let bad_lines: Vec<usize> = artifact
        .line_items
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.is_total_consistent())
        .map(|(i, _)| i)
        .collect();

    if let Some(first) = bad_lines.first() {
        let line = &artifact.line_items[*first];
        return Check::Fail(
            format!(
                "Line {} total {:.2} is not {} x {:.2}",
                first, line.total, line.quantity, line.unit_price
            ),
            FailureDetail::lines(bad_lines.clone())
                .with_codes(codes_of(artifact, &bad_lines))
                .expected_actual(format!("{:.2}", line.expected_total()), format!("{:.2}", line.total)),
        );
    }

    if !artifact.balance_consistent() {
        let subtotal = artifact.computed_subtotal();
        let mut corrected = artifact.clone();
        corrected.subtotal = subtotal;
        let grand_total = corrected.computed_grand_total();
        return Check::Fail(
            format!(
                "Totals do not close: subtotal {:.2}, grand total {:.2}",
                artifact.subtotal, artifact.grand_total
            ),
            FailureDetail::default().expected_actual(
                format!("subtotal {:.2}, grand total {:.2}", subtotal, grand_total),
                format!("subtotal {:.2}, grand total {:.2}", artifact.subtotal, artifact.grand_total),
            ),
        );
    }

    Check::Pass(format!("All {} lines and the balance close", artifact.line_items.len()))
}

/// Severity of a price relative to its flag threshold
pub fn price_severity(price: f64, threshold: f64, config: &AuditConfig) -> Option<Severity> {
    if threshold <= 0.0 || price <= threshold + ROUNDING_SLACK {
        return None;
    }
    let ratio = price / threshold;
    Some(if ratio > config.extreme_ratio {
        Severity::Extreme
    } else if ratio > config.major_ratio {
        Severity::Major
    } else {
        Severity::Outlier
    })
}

/// Threshold is `benchmark_multiplier × reference × sensitivity`, with the
/// reference taken at the facility's locality and the line's modifiers
async fn price_benchmark(artifact: &BillArtifact, ctx: &GuardianContext) -> Check {
    let config = &ctx.config;
    let location = Location::of(&artifact.facility);

    let mut flagged = Vec::new();
    let mut worst: Option<(Severity, usize, f64)> = None;
    for (i, line) in artifact.line_items.iter().enumerate() {
        let rate = ctx.pricing.resolve_rate(&line.code).await;
        let threshold =
            config.benchmark_multiplier * locality_reference(rate, &location, &line.modifiers) * config.sensitivity;
        if let Some(severity) = price_severity(line.unit_price, threshold, config) {
            flagged.push(i);
            if worst.is_none_or(|(s, _, _)| severity > s) {
                worst = Some((severity, i, threshold));
            }
        }
    }

    let Some((severity, index, threshold)) = worst else {
        return Check::Pass(format!(
            "All prices within {}x of the locality benchmark",
            config.sensitivity
        ));
    };

    let line = &artifact.line_items[index];
    Check::Fail(
        format!(
            "{} priced at {:.2} against a threshold of {:.2} ({:?})",
            line.code, line.unit_price, threshold, severity
        ),
        FailureDetail::lines(flagged.clone())
            .with_codes(codes_of(artifact, &flagged))
            .expected_actual(format!("<= {:.2}", threshold), format!("{:.2}", line.unit_price))
            .with_severity(severity),
    )
}

fn unbundling(artifact: &BillArtifact) -> Check {
    let panels = artifact.unbundled_panels();
    let Some((panel, _)) = panels.first() else {
        return Check::Pass("No panel components billed separately".to_string());
    };
    let lines: Vec<usize> = panels.iter().flat_map(|(_, lines)| lines.iter().copied()).collect();
    Check::Fail(
        format!("{} components billed as {} separate lines", panel.name, lines.len()),
        FailureDetail::lines(lines.clone())
            .with_codes(codes_of(artifact, &lines))
            .expected_actual(panel.code, format!("{} component lines", lines.len())),
    )
}

fn duplicate(artifact: &BillArtifact) -> Check {
    let duplicates = artifact.duplicate_line_indices();
    let Some(first) = duplicates.first() else {
        return Check::Pass("No code billed twice on one date".to_string());
    };
    let line = &artifact.line_items[*first];
    Check::Fail(
        format!("{} billed more than once on {}", line.full_code(), line.date),
        FailureDetail::lines(duplicates.clone())
            .with_codes(codes_of(artifact, &duplicates))
            .expected_actual("one charge per service per date", format!("{} repeated", line.full_code())),
    )
}

fn estimate_variance(artifact: &BillArtifact, config: &AuditConfig) -> Check {
    let Some(estimate) = artifact.estimate else {
        return Check::Pass("No good-faith estimate on file".to_string());
    };
    let variance = artifact.subtotal - estimate;
    if variance > config.estimate_threshold {
        Check::Fail(
            format!(
                "Charges exceed the good-faith estimate by {:.2} (allowed {:.2})",
                variance, config.estimate_threshold
            ),
            FailureDetail::default().expected_actual(
                format!("<= {:.2}", estimate + config.estimate_threshold),
                format!("{:.2}", artifact.subtotal),
            ),
        )
    } else {
        Check::Pass(format!("Charges within {:.2} of the estimate", config.estimate_threshold))
    }
}

fn balance_billing(artifact: &BillArtifact) -> Check {
    match artifact.balance_billed {
        Some(amount) if amount > 0.0 && artifact.network_status == NetworkStatus::OutOfNetwork => Check::Fail(
            format!("Out-of-network provider balance bills the patient {:.2}", amount),
            FailureDetail::default().expected_actual("0.00", format!("{:.2}", amount)),
        ),
        _ => Check::Pass("No out-of-network balance bill".to_string()),
    }
}

fn missing_field(artifact: &BillArtifact) -> Check {
    let missing = artifact.missing_critical_fields();
    if !missing.is_empty() {
        return Check::Fail(
            format!("Blank critical fields: {}", missing.join(", ")),
            FailureDetail::default().expected_actual("a value", missing.join(", ")),
        );
    }

    let ambiguous = artifact.ambiguous_critical_fields();
    if ambiguous.is_empty() {
        return Check::Pass("All critical fields present".to_string());
    }
    let listed = ambiguous.join(", ");
    Check::Ambiguous {
        question: format!("These fields hold stand-in values: {}. Is the bill missing required information?", listed),
        offline: GuardianResult::fail(
            GuardianRule::MissingField,
            format!("Stand-in values in {}", listed),
            FailureDetail::default().expected_actual("a value", listed.clone()),
        ),
    }
}

fn ghost_charge(artifact: &BillArtifact) -> Check {
    let facility = &artifact.facility;
    if !facility.has_valid_npis() || facility.has_placeholder_identifiers() {
        return Check::Fail(
            format!(
                "Provider identifiers invalid or placeholder (NPI {}, rendering NPI {}, TIN {})",
                facility.npi, facility.attending_npi, facility.tax_id
            ),
            FailureDetail::default().expected_actual(
                "checksum-valid NPIs and a real TIN",
                format!("{} / {} / {}", facility.npi, facility.attending_npi, facility.tax_id),
            ),
        );
    }

    let outside: Vec<usize> = artifact
        .line_items
        .iter()
        .enumerate()
        .filter(|(_, line)| !artifact.clinical.covers(line.date))
        .map(|(i, _)| i)
        .collect();
    if !outside.is_empty() {
        return Check::Fail(
            format!("{} charges dated outside the encounter", outside.len()),
            FailureDetail::lines(outside.clone())
                .with_codes(codes_of(artifact, &outside))
                .expected_actual(
                    format!("{} to {}", artifact.clinical.admit_date, artifact.clinical.discharge_date),
                    "service outside the stay",
                ),
        );
    }

    let undocumented: Vec<String> = if artifact.coding.procedures.is_empty() {
        Vec::new()
    } else {
        artifact
            .line_items
            .iter()
            .map(|line| base_code(&line.code).to_string())
            .filter(|code| !artifact.coding.contains_code(code))
            .collect()
    };
    if undocumented.is_empty() {
        return Check::Pass("Identifiers valid and every charge documented".to_string());
    }
    Check::Ambiguous {
        question: format!(
            "Codes {} are billed but not in the coding record. Were these services rendered?",
            undocumented.join(", ")
        ),
        offline: GuardianResult::pass(GuardianRule::GhostCharge, "Identifiers valid; undocumented codes not adjudicated"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::artifact;
    use billforge_domain::PayerClass;
    use billforge_llm::MockProvider;

    fn context(oracle: Option<Oracle>) -> GuardianContext {
        GuardianContext {
            config: AuditConfig::default(),
            pricing: PricingResolver::default(),
            oracle,
        }
    }

    #[test]
    fn test_price_severity_bands() {
        let config = AuditConfig::default();
        // Reference 100 in a region with factor 1.0: threshold 300.
        assert_eq!(price_severity(300.0, 300.0, &config), None);
        assert_eq!(price_severity(330.0, 300.0, &config), Some(Severity::Outlier));
        assert_eq!(price_severity(550.0, 300.0, &config), Some(Severity::Major));
        assert_eq!(price_severity(660.0, 300.0, &config), Some(Severity::Extreme));
    }

    #[tokio::test]
    async fn test_clean_bill_passes_deterministic_guardians() {
        let a = artifact(4);
        let ctx = context(None);
        for rule in GuardianRule::ALL {
            let result = run(rule, &a, &ctx).await;
            assert!(result.passed, "{} failed: {}", rule, result.evidence);
            assert!(!result.oracle_consulted);
        }
    }

    #[tokio::test]
    async fn test_price_gouging_flagged_with_severity() {
        let mut a = artifact(2);
        // 99284 reference 134 in Austin: threshold 402.
        a.line_items[0].unit_price = 737.0;
        a.line_items[0].total = 737.0;
        a.recompute_totals();

        let result = run(GuardianRule::PriceBenchmark, &a, &context(None)).await;
        assert!(!result.passed);
        let detail = result.failure.unwrap();
        assert_eq!(detail.line_indices, vec![0]);
        assert_eq!(detail.severity, Some(Severity::Major));
    }

    fn priced_context(table: &str) -> GuardianContext {
        let table = billforge_pricing::BenchmarkTable::from_json(table).unwrap();
        GuardianContext {
            pricing: PricingResolver::new(billforge_pricing::RateCache::new(), table),
            ..context(None)
        }
    }

    fn with_price(mut a: BillArtifact, price: f64) -> BillArtifact {
        a.line_items[0].unit_price = price;
        a.line_items[0].total = price;
        a.recompute_totals();
        a
    }

    #[tokio::test]
    async fn test_gouging_bands_against_locality_reference() {
        use billforge_pricing::{billed_price, PayerFactor, GOUGING_MULTIPLIER};

        let ctx = priced_context(r#"{"99284": 100.0, "85025": 10.0}"#);
        let severity = |result: GuardianResult| result.failure.and_then(|detail| detail.severity);

        // Region factor 1.0: threshold 300, extreme above 600.
        let texas = artifact(2);
        let gouged = billed_price(100.0, PayerFactor::Forced(GOUGING_MULTIPLIER), &Location::of(&texas.facility), &[]);
        assert_eq!(gouged, 550.0);
        let result = run(GuardianRule::PriceBenchmark, &with_price(texas.clone(), gouged), &ctx).await;
        assert_eq!(severity(result), Some(Severity::Major));
        let result = run(GuardianRule::PriceBenchmark, &with_price(texas, 601.0), &ctx).await;
        assert_eq!(severity(result), Some(Severity::Extreme));

        // Region factor 1.2: threshold 360, extreme above 720.
        let mut california = artifact(2);
        california.facility.city = "Sacramento".to_string();
        california.facility.region = "CA".to_string();
        california.facility.postal_code = "95814".to_string();
        let location = Location::of(&california.facility);
        let gouged = billed_price(100.0, PayerFactor::Forced(GOUGING_MULTIPLIER), &location, &[]);
        assert_eq!(gouged, 660.0);
        let result = run(GuardianRule::PriceBenchmark, &with_price(california.clone(), gouged), &ctx).await;
        assert!(result.evidence.contains("360.00"), "{}", result.evidence);
        assert_eq!(severity(result), Some(Severity::Major));
        let result = run(GuardianRule::PriceBenchmark, &with_price(california.clone(), 721.0), &ctx).await;
        assert_eq!(severity(result), Some(Severity::Extreme));

        // The highest payer class stays at the threshold in any region.
        let self_pay = billed_price(100.0, PayerClass::SelfPay, &location, &[]);
        let result = run(GuardianRule::PriceBenchmark, &with_price(california, self_pay), &ctx).await;
        assert!(result.passed, "{}", result.evidence);
    }

    #[tokio::test]
    async fn test_math_error_flagged() {
        let mut a = artifact(3);
        a.line_items[1].total += 10.0;
        a.recompute_totals();

        let result = run(GuardianRule::Arithmetic, &a, &context(None)).await;
        assert!(!result.passed);
        assert_eq!(result.failure.unwrap().line_indices, vec![1]);
    }

    #[tokio::test]
    async fn test_balance_error_flagged() {
        let mut a = artifact(3);
        a.grand_total += 100.0;
        let result = run(GuardianRule::Arithmetic, &a, &context(None)).await;
        assert!(!result.passed);
        assert!(result.failure.unwrap().line_indices.is_empty());
    }

    #[tokio::test]
    async fn test_missing_field_short_circuits() {
        let provider = MockProvider::new(r#"{"passed": true}"#);
        let mut a = artifact(2);
        a.clinical.patient.member_id.clear();

        let result = run(GuardianRule::MissingField, &a, &context(Some(Oracle::new(provider.clone())))).await;
        assert!(!result.passed);
        assert!(!result.oracle_consulted);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_ambiguous_field_asks_oracle() {
        let provider = MockProvider::new(r#"{"passed": false, "evidence": "member id is a stand-in"}"#);
        let mut a = artifact(2);
        a.clinical.patient.member_id = "TBD".to_string();

        let result = run(GuardianRule::MissingField, &a, &context(Some(Oracle::new(provider.clone())))).await;
        assert!(!result.passed);
        assert!(result.oracle_consulted);
        assert_eq!(provider.calls_containing("TASK: guardian-missing-field"), 1);
    }

    #[tokio::test]
    async fn test_oracle_failure_degrades_slot() {
        let a = artifact(2);
        let result = run(GuardianRule::Upcoding, &a, &context(Some(Oracle::new(MockProvider::failing())))).await;
        assert!(!result.passed);
        assert!(result.errored);
    }

    #[tokio::test]
    async fn test_ghost_provider_flagged() {
        let mut a = artifact(2);
        a.facility.attending_npi = "1234567890".to_string();
        let result = run(GuardianRule::GhostCharge, &a, &context(None)).await;
        assert!(!result.passed);
    }
}
