//! Repair planning
//!
//! Mechanical scenarios get a deterministic plan. Narrative scenarios ask the
//! oracle first and fall back to a deterministic rule when it fails.

use crate::detect::documented_side;
use crate::operation::{Operation, Target};
use crate::detect::ESTIMATE_VARIANCE_THRESHOLD;
use billforge_domain::codes::{
    base_code, describe, evaluation_level, global_period_days, is_escalation, is_evaluation, max_level_for,
    panel, requires_laterality, revenue_code_for, top_evaluation_code, ESCALATION_DAILY, ESCALATION_SERVICES,
};
use billforge_domain::identifiers::invalid_npi_from_seed;
use billforge_domain::{
    round2, Acuity, BillArtifact, Irregularity, Laterality, LineItem, PriorProcedure,
};
use billforge_llm::Oracle;
use billforge_pricing::{billed_price, Location, PayerFactor, PricingResolver, GOUGING_MULTIPLIER};
use chrono::Duration;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

const UNBUNDLED_PANEL: &str = "80061";
const LATERAL_FALLBACK_CODE: &str = "73030";
const GLOBAL_FALLBACK_CODE: &str = "29881";
const GLOBAL_FALLBACK_LEAD_DAYS: i64 = 30;
const BALANCE_SKEW: f64 = 100.0;
const BALANCE_BILL_SHARE: f64 = 0.4;

/// An ordered set of operations with the reasoning behind them
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    /// Operations, applied in order
    pub operations: Vec<Operation>,
    /// Why these operations inject the irregularity
    pub rationale: String,
    /// What the bill should have shown versus what it now shows
    pub expected_vs_actual: String,
    /// Set when the oracle planner failed and a deterministic rule stood in
    pub oracle_fallback: Option<String>,
}

impl Plan {
    fn new(operations: Vec<Operation>, rationale: impl Into<String>) -> Self {
        Self {
            operations,
            rationale: rationale.into(),
            ..Self::default()
        }
    }

    fn expecting(mut self, expected_vs_actual: impl Into<String>) -> Self {
        self.expected_vs_actual = expected_vs_actual.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct OraclePlan {
    #[serde(default)]
    decline: bool,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    operations: Vec<Operation>,
}

/// Builds repair plans
///
/// `plan` returns `Err(reason)` when it declines.
#[derive(Debug, Clone)]
pub struct Planner {
    pricing: PricingResolver,
    oracle: Option<Oracle>,
}

impl Planner {
    /// Deterministic planner
    pub fn new(pricing: PricingResolver) -> Self {
        Self { pricing, oracle: None }
    }

    /// Let narrative scenarios consult the oracle
    pub fn with_oracle(mut self, oracle: Oracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Plan a repair that makes `scenario` observable in `artifact`
    pub async fn plan(&self, artifact: &BillArtifact, scenario: Irregularity) -> Result<Plan, String> {
        if scenario.is_narrative() {
            if let Some(oracle) = &self.oracle {
                match self.ask_oracle(oracle, artifact, scenario).await {
                    Ok(Some(plan)) => return Ok(plan),
                    Ok(None) => {}
                    Err(decline) => return Err(decline),
                }
                let mut plan = self.deterministic(artifact, scenario).await?;
                plan.oracle_fallback = Some(format!("Oracle planner unavailable for {}", scenario));
                return Ok(plan);
            }
        }
        self.deterministic(artifact, scenario).await
    }

    /// `Ok(None)` means the oracle failed and the caller should fall back
    async fn ask_oracle(
        &self,
        oracle: &Oracle,
        artifact: &BillArtifact,
        scenario: Irregularity,
    ) -> Result<Option<Plan>, String> {
        let prompt = plan_prompt(artifact, scenario);
        debug!("Sentinel plan prompt: {} chars", prompt.len());

        let reply: OraclePlan = match oracle.ask(&prompt, PLAN_SCHEMA).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Oracle planner failed for {}: {}", scenario, e);
                return Ok(None);
            }
        };

        if reply.decline {
            let reason = if reply.reason.trim().is_empty() {
                format!("Oracle declined to inject {}", scenario)
            } else {
                reply.reason
            };
            return Err(reason);
        }
        if reply.operations.is_empty() {
            warn!("Oracle planner returned no operations for {}", scenario);
            return Ok(None);
        }

        let rationale = if reply.reason.trim().is_empty() {
            format!("Oracle plan for {}", scenario)
        } else {
            reply.reason
        };
        Ok(Some(Plan::new(reply.operations, rationale)))
    }

    async fn deterministic(&self, artifact: &BillArtifact, scenario: Irregularity) -> Result<Plan, String> {
        match scenario {
            Irregularity::None => Err("Nothing to inject for a clean bill".to_string()),
            Irregularity::Duplicate => duplicate(artifact),
            Irregularity::MathError => math_error(artifact),
            Irregularity::BalanceError => Ok(balance_error(artifact)),
            Irregularity::Unbundling => self.unbundling(artifact).await,
            Irregularity::PriceGouging => self.price_gouging(artifact).await,
            Irregularity::EstimateVariance => self.estimate_variance(artifact).await,
            Irregularity::BalanceBilling => balance_billing(artifact),
            Irregularity::MissingField => Ok(Plan::new(
                vec![Operation::set(Target::Patient, "member_id", "")],
                "Member identifier left blank",
            )
            .expecting("expected a member id, found a blank field")),
            Irregularity::GhostProvider => Ok(ghost_provider(artifact)),
            Irregularity::Upcoding => self.upcoding(artifact).await,
            Irregularity::LateralityMismatch => self.laterality(artifact).await,
            Irregularity::GlobalPeriod => global_period(artifact),
        }
    }

    async fn unbundling(&self, artifact: &BillArtifact) -> Result<Plan, String> {
        let lipid = panel(UNBUNDLED_PANEL).ok_or_else(|| format!("Panel {} is not catalogued", UNBUNDLED_PANEL))?;
        let location = Location::of(&artifact.facility);
        let date = artifact.clinical.admit_date;

        let mut operations = Vec::new();
        for component in lipid.components {
            let rate = self.pricing.resolve_rate(component).await;
            let price = billed_price(rate, artifact.payer, &location, &[]);
            let item = LineItem::new(date, *component, describe(component).unwrap_or(lipid.name), 1, price)
                .with_revenue_code(revenue_code_for(component, artifact.clinical.setting));
            operations.push(Operation::AddLine { item });
        }
        let operations = with_closing_totals(artifact, operations);

        Ok(Plan::new(operations, format!("{} components billed as separate lines", lipid.name))
            .expecting(format!("expected one {} line, found {} components", lipid.code, lipid.components.len())))
    }

    /// Quote the planned care and bill escalation services until the excess is material
    async fn estimate_variance(&self, artifact: &BillArtifact) -> Result<Plan, String> {
        let estimate = round2(
            artifact
                .line_items
                .iter()
                .filter(|line| !is_escalation(&line.code))
                .map(|line| line.total)
                .sum(),
        );
        if estimate <= 0.0 {
            return Err("No planned charges to base an estimate on".to_string());
        }

        let location = Location::of(&artifact.facility);
        let setting = artifact.clinical.setting;
        let admit = artifact.clinical.admit_date;
        let schedule = ESCALATION_SERVICES
            .iter()
            .map(|code| (*code, 0))
            .chain((1..artifact.clinical.service_days()).map(|day| (ESCALATION_DAILY, day)));

        let mut operations = Vec::new();
        let mut subtotal = artifact.computed_subtotal();
        for (code, day) in schedule {
            if subtotal - estimate > ESTIMATE_VARIANCE_THRESHOLD {
                break;
            }
            let date = admit + Duration::days(i64::from(day));
            let billed = artifact
                .line_items
                .iter()
                .any(|line| base_code(&line.code) == code && line.date == date);
            if billed {
                continue;
            }
            let rate = self.pricing.resolve_rate(code).await;
            let price = billed_price(rate, artifact.payer, &location, &[]);
            subtotal += price;
            let item = LineItem::new(date, code, describe(code).unwrap_or("Critical care service"), 1, price)
                .with_revenue_code(revenue_code_for(code, setting));
            operations.push(Operation::AddLine { item });
        }
        if subtotal - estimate <= ESTIMATE_VARIANCE_THRESHOLD {
            return Err(format!(
                "Escalated charges of {:.2} stay within {:.0} of the {:.2} estimate",
                subtotal, ESTIMATE_VARIANCE_THRESHOLD, estimate
            ));
        }

        operations.push(Operation::set(Target::Artifact, "estimate", estimate));
        let operations = with_closing_totals(artifact, operations);
        let subtotal = round2(subtotal);
        Ok(Plan::new(operations, "Care escalated beyond the services the good-faith estimate quoted")
            .expecting(format!("estimated {:.2}, billed {:.2}", estimate, subtotal)))
    }

    async fn price_gouging(&self, artifact: &BillArtifact) -> Result<Plan, String> {
        let index = primary_line(artifact).ok_or("No line to reprice")?;
        let line = &artifact.line_items[index];
        let location = Location::of(&artifact.facility);
        let rate = self.pricing.resolve_rate(&line.code).await;
        let price = billed_price(rate, PayerFactor::Forced(GOUGING_MULTIPLIER), &location, &line.modifiers);
        let total = round2(f64::from(line.quantity) * price);

        let target = Target::Line { index };
        let operations = with_closing_totals(
            artifact,
            vec![Operation::set(target, "unit_price", price), Operation::set(target, "total", total)],
        );

        Ok(Plan::new(operations, format!("{} priced at {}x the reference rate", line.code, GOUGING_MULTIPLIER))
            .expecting(format!("expected about {:.2}, found {:.2}", line.unit_price, price)))
    }

    async fn upcoding(&self, artifact: &BillArtifact) -> Result<Plan, String> {
        let index = artifact
            .line_items
            .iter()
            .position(|line| is_evaluation(&line.code))
            .ok_or("No E/M line to upcode")?;
        let line = &artifact.line_items[index];
        let setting = artifact.clinical.setting;
        let top = top_evaluation_code(setting);

        let mut operations = Vec::new();
        let top_level = evaluation_level(top).unwrap_or(0);
        if top_level <= max_level_for(artifact.clinical.acuity, setting) {
            operations.push(Operation::set(Target::Clinical, "acuity", Acuity::Moderate.as_str()));
        }

        let location = Location::of(&artifact.facility);
        let rate = self.pricing.resolve_rate(top).await;
        let price = billed_price(rate, artifact.payer, &location, &line.modifiers);
        let target = Target::Line { index };
        operations.extend([
            Operation::set(target, "code", top),
            Operation::set(target, "description", describe(top).unwrap_or("Evaluation and management")),
            Operation::set(target, "unit_price", price),
            Operation::set(target, "total", round2(f64::from(line.quantity) * price)),
        ]);
        let operations = with_closing_totals(artifact, operations);

        Ok(Plan::new(operations, format!("E/M billed at {} against documented acuity", top))
            .expecting(format!("expected {}, found {}", line.code, top)))
    }

    async fn laterality(&self, artifact: &BillArtifact) -> Result<Plan, String> {
        let mut operations = Vec::new();
        let documented = match documented_side(artifact) {
            Some(side) => side,
            None => {
                operations.push(Operation::set(Target::Clinical, "laterality", Laterality::Left.as_str()));
                Laterality::Left
            }
        };
        let coded = documented.opposite().unwrap_or(Laterality::Left);

        let sided = artifact.line_items.iter().position(|line| {
            requires_laterality(&line.code) || line.modifiers.iter().any(|m| Laterality::from_modifier(m).is_some())
        });

        match sided {
            Some(index) => {
                let mut modifiers: Vec<String> = artifact.line_items[index]
                    .modifiers
                    .iter()
                    .filter(|m| Laterality::from_modifier(m).is_none())
                    .cloned()
                    .collect();
                modifiers.push(coded.modifier().to_string());
                operations.push(Operation::set(Target::Line { index }, "modifiers", json!(modifiers)));
            }
            None => {
                let location = Location::of(&artifact.facility);
                let modifiers = vec![coded.modifier().to_string()];
                let rate = self.pricing.resolve_rate(LATERAL_FALLBACK_CODE).await;
                let price = billed_price(rate, artifact.payer, &location, &modifiers);
                let item = LineItem::new(
                    artifact.clinical.admit_date,
                    LATERAL_FALLBACK_CODE,
                    describe(LATERAL_FALLBACK_CODE).unwrap_or("Imaging"),
                    1,
                    price,
                )
                .with_modifiers(modifiers)
                .with_revenue_code(revenue_code_for(LATERAL_FALLBACK_CODE, artifact.clinical.setting));
                operations.push(Operation::AddLine { item });
            }
        }
        let operations = with_closing_totals(artifact, operations);

        Ok(Plan::new(
            operations,
            format!("Coded {} against a documented {} side", coded.as_str(), documented.as_str()),
        )
        .expecting(format!("expected {}, found {}", documented.modifier(), coded.modifier())))
    }
}

const PLAN_SCHEMA: &str = r#"{"decline": bool, "reason": string, "operations": [Operation]}"#;

fn plan_prompt(artifact: &BillArtifact, scenario: Irregularity) -> String {
    let lines: Vec<Value> = artifact
        .line_items
        .iter()
        .enumerate()
        .map(|(i, line)| {
            json!({
                "index": i,
                "date": line.date.to_string(),
                "code": line.full_code(),
                "description": line.description,
                "quantity": line.quantity,
                "unit_price": line.unit_price,
                "total": line.total,
            })
        })
        .collect();

    format!(
        "TASK: sentinel-plan\n\
         The bill below must contain the irregularity \"{}\" ({}), but it is not observable.\n\
         Propose the smallest set of edits that makes it observable.\n\
         Encounter: setting {}, acuity {}, laterality {}.\n\
         Narrative: {}\n\
         Lines: {}\n\
         Operations use one of these shapes:\n\
         {{\"op\": \"set_field\", \"target\": {{\"kind\": \"line\", \"index\": 0}}, \"field\": \"code\", \"value\": \"99285\"}}\n\
         {{\"op\": \"duplicate_line\", \"index\": 0}}\n\
         {{\"op\": \"add_line\", \"item\": {{...line item...}}}}\n\
         Targets: artifact, facility, patient, encounter, clinical, line.\n\
         If the edit cannot be made safely, set decline to true and explain.\n\
         Respond with JSON only: {{\"decline\": false, \"reason\": \"...\", \"operations\": [...]}}",
        scenario.as_str(),
        scenario.label(),
        artifact.clinical.setting.as_str(),
        artifact.clinical.acuity.as_str(),
        artifact.clinical.laterality.map(|l| l.as_str()).unwrap_or("none"),
        artifact.clinical.encounter.full_text(),
        Value::Array(lines),
    )
}

/// First E/M line, else the first line
fn primary_line(artifact: &BillArtifact) -> Option<usize> {
    artifact
        .line_items
        .iter()
        .position(|line| is_evaluation(&line.code))
        .or_else(|| (!artifact.line_items.is_empty()).then_some(0))
}

/// Append subtotal and grand-total writes that keep the balance closed
fn with_closing_totals(artifact: &BillArtifact, mut operations: Vec<Operation>) -> Vec<Operation> {
    let mut preview = artifact.clone();
    for op in &operations {
        if op.apply(&mut preview).is_err() {
            return operations;
        }
    }
    let subtotal = preview.computed_subtotal();
    preview.subtotal = subtotal;
    let grand_total = preview.computed_grand_total();

    if subtotal != artifact.subtotal {
        operations.push(Operation::set(Target::Artifact, "subtotal", subtotal));
    }
    if grand_total != artifact.grand_total {
        operations.push(Operation::set(Target::Artifact, "grand_total", grand_total));
    }
    operations
}

fn duplicate(artifact: &BillArtifact) -> Result<Plan, String> {
    let index = artifact
        .line_items
        .iter()
        .position(|line| !is_evaluation(&line.code))
        .or_else(|| primary_line(artifact))
        .ok_or("No line to duplicate")?;
    let line = &artifact.line_items[index];
    let operations = with_closing_totals(artifact, vec![Operation::DuplicateLine { index }]);
    Ok(Plan::new(operations, format!("{} billed twice on {}", line.full_code(), line.date))
        .expecting(format!("expected one {}, found two", line.full_code())))
}

fn math_error(artifact: &BillArtifact) -> Result<Plan, String> {
    let (index, line) = artifact
        .line_items
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total.total_cmp(&b.total))
        .ok_or("No line to miscompute")?;
    let skew = round2((line.total * 0.1).max(10.0));
    let wrong = round2(line.total + skew);
    let operations = with_closing_totals(artifact, vec![Operation::set(Target::Line { index }, "total", wrong)]);

    Ok(Plan::new(operations, format!("Line {} total inflated by {:.2}", index, skew))
        .expecting(format!("expected {:.2}, found {:.2}", line.expected_total(), wrong)))
}

fn balance_error(artifact: &BillArtifact) -> Plan {
    let wrong = round2(artifact.grand_total + BALANCE_SKEW);
    Plan::new(
        vec![Operation::set(Target::Artifact, "grand_total", wrong)],
        format!("Grand total overstated by {:.2}", BALANCE_SKEW),
    )
    .expecting(format!("expected {:.2}, found {:.2}", artifact.computed_grand_total(), wrong))
}

fn balance_billing(artifact: &BillArtifact) -> Result<Plan, String> {
    let amount = round2(artifact.subtotal * BALANCE_BILL_SHARE);
    if amount <= 0.0 {
        return Err("No charges to balance bill".to_string());
    }
    Ok(Plan::new(
        vec![
            Operation::set(Target::Artifact, "network_status", "out_of_network"),
            Operation::set(Target::Artifact, "balance_billed", amount),
        ],
        "Out-of-network provider bills the patient for the remainder",
    )
    .expecting(format!("expected no balance bill, found {:.2}", amount)))
}

fn ghost_provider(artifact: &BillArtifact) -> Plan {
    let seed = artifact
        .facility
        .attending_npi
        .get(1..9)
        .and_then(|digits| digits.parse::<u64>().ok())
        .unwrap_or(1);
    let npi = invalid_npi_from_seed(seed);
    Plan::new(
        vec![Operation::set(Target::Facility, "attending_npi", npi.clone())],
        "Rendering provider identifier fails its checksum",
    )
    .expecting(format!("expected a valid NPI, found {}", npi))
}

fn global_period(artifact: &BillArtifact) -> Result<Plan, String> {
    let visit = artifact
        .line_items
        .iter()
        .find(|line| is_evaluation(&line.code))
        .ok_or("No E/M line to place inside a global period")?;
    let prior = PriorProcedure {
        code: GLOBAL_FALLBACK_CODE.to_string(),
        description: describe(GLOBAL_FALLBACK_CODE).unwrap_or("Surgery").to_string(),
        date: artifact.clinical.admit_date - Duration::days(GLOBAL_FALLBACK_LEAD_DAYS),
        global_days: global_period_days(GLOBAL_FALLBACK_CODE).unwrap_or(90),
    };
    let value = serde_json::to_value(&prior).map_err(|e| e.to_string())?;

    Ok(Plan::new(
        vec![Operation::set(Target::Clinical, "prior_procedure", value)],
        format!(
            "{} on {} falls inside the {}-day global period of {} on {}",
            visit.code, visit.date, prior.global_days, prior.code, prior.date
        ),
    )
    .expecting(format!("expected no separate E/M within {} days of {}", prior.global_days, prior.code)))
}
