//! The Generator: phases in order, then reconciliation and the Sentinel

use crate::config::GeneratorConfig;
use crate::error::GeneratorError;
use crate::financial::Encounter;
use crate::phase::Notes;
use crate::{clinical, coding, financial, identity, publish, review};
use billforge_domain::{BillArtifact, Irregularity};
use billforge_llm::Oracle;
use billforge_pricing::PricingResolver;
use billforge_reconciler::{ReconciliationReport, Reconciler};
use billforge_sentinel::{Operation, Sentinel, SentinelState};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

/// Everything a generation run produced
#[derive(Debug, Clone)]
pub struct Generation {
    /// The finished artifact, published
    pub artifact: BillArtifact,

    /// Seed the run used; pass it back through the config to reproduce it
    pub seed: u64,

    /// What reconciliation changed
    pub reconciliation: ReconciliationReport,

    /// Where the Sentinel ended
    pub sentinel_state: SentinelState,

    /// Every Sentinel state visited
    pub sentinel_trace: Vec<SentinelState>,

    /// Why the Sentinel ended there
    pub sentinel_rationale: String,

    /// Repairs the Sentinel applied
    pub sentinel_operations: Vec<Operation>,
}

impl Generation {
    /// Whether the requested irregularity is known to be present
    pub fn irregularity_confirmed(&self) -> bool {
        self.sentinel_state != SentinelState::RepairDeclined
    }

    /// Artifact as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, GeneratorError> {
        Ok(serde_json::to_string_pretty(&self.artifact)?)
    }
}

/// Synthesizes labeled billing artifacts
///
/// Identity → Clinical → Coding → Financial → Reconciliation → Sentinel →
/// Publish → (Review). Phases never retry; each falls back to a stub when the
/// oracle fails. Without an oracle every phase uses its stub, which keeps
/// runs fully deterministic for a given seed.
#[derive(Debug, Clone)]
pub struct Generator {
    config: GeneratorConfig,
    pricing: PricingResolver,
    oracle: Option<Oracle>,
}

impl Generator {
    /// Create a generator with the built-in benchmark table and no oracle
    pub fn new(config: GeneratorConfig) -> Result<Self, GeneratorError> {
        config.validate().map_err(GeneratorError::Config)?;
        Ok(Self {
            config,
            pricing: PricingResolver::default(),
            oracle: None,
        })
    }

    /// Use a specific pricing resolver
    ///
    /// An oracle already attached is attached to the resolver as well.
    pub fn with_pricing(mut self, pricing: PricingResolver) -> Self {
        self.pricing = match &self.oracle {
            Some(oracle) => pricing.with_oracle(oracle.clone()),
            None => pricing,
        };
        self
    }

    /// Attach an oracle, bounded by the configured per-call timeout
    pub fn with_oracle(mut self, oracle: Oracle) -> Self {
        let oracle = oracle.with_timeout(self.config.oracle_timeout());
        self.pricing = self.pricing.with_oracle(oracle.clone());
        self.oracle = Some(oracle);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Pricing resolver in use
    pub fn pricing(&self) -> &PricingResolver {
        &self.pricing
    }

    /// Generate one artifact carrying `scenario`
    ///
    /// An unknown scenario identifier is the only error; it aborts before
    /// any phase runs.
    pub async fn generate(&self, scenario: &str) -> Result<Generation, GeneratorError> {
        let scenario = Irregularity::parse(scenario).ok_or_else(|| GeneratorError::UnknownScenario {
            requested: scenario.to_string(),
            known: Irregularity::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "),
        })?;

        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let oracle = self.oracle.as_ref();
        let mut notes = Notes::default();

        info!(
            "Generating '{}' bill (seed {}, {} model, {} payer)",
            scenario.as_str(),
            seed,
            self.config.billing_model.as_str(),
            self.config.payer.as_str()
        );

        let facility = identity::build(scenario, oracle, &mut rng, &mut notes).await;
        debug!("Identity: {}", facility.name);

        let clinical = clinical::build(scenario, self.config.payer, oracle, &mut rng, &mut notes).await;
        debug!(
            "Clinical: {} {} visit, {} day(s)",
            clinical.acuity.as_str(),
            clinical.setting.as_str(),
            clinical.service_days()
        );

        let coding = coding::build(scenario, &clinical, self.config.billing_model, oracle, &mut notes).await;
        debug!("Coding: {} assignment(s)", coding.procedures.len());

        let encounter = Encounter {
            scenario,
            billing_model: self.config.billing_model,
            payer: self.config.payer,
            facility: &facility,
            clinical: &clinical,
            coding: &coding,
        };
        let mut artifact = financial::build(encounter, &self.pricing, &mut rng).await;
        artifact.provenance.extend(notes.0);
        info!(
            "Financial phase priced {} line(s), grand total {:.2}",
            artifact.line_items.len(),
            artifact.grand_total
        );

        let reconciliation = Reconciler::new(self.config.reconcile.clone()).reconcile(&mut artifact, seed);
        info!(
            "Reconciliation made {} correction(s), removed {} line(s)",
            reconciliation.corrections.len(),
            reconciliation.lines_removed()
        );

        let mut sentinel = Sentinel::new(self.config.sentinel.clone(), self.pricing.clone());
        if let Some(oracle) = &self.oracle {
            sentinel = sentinel.with_oracle(oracle.clone());
        }
        let outcome = sentinel.run(artifact).await;
        if outcome.state == SentinelState::RepairDeclined {
            warn!("Sentinel declined '{}': {}", scenario.as_str(), outcome.rationale);
        } else {
            info!("Sentinel finished {:?}: {}", outcome.state, outcome.rationale);
        }

        let mut artifact = outcome.artifact;
        publish::publish(&mut artifact, self.config.scan_mode);

        if self.config.review {
            review::review(&mut artifact, oracle).await;
            info!("Review recorded {} note(s)", artifact.review_notes.len());
        }

        Ok(Generation {
            artifact,
            seed,
            reconciliation,
            sentinel_state: outcome.state,
            sentinel_trace: outcome.trace,
            sentinel_rationale: outcome.rationale,
            sentinel_operations: outcome.operations,
        })
    }
}
