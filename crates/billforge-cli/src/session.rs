//! Resolved per-invocation state shared by every command.

use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use billforge_llm::{OllamaProvider, Oracle};
use billforge_pricing::{BenchmarkTable, PricingResolver, RateCache};
use billforge_store::JsonDirStore;
use std::path::PathBuf;
use tracing::debug;

/// Configuration plus command-line overrides.
pub struct Session {
    /// Loaded configuration
    pub config: Config,

    /// Output formatter
    pub formatter: Formatter,

    /// Artifact directory
    pub store_dir: PathBuf,

    /// Oracle disabled for this invocation
    pub offline: bool,
}

impl Session {
    /// The oracle, if configured and not overridden by `--offline`.
    pub fn oracle(&self) -> Option<Oracle> {
        if self.offline || !self.config.oracle.enabled {
            return None;
        }
        let settings = &self.config.oracle;
        debug!("Using oracle {} at {}", settings.model, settings.endpoint);
        let provider = OllamaProvider::new(&settings.endpoint, &settings.model).with_max_retries(settings.max_retries);
        Some(Oracle::new(provider))
    }

    /// Pricing resolver over the configured benchmark table.
    ///
    /// A fresh cache per invocation; oracle rates are not persisted.
    pub fn pricing(&self) -> Result<PricingResolver> {
        let table = match &self.config.settings.benchmark_table {
            Some(path) => BenchmarkTable::load(path)?,
            None => BenchmarkTable::builtin(),
        };
        Ok(PricingResolver::new(RateCache::new(), table))
    }

    /// Open the artifact store.
    pub fn store(&self) -> Result<JsonDirStore> {
        Ok(JsonDirStore::new(&self.store_dir)?)
    }

    /// Open the audit report store, kept apart so listings show bills only.
    pub fn report_store(&self) -> Result<JsonDirStore> {
        Ok(JsonDirStore::new(self.store_dir.join("reports"))?)
    }
}
