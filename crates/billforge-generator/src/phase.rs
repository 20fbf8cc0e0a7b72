//! What every phase shares: stage names and the single oracle consultation

use billforge_domain::{NoteKind, ProvenanceNote};
use billforge_llm::Oracle;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Provenance stage names
pub mod stage {
    /// Facility identity
    pub const IDENTITY: &str = "identity";
    /// Clinical narrative
    pub const CLINICAL: &str = "clinical";
    /// Code assignment
    pub const CODING: &str = "coding";
    /// Pricing and totals
    pub const FINANCIAL: &str = "financial";
    /// Document projection
    pub const PUBLISH: &str = "publish";
    /// Editorial review
    pub const REVIEW: &str = "review";
}

/// Notes collected before the artifact exists
#[derive(Debug, Default)]
pub(crate) struct Notes(pub Vec<ProvenanceNote>);

impl Notes {
    pub fn push(&mut self, stage: &str, kind: NoteKind, message: impl Into<String>) {
        self.0.push(ProvenanceNote::new(stage, kind, message));
    }
}

/// Ask the oracle once; a failure becomes an `OracleFallback` note
///
/// Returns `None` without a note when no oracle is attached.
pub(crate) async fn consult<T: DeserializeOwned>(
    oracle: Option<&Oracle>,
    stage: &str,
    prompt: &str,
    schema: &str,
    notes: &mut Notes,
) -> Option<T> {
    let oracle = oracle?;
    debug!("{} prompt length: {} chars", stage, prompt.len());

    match oracle.ask::<T>(prompt, schema).await {
        Ok(fragment) => Some(fragment),
        Err(e) => {
            warn!("{} phase falling back to stub: {}", stage, e);
            notes.push(stage, NoteKind::OracleFallback, format!("Oracle unavailable, stub used: {}", e));
            None
        }
    }
}
