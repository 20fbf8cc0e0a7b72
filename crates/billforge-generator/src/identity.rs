//! Identity phase: who issues the bill

use crate::phase::{consult, stage, Notes};
use crate::prompt::{PromptBuilder, IDENTITY_INSTRUCTIONS, IDENTITY_SCHEMA, IDENTITY_TASK};
use billforge_domain::identifiers::{ein_from_seed, invalid_npi_from_seed, npi_from_seed};
use billforge_domain::{FacilityIdentity, Irregularity, NoteKind};
use billforge_llm::Oracle;
use rand::rngs::StdRng;
use rand::Rng;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct IdentityFragment {
    name: String,
    address: String,
    city: String,
    region: String,
    postal_code: String,
    #[serde(default)]
    attending_name: String,
}

impl IdentityFragment {
    fn problems(&self) -> Vec<&'static str> {
        let mut problems = Vec::new();
        if self.name.trim().is_empty() {
            problems.push("blank facility name");
        }
        if self.address.trim().is_empty() || self.city.trim().is_empty() {
            problems.push("blank address");
        }
        let region = self.region.trim();
        if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
            problems.push("state is not a two-letter code");
        }
        let zip = self.postal_code.trim();
        if zip.len() < 5 || !zip.chars().take(5).all(|c| c.is_ascii_digit()) {
            problems.push("postal code is not a ZIP code");
        }
        problems
    }
}

/// The fixed facility used when the oracle is unavailable
pub(crate) fn stub_facility() -> FacilityIdentity {
    FacilityIdentity {
        name: "Mercy General Hospital".to_string(),
        address: "1200 Harbor Blvd".to_string(),
        city: "Sacramento".to_string(),
        region: "CA".to_string(),
        postal_code: "95814".to_string(),
        npi: String::new(),
        tax_id: String::new(),
        attending_npi: String::new(),
        attending_name: "Dana Reyes, MD".to_string(),
    }
}

/// Build the facility identity
///
/// Names and addresses may come from the oracle; identifiers never do.
pub(crate) async fn build(
    scenario: Irregularity,
    oracle: Option<&Oracle>,
    rng: &mut StdRng,
    notes: &mut Notes,
) -> FacilityIdentity {
    let prompt = PromptBuilder::new(IDENTITY_TASK, IDENTITY_INSTRUCTIONS, IDENTITY_SCHEMA).build();

    let mut facility = match consult::<IdentityFragment>(oracle, stage::IDENTITY, &prompt, IDENTITY_SCHEMA, notes).await {
        Some(fragment) if fragment.problems().is_empty() => FacilityIdentity {
            name: fragment.name.trim().to_string(),
            address: fragment.address.trim().to_string(),
            city: fragment.city.trim().to_string(),
            region: fragment.region.trim().to_uppercase(),
            postal_code: fragment.postal_code.trim().chars().take(5).collect(),
            attending_name: if fragment.attending_name.trim().is_empty() {
                stub_facility().attending_name
            } else {
                fragment.attending_name.trim().to_string()
            },
            ..stub_facility()
        },
        Some(fragment) => {
            notes.push(
                stage::IDENTITY,
                NoteKind::ValidationFailure,
                format!("Oracle facility rejected ({}), stub used", fragment.problems().join(", ")),
            );
            stub_facility()
        }
        None => stub_facility(),
    };

    facility.npi = npi_from_seed(rng.gen());
    facility.tax_id = ein_from_seed(rng.gen());
    facility.attending_npi = if scenario == Irregularity::GhostProvider {
        invalid_npi_from_seed(rng.gen())
    } else {
        npi_from_seed(rng.gen())
    };
    facility
}

#[cfg(test)]
mod tests {
    use super::*;
    use billforge_domain::identifiers::{is_valid_ein, is_valid_npi};
    use billforge_llm::MockProvider;
    use rand::SeedableRng;

    #[tokio::test]
    async fn test_offline_uses_stub() {
        let mut notes = Notes::default();
        let facility = build(Irregularity::None, None, &mut StdRng::seed_from_u64(1), &mut notes).await;

        assert_eq!(facility.name, "Mercy General Hospital");
        assert!(is_valid_npi(&facility.npi));
        assert!(is_valid_npi(&facility.attending_npi));
        assert!(is_valid_ein(&facility.tax_id));
        assert!(notes.0.is_empty());
    }

    #[tokio::test]
    async fn test_oracle_facility_accepted() {
        let oracle = Oracle::new(MockProvider::new(
            r#"{"name": "Lakeside Clinic", "address": "9 Pine Rd", "city": "Boise", "region": "id", "postal_code": "83702-1100", "attending_name": "Kim Ito, DO"}"#,
        ));
        let mut notes = Notes::default();
        let facility = build(Irregularity::None, Some(&oracle), &mut StdRng::seed_from_u64(1), &mut notes).await;

        assert_eq!(facility.name, "Lakeside Clinic");
        assert_eq!(facility.region, "ID");
        assert_eq!(facility.postal_code, "83702");
        assert_eq!(facility.attending_name, "Kim Ito, DO");
        assert!(notes.0.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_oracle_facility_rejected() {
        let oracle = Oracle::new(MockProvider::new(
            r#"{"name": "Nowhere", "address": "1 Main", "city": "Somewhere", "region": "Texas", "postal_code": "ABCDE"}"#,
        ));
        let mut notes = Notes::default();
        let facility = build(Irregularity::None, Some(&oracle), &mut StdRng::seed_from_u64(1), &mut notes).await;

        assert_eq!(facility.name, "Mercy General Hospital");
        assert_eq!(notes.0.len(), 1);
        assert_eq!(notes.0[0].kind, NoteKind::ValidationFailure);
    }

    #[tokio::test]
    async fn test_oracle_failure_noted() {
        let oracle = Oracle::new(MockProvider::failing());
        let mut notes = Notes::default();
        build(Irregularity::None, Some(&oracle), &mut StdRng::seed_from_u64(1), &mut notes).await;

        assert_eq!(notes.0.len(), 1);
        assert_eq!(notes.0[0].kind, NoteKind::OracleFallback);
        assert_eq!(notes.0[0].stage, stage::IDENTITY);
    }

    #[tokio::test]
    async fn test_ghost_provider_gets_invalid_attending_npi() {
        let mut notes = Notes::default();
        let facility = build(Irregularity::GhostProvider, None, &mut StdRng::seed_from_u64(3), &mut notes).await;

        assert!(is_valid_npi(&facility.npi));
        assert!(!is_valid_npi(&facility.attending_npi));
    }
}
