//! End-to-end generation runs, offline and against a mock oracle

use billforge_domain::identifiers::is_valid_npi;
use billforge_domain::{BillingModel, Irregularity, NoteKind, PayerClass, Track};
use billforge_generator::{stage, Generator, GeneratorConfig};
use billforge_llm::{MockProvider, Oracle};

fn config(seed: u64) -> GeneratorConfig {
    GeneratorConfig {
        seed: Some(seed),
        ..GeneratorConfig::default()
    }
}

fn offline(seed: u64) -> Generator {
    Generator::new(config(seed)).unwrap()
}

#[tokio::test]
async fn clean_bill_is_consistent() {
    let generation = offline(11).generate("none").await.unwrap();
    let artifact = &generation.artifact;

    assert_eq!(artifact.scenario, Irregularity::None);
    assert!(artifact.lines_consistent());
    assert!(artifact.balance_consistent());
    assert!(artifact.ground_truth.offending.is_empty());
    assert!(artifact.duplicate_line_indices().is_empty());
    assert!(artifact.facility.has_valid_identifiers());
    assert!(generation.sentinel_operations.is_empty());
    assert!(artifact.interventions.is_empty());
}

#[tokio::test]
async fn duplicate_is_observable() {
    let generation = offline(12).generate("duplicate").await.unwrap();
    let artifact = &generation.artifact;

    let duplicates = artifact.duplicate_line_indices();
    assert!(!duplicates.is_empty());
    assert!(generation.irregularity_confirmed());
    for index in artifact.ground_truth.line_indices() {
        assert!(index < artifact.line_items.len());
    }
    assert!(artifact.balance_consistent());
}

#[tokio::test]
async fn closures_hold_outside_math_scenarios() {
    for seed in 1..=3 {
        for scenario in Irregularity::ALL {
            let generation = offline(seed).generate(scenario.as_str()).await.unwrap();
            let artifact = &generation.artifact;

            if scenario != Irregularity::MathError {
                assert!(artifact.lines_consistent(), "{} seed {}", scenario, seed);
            }
            if scenario != Irregularity::BalanceError {
                assert!(artifact.balance_consistent(), "{} seed {}", scenario, seed);
            }
            assert!(artifact.document.is_some());
        }
    }
}

#[tokio::test]
async fn estimate_variance_injected_for_every_payer() {
    let payers = [PayerClass::Medicare, PayerClass::Medicaid, PayerClass::Commercial, PayerClass::SelfPay];
    for billing_model in [BillingModel::Combined, BillingModel::Split] {
        for payer in payers {
            for seed in 1..=10 {
                let config = GeneratorConfig {
                    billing_model,
                    payer,
                    ..config(seed)
                };
                let generation = Generator::new(config).unwrap().generate("estimate-variance").await.unwrap();
                let artifact = &generation.artifact;
                let context = format!("{:?} {:?} seed {}: {}", billing_model, payer, seed, generation.sentinel_rationale);

                assert!(generation.irregularity_confirmed(), "{}", context);
                let estimate = artifact.estimate.unwrap();
                assert!(estimate > 0.0, "{}", context);
                assert!(artifact.subtotal - estimate > 400.0, "{}", context);
                assert!(!artifact.ground_truth.line_indices().is_empty(), "{}", context);
            }
        }
    }
}

#[tokio::test]
async fn estimates_are_never_zero() {
    for scenario in Irregularity::ALL {
        let generation = offline(31).generate(scenario.as_str()).await.unwrap();
        assert!(generation.artifact.estimate.unwrap() > 0.0, "{}", scenario);
    }
}

#[tokio::test]
async fn provider_identifiers_valid_except_ghost() {
    for scenario in Irregularity::ALL {
        let generation = offline(21).generate(scenario.as_str()).await.unwrap();
        let facility = &generation.artifact.facility;

        assert!(is_valid_npi(&facility.npi), "{}", scenario);
        if scenario == Irregularity::GhostProvider {
            assert!(!facility.has_valid_npis());
        } else {
            assert!(is_valid_npi(&facility.attending_npi), "{}", scenario);
        }
    }
}

#[tokio::test]
async fn same_seed_same_bill() {
    let a = offline(77).generate("price-gouging").await.unwrap();
    let b = offline(77).generate("price-gouging").await.unwrap();

    assert_eq!(a.artifact.facility, b.artifact.facility);
    assert_eq!(a.artifact.clinical, b.artifact.clinical);
    assert_eq!(a.artifact.line_items, b.artifact.line_items);
    assert_eq!(a.artifact.grand_total, b.artifact.grand_total);
    assert_eq!(a.artifact.ground_truth, b.artifact.ground_truth);
}

#[tokio::test]
async fn failing_oracle_falls_back_to_stubs() {
    let generator = Generator::new(config(5))
        .unwrap()
        .with_oracle(Oracle::new(MockProvider::failing()));

    let generation = generator.generate("none").await.unwrap();
    let artifact = &generation.artifact;

    let stages: Vec<&str> = artifact
        .notes_of(NoteKind::OracleFallback)
        .map(|note| note.stage.as_str())
        .collect();
    assert!(stages.contains(&stage::IDENTITY));
    assert!(stages.contains(&stage::CLINICAL));
    assert!(stages.contains(&stage::CODING));
    assert!(!artifact.line_items.is_empty());
    assert!(artifact.balance_consistent());
}

#[tokio::test]
async fn oracle_fragments_are_used() {
    let mut provider = MockProvider::failing();
    provider.add_response(
        "TASK: identity",
        r#"```json
{"name": "Cedar Valley Medical Center", "address": "400 Elm St", "city": "Denver", "region": "CO", "postal_code": "80202", "attending_name": "Sam Okafor, MD"}
```"#,
    );
    let generator = Generator::new(config(6))
        .unwrap()
        .with_oracle(Oracle::new(provider.clone()));

    let generation = generator.generate("none").await.unwrap();

    assert_eq!(generation.artifact.facility.name, "Cedar Valley Medical Center");
    assert_eq!(generation.artifact.facility.region, "CO");
    assert!(is_valid_npi(&generation.artifact.facility.npi));
    assert_eq!(provider.calls_containing("TASK: identity"), 1);
}

#[tokio::test]
async fn review_notes_recorded_when_enabled() {
    let mut provider = MockProvider::failing();
    provider.add_response("TASK: review", r#"{"notes": ["Attending name is abbreviated inconsistently"]}"#);
    let generator = Generator::new(GeneratorConfig {
        review: true,
        ..config(8)
    })
    .unwrap()
    .with_oracle(Oracle::new(provider));

    let generation = generator.generate("none").await.unwrap();

    assert_eq!(generation.artifact.review_notes.len(), 1);
}

#[tokio::test]
async fn split_model_produces_professional_twin() {
    let generator = Generator::new(GeneratorConfig {
        billing_model: BillingModel::Split,
        ..config(9)
    })
    .unwrap();

    let generation = generator.generate("none").await.unwrap();
    let artifact = &generation.artifact;

    assert_eq!(artifact.track, Track::Facility);
    let twin = artifact.split_twin.as_deref().unwrap();
    assert_eq!(twin.track, Track::Professional);
    assert!(!twin.line_items.is_empty());
    assert!(twin.balance_consistent());
    assert!(twin.document.is_some());
}

#[tokio::test]
async fn unknown_scenario_aborts() {
    let result = offline(1).generate("phantom-charge").await;
    assert!(result.is_err());
}
