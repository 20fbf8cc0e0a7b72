//! Generate command implementation.

use crate::cli::GenerateArgs;
use crate::commands::audit::run_audit;
use crate::error::Result;
use crate::session::Session;
use billforge_domain::traits::ArtifactStore;
use billforge_generator::{Generator, GeneratorConfig};

/// Apply command-line overrides to the configured generator defaults.
fn generator_config(args: &GenerateArgs, session: &Session) -> GeneratorConfig {
    let mut config = session.config.generator.clone();
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(model) = args.model {
        config.billing_model = model.into();
    }
    if let Some(payer) = args.payer {
        config.payer = payer.into();
    }
    config.review |= args.review;
    config.scan_mode |= args.scan_mode;
    config
}

/// Execute the generate command.
pub async fn execute_generate(args: GenerateArgs, session: &Session) -> Result<()> {
    let mut generator = Generator::new(generator_config(&args, session))?.with_pricing(session.pricing()?);
    if let Some(oracle) = session.oracle() {
        generator = generator.with_oracle(oracle);
    }

    let generation = generator.generate(&args.scenario).await?;

    let saved = match &args.save {
        Some(name) => Some(session.store()?.save(name, &generation.artifact)?),
        None => None,
    };
    println!("{}", session.formatter.format_generation(&generation, saved.as_deref())?);

    if args.audit {
        let report = run_audit(&generation.artifact, session).await?;
        println!("{}", session.formatter.format_report(&report)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ModelArg, PayerArg};
    use crate::config::{Config, OutputFormat};
    use crate::output::Formatter;
    use billforge_domain::{BillingModel, PayerClass};
    use std::path::PathBuf;

    fn args() -> GenerateArgs {
        GenerateArgs {
            scenario: "none".to_string(),
            seed: None,
            model: None,
            payer: None,
            review: false,
            scan_mode: false,
            save: None,
            audit: false,
        }
    }

    fn session(store_dir: PathBuf) -> Session {
        let mut config = Config::default();
        config.generator.seed = Some(3);
        Session {
            config,
            formatter: Formatter::new(OutputFormat::Quiet, false),
            store_dir,
            offline: true,
        }
    }

    #[test]
    fn test_overrides_apply() {
        let session = session(PathBuf::from("unused"));
        let config = generator_config(
            &GenerateArgs {
                seed: Some(10),
                model: Some(ModelArg::Split),
                payer: Some(PayerArg::Medicaid),
                scan_mode: true,
                ..args()
            },
            &session,
        );
        assert_eq!(config.seed, Some(10));
        assert_eq!(config.billing_model, BillingModel::Split);
        assert_eq!(config.payer, PayerClass::Medicaid);
        assert!(config.scan_mode);
        assert!(!config.review);
    }

    #[test]
    fn test_config_defaults_kept() {
        let session = session(PathBuf::from("unused"));
        let config = generator_config(&args(), &session);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config, session.config.generator);
    }

    #[tokio::test]
    async fn test_generate_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path().to_path_buf());

        execute_generate(
            GenerateArgs {
                save: Some("first bill".to_string()),
                audit: true,
                ..args()
            },
            &session,
        )
        .await
        .unwrap();

        let store = session.store().unwrap();
        assert_eq!(store.list().unwrap(), vec!["first_bill".to_string()]);
        assert_eq!(store.load("first_bill").unwrap().scenario, billforge_domain::Irregularity::None);
    }

    #[tokio::test]
    async fn test_unknown_scenario_is_an_error() {
        let session = session(PathBuf::from("unused"));
        let result = execute_generate(
            GenerateArgs {
                scenario: "bogus".to_string(),
                ..args()
            },
            &session,
        )
        .await;
        assert!(result.is_err());
    }
}
