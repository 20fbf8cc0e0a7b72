//! CLI command definitions and argument parsing.

use billforge_domain::{BillingModel, PayerClass};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// BillForge CLI - Generate and audit labeled synthetic medical bills.
#[derive(Debug, Parser)]
#[command(name = "billforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BILLFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Artifact directory
    #[arg(long, global = true, env = "BILLFORGE_STORE")]
    pub store: Option<PathBuf>,

    /// Never call the oracle, even if one is configured
    #[arg(long, global = true)]
    pub offline: bool,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (names and scores only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a bill carrying a scenario
    Generate(GenerateArgs),

    /// Audit a stored or exported bill
    Audit(AuditArgs),

    /// List stored bills
    List,

    /// Show a stored bill
    Show(ShowArgs),

    /// List the scenario catalogue
    Scenarios,
}

/// Arguments for the generate command.
#[derive(Debug, Parser)]
pub struct GenerateArgs {
    /// Scenario identifier (see `billforge scenarios`)
    pub scenario: String,

    /// Seed for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,

    /// Billing model
    #[arg(short, long, value_enum)]
    pub model: Option<ModelArg>,

    /// Payer class
    #[arg(short, long, value_enum)]
    pub payer: Option<PayerArg>,

    /// Ask the oracle for editorial review notes
    #[arg(long)]
    pub review: bool,

    /// Mark the document for scanned-paper rendering
    #[arg(long)]
    pub scan_mode: bool,

    /// Save the artifact under this name
    #[arg(short, long)]
    pub save: Option<String>,

    /// Audit the artifact right after generating it
    #[arg(long)]
    pub audit: bool,
}

/// Arguments for the audit command.
#[derive(Debug, Parser)]
pub struct AuditArgs {
    /// Stored artifact name
    #[arg(required_unless_present = "file")]
    pub name: Option<String>,

    /// Read the artifact from a JSON file instead of the store
    #[arg(long, conflicts_with = "name")]
    pub file: Option<PathBuf>,

    /// Save the report in the store's `reports` directory
    #[arg(long)]
    pub save_report: bool,
}

/// Arguments for the show command.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Stored artifact name
    pub name: String,

    /// Include the ground truth
    #[arg(long)]
    pub truth: bool,
}

/// Billing model argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ModelArg {
    /// One combined bill
    Combined,
    /// Facility bill plus professional twin
    Split,
}

impl From<ModelArg> for BillingModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Combined => BillingModel::Combined,
            ModelArg::Split => BillingModel::Split,
        }
    }
}

/// Payer class argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PayerArg {
    /// Medicare
    Medicare,
    /// Medicaid
    Medicaid,
    /// Commercial insurance
    Commercial,
    /// Uninsured
    SelfPay,
}

impl From<PayerArg> for PayerClass {
    fn from(arg: PayerArg) -> Self {
        match arg {
            PayerArg::Medicare => PayerClass::Medicare,
            PayerArg::Medicaid => PayerClass::Medicaid,
            PayerArg::Commercial => PayerClass::Commercial,
            PayerArg::SelfPay => PayerClass::SelfPay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_args() {
        let cli = Cli::parse_from([
            "billforge", "generate", "price-gouging", "--seed", "7", "--model", "split", "--payer", "self-pay",
        ]);
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.scenario, "price-gouging");
                assert_eq!(args.seed, Some(7));
                assert_eq!(BillingModel::from(args.model.unwrap()), BillingModel::Split);
                assert_eq!(PayerClass::from(args.payer.unwrap()), PayerClass::SelfPay);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_audit_requires_source() {
        assert!(Cli::try_parse_from(["billforge", "audit"]).is_err());
        assert!(Cli::try_parse_from(["billforge", "audit", "--file", "bill.json"]).is_ok());
        assert!(Cli::try_parse_from(["billforge", "audit", "bill", "--file", "bill.json"]).is_err());
    }
}
