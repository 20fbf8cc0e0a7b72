//! BillForge CLI - Command-line interface for the synthetic medical bill generator.

use anyhow::Context;
use billforge_cli::commands;
use billforge_cli::{Cli, Command, Config, Formatter, Session};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Flags override the config file
    let format = cli.format.map(Into::into).unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let store_dir = match cli.store {
        Some(dir) => dir,
        None => config.store_dir()?,
    };

    let session = Session {
        formatter: Formatter::new(format, color_enabled),
        config,
        store_dir,
        offline: cli.offline,
    };

    match cli.command {
        Command::Generate(args) => commands::execute_generate(args, &session).await?,
        Command::Audit(args) => commands::execute_audit(args, &session).await?,
        Command::List => commands::execute_list(&session)?,
        Command::Show(args) => commands::execute_show(args, &session)?,
        Command::Scenarios => commands::execute_scenarios(&session.formatter)?,
    }

    Ok(())
}
