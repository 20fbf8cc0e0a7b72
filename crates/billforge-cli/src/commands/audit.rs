//! Audit command implementation.

use crate::cli::AuditArgs;
use crate::error::{CliError, Result};
use crate::session::Session;
use billforge_auditor::Auditor;
use billforge_domain::traits::ArtifactStore;
use billforge_domain::{AuditReport, BillArtifact};
use std::fs;

/// Run the auditor over one artifact with the session's configuration.
pub async fn run_audit(artifact: &BillArtifact, session: &Session) -> Result<AuditReport> {
    let mut auditor = Auditor::new(session.config.audit.clone())?.with_pricing(session.pricing()?);
    if let Some(oracle) = session.oracle() {
        auditor = auditor.with_oracle(oracle);
    }
    Ok(auditor.audit(artifact).await)
}

/// Execute the audit command.
pub async fn execute_audit(args: AuditArgs, session: &Session) -> Result<()> {
    let (name, artifact) = match (&args.name, &args.file) {
        (_, Some(path)) => {
            let contents = fs::read_to_string(path)?;
            let artifact: BillArtifact = serde_json::from_str(&contents)?;
            (artifact.id.to_string(), artifact)
        }
        (Some(name), None) => (name.clone(), session.store()?.load(name)?),
        (None, None) => {
            return Err(CliError::InvalidInput("Give a stored name or --file".to_string()));
        }
    };

    let report = run_audit(&artifact, session).await?;
    println!("{}", session.formatter.format_report(&report)?);

    if args.save_report {
        let saved = session.report_store()?.save_json(&name, &report)?;
        eprintln!("{}", session.formatter.success(&format!("Report saved as '{}'", saved)));
    }
    Ok(())
}
