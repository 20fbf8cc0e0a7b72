//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use billforge_domain::{AuditReport, BillArtifact, Irregularity, Verdict};
use billforge_generator::Generation;
use colored::*;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Longest evidence text shown in a table cell
const EVIDENCE_WIDTH: usize = 72;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

/// One row of the `list` command
pub struct Listing {
    /// Stored name
    pub name: String,
    /// The artifact, or `None` if it could not be read
    pub artifact: Option<BillArtifact>,
}

fn money(amount: f64) -> String {
    format!("{:.2}", amount)
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let cut: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{}…", cut)
}

fn styled(builder: Builder) -> String {
    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format a generation run, with the name it was saved under.
    pub fn format_generation(&self, generation: &Generation, saved: Option<&str>) -> Result<String> {
        let artifact = &generation.artifact;
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(artifact)?),
            OutputFormat::Quiet => Ok(saved.map(str::to_string).unwrap_or_else(|| artifact.id.to_string())),
            OutputFormat::Table => {
                let mut out = self.summary_table(artifact);
                out.push('\n');
                out.push_str(&self.lines_table(artifact));

                let sentinel = format!("Sentinel: {:?} ({})", generation.sentinel_state, generation.sentinel_rationale);
                out.push('\n');
                out.push_str(&if generation.irregularity_confirmed() {
                    self.info(&sentinel)
                } else {
                    self.warning(&sentinel)
                });
                out.push_str(&format!("\n{}", self.info(&format!("Seed: {}", generation.seed))));
                if let Some(name) = saved {
                    out.push_str(&format!("\n{}", self.success(&format!("Saved as '{}'", name))));
                }
                Ok(out)
            }
        }
    }

    /// Format a stored artifact.
    pub fn format_artifact(&self, artifact: &BillArtifact, show_truth: bool) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(artifact)?),
            OutputFormat::Quiet => Ok(artifact.id.to_string()),
            OutputFormat::Table => {
                let mut out = self.summary_table(artifact);
                out.push('\n');
                out.push_str(&self.lines_table(artifact));

                if let Some(twin) = artifact.split_twin.as_deref() {
                    out.push_str(&format!("\n{}\n", self.info("Professional-track twin")));
                    out.push_str(&self.lines_table(twin));
                }
                for note in &artifact.review_notes {
                    out.push_str(&format!("\n{}", self.info(&format!("Review: {}", note))));
                }
                if show_truth {
                    out.push('\n');
                    out.push_str(&self.truth_block(artifact));
                }
                Ok(out)
            }
        }
    }

    /// Format an audit report.
    pub fn format_report(&self, report: &AuditReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(billforge_auditor::report_json(report)?),
            OutputFormat::Quiet => Ok(format!("{} {}", report.health_score, report.quality.verdict.as_str())),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Guardian", "Result", "Lines", "Evidence"]);
                for result in &report.results {
                    let status = if result.errored {
                        self.colorize("ERROR", "yellow")
                    } else if result.passed {
                        self.colorize("pass", "green")
                    } else {
                        self.colorize("FAIL", "red")
                    };
                    let lines = result
                        .failure
                        .as_ref()
                        .map(|f| f.line_indices.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(","))
                        .unwrap_or_default();
                    builder.push_record([
                        result.rule.name().to_string(),
                        status,
                        lines,
                        truncate(&result.evidence, EVIDENCE_WIDTH),
                    ]);
                }

                let quality = &report.quality;
                let verdict = match quality.verdict {
                    Verdict::Effective => self.colorize(quality.verdict.as_str(), "green"),
                    Verdict::LogicGapDetected => self.colorize(quality.verdict.as_str(), "yellow"),
                    Verdict::HallucinationDetected => self.colorize(quality.verdict.as_str(), "red"),
                };

                let mut out = styled(builder);
                out.push_str(&format!("\nHealth score: {}/100", report.health_score));
                out.push_str(&format!("\nSummary: {}", report.executive_summary));
                out.push_str(&format!(
                    "\nIntended: {} | injection met: {} | fidelity: {}/100 | verdict: {}",
                    quality.intended.as_str(),
                    quality.injection_met,
                    quality.fidelity_score,
                    verdict
                ));
                out.push_str(&format!("\n{}", quality.justification));
                Ok(out)
            }
        }
    }

    /// Format the stored-artifact listing.
    pub fn format_listing(&self, listings: &[Listing]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let rows: Vec<serde_json::Value> = listings
                    .iter()
                    .map(|l| match &l.artifact {
                        Some(a) => serde_json::json!({
                            "name": l.name,
                            "id": a.id.to_string(),
                            "scenario": a.scenario,
                            "lines": a.line_items.len(),
                            "grand_total": a.grand_total,
                            "created_at": a.created_at,
                        }),
                        None => serde_json::json!({ "name": l.name, "error": "unreadable" }),
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&rows)?)
            }
            OutputFormat::Quiet => Ok(listings.iter().map(|l| l.name.as_str()).collect::<Vec<_>>().join("\n")),
            OutputFormat::Table => {
                if listings.is_empty() {
                    return Ok(self.colorize("No stored bills found.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Name", "Scenario", "Lines", "Grand total", "Created"]);
                for listing in listings {
                    match &listing.artifact {
                        Some(a) => builder.push_record([
                            listing.name.clone(),
                            a.scenario.as_str().to_string(),
                            a.line_items.len().to_string(),
                            money(a.grand_total),
                            a.created_at.format("%Y-%m-%d %H:%M").to_string(),
                        ]),
                        None => builder.push_record([
                            listing.name.clone(),
                            self.colorize("unreadable", "red"),
                            String::new(),
                            String::new(),
                            String::new(),
                        ]),
                    }
                }
                Ok(styled(builder))
            }
        }
    }

    /// Format the scenario catalogue.
    pub fn format_scenarios(&self) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let rows: Vec<serde_json::Value> = Irregularity::ALL
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "id": s.as_str(),
                            "label": s.label(),
                            "guardian": s.primary_guardian().map(|g| g.name()),
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&rows)?)
            }
            OutputFormat::Quiet => Ok(Irregularity::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("\n")),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Scenario", "Irregularity", "Guardian"]);
                for scenario in Irregularity::ALL {
                    builder.push_record([
                        scenario.as_str(),
                        scenario.label(),
                        scenario.primary_guardian().map(|g| g.name()).unwrap_or("-"),
                    ]);
                }
                Ok(styled(builder))
            }
        }
    }

    fn summary_table(&self, artifact: &BillArtifact) -> String {
        let facility = &artifact.facility;
        let clinical = &artifact.clinical;

        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        let mut row = |label: &str, value: String| builder.push_record([label.to_string(), value]);
        row("Scenario", artifact.scenario.as_str().to_string());
        row("Facility", format!("{} ({})", facility.name, facility.mailing_address()));
        row("NPI / Tax ID", format!("{} / {}", facility.npi, facility.tax_id));
        row("Patient", format!("{} ({})", clinical.patient.name, clinical.patient.member_id));
        row(
            "Encounter",
            format!("{} {}, {}", clinical.acuity.as_str(), clinical.setting.as_str(), clinical.encounter.chief_complaint),
        );
        row("Service dates", format!("{} to {}", clinical.admit_date, clinical.discharge_date));
        row("Payer", format!("{} ({:?})", artifact.payer.as_str(), artifact.network_status));
        row("Subtotal", money(artifact.subtotal));
        row("Adjustments", money(artifact.adjustments));
        row("Insurance paid", money(artifact.insurance_paid));
        row("Grand total", money(artifact.grand_total));
        if let Some(estimate) = artifact.estimate {
            row("Estimate", money(estimate));
        }
        if let Some(amount) = artifact.balance_billed {
            row("Balance billed", money(amount));
        }
        styled(builder)
    }

    fn lines_table(&self, artifact: &BillArtifact) -> String {
        let offending = artifact.ground_truth.line_indices();
        let mut builder = Builder::default();
        builder.push_record(["#", "Date", "Rev", "Code", "Description", "Qty", "Unit", "Total"]);
        for (index, line) in artifact.line_items.iter().enumerate() {
            let marker = if offending.contains(&index) {
                self.colorize(&format!("{}*", index), "red")
            } else {
                index.to_string()
            };
            builder.push_record([
                marker,
                line.date.to_string(),
                line.revenue_code.clone(),
                line.full_code(),
                line.description.clone(),
                line.quantity.to_string(),
                money(line.unit_price),
                money(line.total),
            ]);
        }
        styled(builder)
    }

    fn truth_block(&self, artifact: &BillArtifact) -> String {
        let truth = &artifact.ground_truth;
        let mut out = self.info(&format!("Ground truth: {}", truth.irregularity.label()));
        out.push_str(&format!("\n  {}", truth.explanation));
        if !truth.expected_vs_actual.is_empty() {
            out.push_str(&format!("\n  {}", truth.expected_vs_actual));
        }
        if truth.has_deleted_lines() {
            out.push_str(&format!("\n  {}", self.warning("Some offending lines were removed by reconciliation")));
        }
        for marker in &artifact.interventions {
            out.push_str(&format!("\n  Intervention: {} [{}]", marker.reason, marker.operations.join("; ")));
        }
        out
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}
