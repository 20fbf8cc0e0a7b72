//! Publish phase: project the artifact into the document the renderer draws

use billforge_domain::{BillArtifact, BillDocument, DocumentRow, Track};
use chrono::NaiveDate;

const DATE_FORMAT: &str = "%m/%d/%Y";

fn date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn money(amount: f64) -> String {
    format!("{:.2}", amount)
}

/// Amounts taken off the charges, shown negative
fn credit(amount: f64) -> String {
    if amount == 0.0 {
        money(0.0)
    } else {
        money(-amount.abs())
    }
}

fn title(artifact: &BillArtifact) -> String {
    match artifact.track {
        Track::Combined => "Itemized Statement".to_string(),
        Track::Facility => "Itemized Statement: Facility Charges".to_string(),
        Track::Professional => "Itemized Statement: Professional Services".to_string(),
    }
}

fn field(label: &str, value: &str) -> String {
    format!("{}: {}", label, value)
}

/// Project one artifact into a `BillDocument`
pub fn document_for(artifact: &BillArtifact, scan_mode: bool) -> BillDocument {
    let facility = &artifact.facility;
    let clinical = &artifact.clinical;

    let service_dates = if clinical.admit_date == clinical.discharge_date {
        date(clinical.admit_date)
    } else {
        format!("{} - {}", date(clinical.admit_date), date(clinical.discharge_date))
    };

    let header = vec![
        facility.name.clone(),
        facility.mailing_address(),
        field("NPI", &facility.npi),
        field("Tax ID", &facility.tax_id),
        field("Patient", &clinical.patient.name),
        field("Member ID", &clinical.patient.member_id),
        field("Attending", &format!("{} (NPI {})", facility.attending_name, facility.attending_npi)),
        field("Service dates", &service_dates),
        field("Payer", artifact.payer.as_str()),
    ];

    let rows = artifact
        .line_items
        .iter()
        .map(|line| DocumentRow {
            date: date(line.date),
            revenue_code: line.revenue_code.clone(),
            code: line.full_code(),
            description: line.description.clone(),
            quantity: line.quantity.to_string(),
            unit_price: money(line.unit_price),
            total: money(line.total),
        })
        .collect();

    let mut totals = vec![
        ("Total charges".to_string(), money(artifact.subtotal)),
        ("Adjustments".to_string(), credit(artifact.adjustments)),
        ("Insurance paid".to_string(), credit(artifact.insurance_paid)),
        ("Patient balance".to_string(), money(artifact.grand_total)),
    ];
    if let Some(estimate) = artifact.estimate {
        totals.push(("Good-faith estimate".to_string(), money(estimate)));
    }
    if let Some(balance_billed) = artifact.balance_billed {
        totals.push(("Balance billed".to_string(), money(balance_billed)));
    }

    let mut footer = vec![format!("Statement {}", artifact.id)];
    if !artifact.coding.diagnoses.is_empty() {
        let diagnoses: Vec<&str> = artifact.coding.diagnoses.iter().map(|d| d.code.as_str()).collect();
        footer.push(field("Diagnoses", &diagnoses.join(", ")));
    }
    if artifact.track == Track::Facility {
        footer.push("Physician services are billed separately.".to_string());
    }
    footer.push("Questions about this statement? Contact the billing office.".to_string());

    BillDocument {
        title: title(artifact),
        header,
        rows,
        totals,
        footer,
        scan_mode,
    }
}

/// Attach documents to the artifact and its split twin
pub(crate) fn publish(artifact: &mut BillArtifact, scan_mode: bool) {
    artifact.document = Some(document_for(artifact, scan_mode));
    if let Some(twin) = artifact.split_twin.as_deref_mut() {
        twin.document = Some(document_for(twin, scan_mode));
    }
}
