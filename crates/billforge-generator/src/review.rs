//! Review phase: editorial notes from the oracle, never a line change

use crate::phase::{consult, stage, Notes};
use crate::prompt::{PromptBuilder, REVIEW_INSTRUCTIONS, REVIEW_SCHEMA, REVIEW_TASK};
use billforge_domain::BillArtifact;
use billforge_llm::Oracle;
use serde::Deserialize;

const MAX_NOTES: usize = 5;

#[derive(Debug, Deserialize)]
struct ReviewFragment {
    #[serde(default)]
    notes: Vec<String>,
}

fn statement_text(artifact: &BillArtifact) -> String {
    let Some(document) = &artifact.document else {
        return String::new();
    };
    let mut text = document.header.join("\n");
    for row in &document.rows {
        text.push_str(&format!("\n{} {} {} x{} {}", row.date, row.code, row.description, row.quantity, row.total));
    }
    text
}

/// Record editorial notes on the artifact
pub(crate) async fn review(artifact: &mut BillArtifact, oracle: Option<&Oracle>) {
    let prompt = PromptBuilder::new(REVIEW_TASK, REVIEW_INSTRUCTIONS, REVIEW_SCHEMA)
        .context("Statement", statement_text(artifact))
        .build();

    let mut notes = Notes::default();
    if let Some(fragment) = consult::<ReviewFragment>(oracle, stage::REVIEW, &prompt, REVIEW_SCHEMA, &mut notes).await {
        artifact.review_notes.extend(
            fragment
                .notes
                .into_iter()
                .map(|note| note.trim().to_string())
                .filter(|note| !note.is_empty())
                .take(MAX_NOTES),
        );
    }
    artifact.provenance.extend(notes.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::publish;
    use billforge_domain::{LineItem, NoteKind};
    use billforge_llm::MockProvider;
    use chrono::NaiveDate;

    fn published() -> BillArtifact {
        let day = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        let mut artifact = crate::test_support::artifact(vec![LineItem::new(day, "99213", "Office visit", 1, 231.0)]);
        publish(&mut artifact, false);
        artifact
    }

    #[tokio::test]
    async fn test_notes_recorded() {
        let mut artifact = published();
        let before = artifact.line_items.clone();
        let mut provider = MockProvider::new("{}");
        provider.add_response("TASK: review", r#"{"notes": ["Patient name casing differs", "  "]}"#);

        review(&mut artifact, Some(&Oracle::new(provider))).await;

        assert_eq!(artifact.review_notes, vec!["Patient name casing differs".to_string()]);
        assert_eq!(artifact.line_items, before);
    }

    #[tokio::test]
    async fn test_prompt_carries_statement() {
        let mut artifact = published();
        let provider = MockProvider::new(r#"{"notes": []}"#);
        let oracle = Oracle::new(provider.clone());

        review(&mut artifact, Some(&oracle)).await;

        assert_eq!(provider.calls_containing("Office visit"), 1);
    }

    #[tokio::test]
    async fn test_failure_leaves_no_notes() {
        let mut artifact = published();
        review(&mut artifact, Some(&Oracle::new(MockProvider::failing()))).await;

        assert!(artifact.review_notes.is_empty());
        assert_eq!(artifact.notes_of(NoteKind::OracleFallback).count(), 1);
    }
}
