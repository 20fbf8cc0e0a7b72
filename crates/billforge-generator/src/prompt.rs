//! Oracle prompts for the generation phases

/// Builds a phase prompt: task marker, instructions, context, output reminder
pub(crate) struct PromptBuilder {
    task: &'static str,
    instructions: &'static str,
    context: Vec<(String, String)>,
    schema: &'static str,
}

impl PromptBuilder {
    /// Create a new prompt builder
    pub fn new(task: &'static str, instructions: &'static str, schema: &'static str) -> Self {
        Self {
            task,
            instructions,
            context: Vec::new(),
            schema,
        }
    }

    /// Add a labeled context line
    pub fn context(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((label.into(), value.into()));
        self
    }

    /// Build the complete prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!("TASK: {}\n", self.task));
        prompt.push_str(self.instructions);
        prompt.push_str("\n\n");

        if !self.context.is_empty() {
            prompt.push_str("Context:\n");
            for (label, value) in &self.context {
                prompt.push_str(&format!("- {}: {}\n", label, value));
            }
            prompt.push('\n');
        }

        prompt.push_str(OUTPUT_FORMAT_REMINDER);
        prompt.push_str(self.schema);
        prompt.push('\n');
        prompt
    }
}

pub(crate) const IDENTITY_TASK: &str = "identity";
pub(crate) const CLINICAL_TASK: &str = "clinical";
pub(crate) const CODING_TASK: &str = "coding";
pub(crate) const REVIEW_TASK: &str = "review";

pub(crate) const IDENTITY_INSTRUCTIONS: &str = r#"Invent a plausible US hospital or clinic that could issue an itemized medical bill.
Use a real US city and its two-letter state code with a matching five-digit ZIP code.
Do not invent provider or tax identifiers; they are assigned separately."#;

pub(crate) const IDENTITY_SCHEMA: &str = r#"{"name": string, "address": string, "city": string, "region": string, "postal_code": string, "attending_name": string}"#;

pub(crate) const CLINICAL_INSTRUCTIONS: &str = r#"Write a short, internally consistent clinical encounter for a synthetic patient.
Match the care setting and acuity given below. Keep every section to one or two sentences.
Only mention a body side if a documented side is given, and then mention only that side."#;

pub(crate) const CLINICAL_SCHEMA: &str = r#"{"patient": {"name": string, "age": number, "sex": "M"|"F"}, "encounter": {"chief_complaint": string, "history": string, "exam": string, "assessment": string, "plan": string}}"#;

pub(crate) const CODING_INSTRUCTIONS: &str = r#"Translate the encounter into billable procedure codes (CPT/HCPCS) and ICD-10 diagnosis codes.
List each service once with its units. Include exactly one evaluation and management visit.
Do not add modifiers; they are assigned separately."#;

pub(crate) const CODING_SCHEMA: &str = r#"{"procedures": [{"code": string, "units": number, "day_offset": number}], "diagnoses": [{"code": string, "description": string}]}"#;

pub(crate) const REVIEW_INSTRUCTIONS: &str = r#"Review this itemized bill as a billing editor. Point out wording or formatting that reads
inconsistently (descriptions, dates, names). Do not comment on prices or codes. At most five notes."#;

pub(crate) const REVIEW_SCHEMA: &str = r#"{"notes": [string]}"#;

const OUTPUT_FORMAT_REMINDER: &str = "Respond with JSON only, no commentary, matching: ";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_starts_with_task_marker() {
        let prompt = PromptBuilder::new(IDENTITY_TASK, IDENTITY_INSTRUCTIONS, IDENTITY_SCHEMA).build();
        assert!(prompt.starts_with("TASK: identity\n"));
        assert!(prompt.ends_with(&format!("{}\n", IDENTITY_SCHEMA)));
        assert!(!prompt.contains("Context:"));
    }

    #[test]
    fn test_prompt_includes_context() {
        let prompt = PromptBuilder::new(CLINICAL_TASK, CLINICAL_INSTRUCTIONS, CLINICAL_SCHEMA)
            .context("Care setting", "emergency")
            .context("Acuity", "moderate")
            .build();
        assert!(prompt.contains("- Care setting: emergency\n"));
        assert!(prompt.contains("- Acuity: moderate\n"));
    }
}
