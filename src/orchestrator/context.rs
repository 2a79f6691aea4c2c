//! Prompt context assembly and post-processing of model output.

use serde::Serialize;
use serde_json::{Map, Value};

use super::{AnalysisOptions, NormalizedTicket, TicketFieldDef};

/// Field definitions listed in the prompt; the rest are dropped.
pub const MAX_SUMMARIZED_FIELDS: usize = 30;

const NO_SUBJECT: &str = "(no subject)";
const NO_DESCRIPTION: &str = "(no description)";
const NO_FIELD_SCHEMA: &str = "(no field schema)";

/// Variables available to the analysis prompt template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptContext {
    /// Ticket identifier.
    pub ticket_id: String,
    /// Subject, or a placeholder.
    pub subject: String,
    /// Description, or a placeholder.
    pub description: String,
    /// Conversation entries as received.
    pub conversations: Vec<Value>,
    /// Current custom field values.
    pub custom_fields: Map<String, Value>,
    /// Output of [`summarize_fields`].
    pub ticket_fields_summary: String,
    /// Retrieved similar cases.
    pub similar_cases: Vec<Value>,
    /// Retrieved knowledge base articles.
    pub kb_articles: Vec<Value>,
    /// Whether evidence citations are requested.
    pub include_evidence: bool,
    /// Requested tone.
    pub response_tone: String,
}

impl PromptContext {
    /// Build the context for `ticket`, substituting placeholders for empty text.
    pub fn build(
        ticket: &NormalizedTicket,
        options: &AnalysisOptions,
        similar_cases: Vec<Value>,
        kb_articles: Vec<Value>,
    ) -> Self {
        Self {
            ticket_id: ticket.ticket_id.clone(),
            subject: non_empty_or(&ticket.subject, NO_SUBJECT),
            description: non_empty_or(ticket.effective_description(), NO_DESCRIPTION),
            conversations: ticket.conversations.clone(),
            custom_fields: ticket.custom_fields.clone(),
            ticket_fields_summary: summarize_fields(&ticket.ticket_fields),
            similar_cases,
            kb_articles,
            include_evidence: options.include_evidence,
            response_tone: options.response_tone.clone(),
        }
    }

    /// Similar cases plus KB articles.
    pub fn retrieval_count(&self) -> usize {
        self.similar_cases.len() + self.kb_articles.len()
    }
}

fn non_empty_or(text: &str, placeholder: &str) -> String {
    if text.trim().is_empty() {
        placeholder.to_string()
    } else {
        text.to_string()
    }
}

/// One `- name (label): type` line per field, capped at [`MAX_SUMMARIZED_FIELDS`].
pub fn summarize_fields(fields: &[TicketFieldDef]) -> String {
    if fields.is_empty() {
        return NO_FIELD_SCHEMA.to_string();
    }

    fields
        .iter()
        .take(MAX_SUMMARIZED_FIELDS)
        .map(|f| {
            format!(
                "- {} ({}): {}",
                f.name,
                f.display_label(),
                f.field_type.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep only proposals whose `field_name` is in `selected`.
///
/// An empty allow-list keeps everything. A missing or malformed
/// `field_proposals` becomes an empty list once a filter applies.
pub fn filter_field_proposals(analysis: &mut Map<String, Value>, selected: &[String]) {
    if selected.is_empty() {
        return;
    }

    let kept: Vec<Value> = match analysis.remove("field_proposals") {
        Some(Value::Array(proposals)) => proposals
            .into_iter()
            .filter(|p| {
                p.get("field_name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| selected.iter().any(|s| s == name))
            })
            .collect(),
        _ => Vec::new(),
    };
    analysis.insert("field_proposals".to_string(), Value::Array(kept));
}
