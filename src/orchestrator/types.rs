use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Gate;

/// Canonical ticket representation produced by the ticket normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTicket {
    /// Helpdesk ticket identifier.
    pub ticket_id: String,
    /// Ticket subject line.
    #[serde(default)]
    pub subject: String,
    /// Plain-text description.
    #[serde(default)]
    pub description: String,
    /// Legacy key some normalizers still emit instead of `description`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_text: Option<String>,
    /// Conversation entries in helpdesk order.
    #[serde(default)]
    pub conversations: Vec<Value>,
    /// Current custom field values.
    #[serde(default)]
    pub custom_fields: Map<String, Value>,
    /// Field definitions the analysis may propose values for.
    #[serde(default)]
    pub ticket_fields: Vec<TicketFieldDef>,
}

impl NormalizedTicket {
    /// Create a ticket with only an id
    pub fn new(ticket_id: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            ..Default::default()
        }
    }

    /// Set the subject
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a conversation entry
    pub fn with_conversation(mut self, entry: Value) -> Self {
        self.conversations.push(entry);
        self
    }

    /// Add a field definition
    pub fn with_field(mut self, field: TicketFieldDef) -> Self {
        self.ticket_fields.push(field);
        self
    }

    /// `description`, falling back to the legacy `description_text`.
    pub fn effective_description(&self) -> &str {
        if !self.description.is_empty() {
            return &self.description;
        }
        self.description_text.as_deref().unwrap_or("")
    }
}

/// A ticket field definition from the helpdesk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketFieldDef {
    /// Machine name, matched against `field_proposals[].field_name`.
    pub name: String,
    /// Agent-facing label.
    #[serde(default)]
    pub label: Option<String>,
    /// Customer-facing label, used when `label` is empty.
    #[serde(default)]
    pub label_for_customers: Option<String>,
    /// Helpdesk field type, e.g. `custom_dropdown`.
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
}

impl TicketFieldDef {
    /// Create a field definition
    pub fn new(name: impl Into<String>, label: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: Some(label.into()),
            label_for_customers: None,
            field_type: Some(field_type.into()),
        }
    }

    /// Best label available, possibly empty.
    pub fn display_label(&self) -> &str {
        self.label
            .as_deref()
            .filter(|l| !l.is_empty())
            .or(self.label_for_customers.as_deref())
            .unwrap_or("")
    }
}

/// Caller options for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Do not consult the retrieval source.
    pub skip_retrieval: bool,
    /// Ask the model to cite evidence.
    pub include_evidence: bool,
    /// Caller floor for the EDIT gate; never loosens it below 0.7.
    pub confidence_threshold: f64,
    /// Keep only proposals for these fields when non-empty.
    pub selected_fields: Option<Vec<String>>,
    /// Tone requested for customer-facing text.
    pub response_tone: String,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            skip_retrieval: false,
            include_evidence: true,
            confidence_threshold: 0.7,
            selected_fields: None,
            response_tone: "formal".to_string(),
        }
    }
}

/// Token counts; providers do not report them through the gateway yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input: u64,
    /// Completion tokens.
    pub output: u64,
}

/// Execution metadata attached to every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMeta {
    /// Provider that answered, `none` on failure.
    pub llm_provider: String,
    /// Model that answered, `none` on failure.
    pub llm_model: String,
    /// Prompt identifier used for the run.
    pub prompt_version: String,
    /// Wall-clock time since the pipeline started.
    pub latency_ms: u64,
    /// Token accounting.
    pub token_usage: TokenUsage,
    /// Similar cases plus KB articles supplied to the prompt.
    pub retrieval_count: usize,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Whether a fallback provider answered.
    pub used_fallback: bool,
    /// Route entries consumed.
    pub attempts: u32,
    /// Outcome of the soft output check, when a validator is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema_valid: Option<bool>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisMeta {
    /// Envelope for a failed run.
    pub fn failure(prompt_version: impl Into<String>, latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            llm_provider: "none".to_string(),
            llm_model: "none".to_string(),
            prompt_version: prompt_version.into(),
            latency_ms,
            token_usage: TokenUsage::default(),
            retrieval_count: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
            used_fallback: false,
            attempts: 0,
            output_schema_valid: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of one analysis run. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// UUID v4 shared with the persisted run.
    pub analysis_id: String,
    /// Parsed model output; empty on failure.
    pub analysis: Map<String, Value>,
    /// Oversight decision.
    pub gate: Gate,
    /// Execution metadata.
    pub meta: AnalysisMeta,
    /// Whether an analysis was produced.
    pub success: bool,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// Self-reported confidence, 0.0 when absent.
    pub fn confidence(&self) -> f64 {
        confidence_of(&self.analysis)
    }

    /// Proposals left after field filtering.
    pub fn field_proposals(&self) -> &[Value] {
        self.analysis
            .get("field_proposals")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Numeric `confidence` of an analysis object, 0.0 when absent or not a number.
pub fn confidence_of(analysis: &Map<String, Value>) -> f64 {
    analysis
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}
