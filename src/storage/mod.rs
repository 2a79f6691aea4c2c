//! Storage layer for the analysis audit trail.
//!
//! Two tables: `analysis_runs` holds one row per analysis attempt and its
//! lifecycle, `ticket_analyses` holds the payload of successful runs.

mod sqlite;


pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageResult;
use crate::orchestrator::Gate;

/// Lifecycle state of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Pipeline in progress.
    Running,
    /// Pipeline produced an analysis.
    Completed,
    /// Pipeline failed; see `error_message`.
    Failed,
}

impl RunStatus {
    /// Get the status as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    /// Completed and failed runs never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

/// Audit row for one analysis attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    /// Run identifier; equal to the analysis id.
    pub id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Analyzed ticket.
    pub ticket_id: String,
    /// Lifecycle state.
    pub status: RunStatus,
    /// Gate decision, set once the run finishes.
    pub gate: Option<Gate>,
    /// Execution metadata envelope.
    pub meta: Value,
    /// Failure description for failed runs.
    pub error_message: Option<String>,
    /// When the run started.
    pub created_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl AnalysisRun {
    /// Start a run in the `running` state
    pub fn running(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        ticket_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            ticket_id: ticket_id.into(),
            status: RunStatus::Running,
            gate: None,
            meta: Value::Object(Map::new()),
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Mark as completed with its gate and metadata
    pub fn completed(mut self, gate: Gate, meta: Value) -> Self {
        self.status = RunStatus::Completed;
        self.gate = Some(gate);
        self.meta = meta;
        self.completed_at = Some(Utc::now());
        self
    }

    /// Mark as failed with error
    pub fn failed(mut self, error: impl Into<String>, meta: Value) -> Self {
        self.status = RunStatus::Failed;
        self.gate = Some(Gate::Teach);
        self.meta = meta;
        self.error_message = Some(error.into());
        self.completed_at = Some(Utc::now());
        self
    }
}

/// Stored payload of a successful analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Record identifier; equal to the analysis id.
    pub id: String,
    /// Run this record belongs to.
    pub run_id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Analyzed ticket.
    pub ticket_id: String,
    /// Narrative summary text.
    pub narrative: String,
    /// Most likely root cause.
    pub root_cause: Option<String>,
    /// Resolution steps.
    pub resolution: Value,
    /// Self-reported confidence.
    pub confidence: f64,
    /// Classified intent.
    pub intent: Option<String>,
    /// Classified sentiment.
    pub sentiment: Option<String>,
    /// Questions the analysis could not answer.
    pub open_questions: Value,
    /// Risk labels.
    pub risk_tags: Value,
    /// Proposed field changes, after filtering.
    pub field_proposals: Value,
    /// Cited evidence.
    pub evidence: Value,
    /// Full analysis object as returned to the caller.
    pub analysis: Value,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// Extract the indexed columns from an analysis object.
    ///
    /// `narrative` may be an object with a `summary` or any other value,
    /// which is stringified.
    pub fn from_analysis(
        analysis_id: impl Into<String>,
        tenant_id: impl Into<String>,
        ticket_id: impl Into<String>,
        analysis: &Map<String, Value>,
    ) -> Self {
        let id = analysis_id.into();
        let list = |key: &str| {
            analysis
                .get(key)
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()))
        };
        let text = |key: &str| analysis.get(key).and_then(value_as_text);

        Self {
            run_id: id.clone(),
            id,
            tenant_id: tenant_id.into(),
            ticket_id: ticket_id.into(),
            narrative: narrative_text(analysis.get("narrative")),
            root_cause: text("root_cause"),
            resolution: list("resolution"),
            confidence: analysis
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            intent: text("intent"),
            sentiment: text("sentiment"),
            open_questions: list("open_questions"),
            risk_tags: list("risk_tags"),
            field_proposals: list("field_proposals"),
            evidence: list("evidence"),
            analysis: Value::Object(analysis.clone()),
            created_at: Utc::now(),
        }
    }
}

fn narrative_text(narrative: Option<&Value>) -> String {
    match narrative {
        None | Some(Value::Null) => String::new(),
        Some(Value::Object(obj)) => obj
            .get("summary")
            .and_then(value_as_text)
            .unwrap_or_default(),
        Some(other) => value_as_text(other).unwrap_or_default(),
    }
}

/// Strings verbatim, null as absent, everything else as compact JSON.
fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Storage trait for database operations
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert or update a run by id.
    ///
    /// A row that already reached a terminal status is left untouched and
    /// `Ok(false)` is returned; `created_at` of an existing row is kept.
    async fn upsert_run(&self, run: &AnalysisRun) -> StorageResult<bool>;
    /// Insert or replace a result record by id.
    async fn upsert_result(&self, record: &AnalysisRecord) -> StorageResult<()>;
    /// Get a run by ID.
    async fn get_run(&self, id: &str) -> StorageResult<Option<AnalysisRun>>;
    /// Most recent runs for a ticket, newest first.
    async fn get_runs_for_ticket(
        &self,
        tenant_id: &str,
        ticket_id: &str,
        limit: u32,
    ) -> StorageResult<Vec<AnalysisRun>>;
    /// Get a result record, scoped to its tenant.
    async fn get_result(&self, id: &str, tenant_id: &str)
        -> StorageResult<Option<AnalysisRecord>>;
}
