//! Ticket analysis pipeline.
//!
//! ```text
//! ticket → prompt context → render → LlmGateway → json_repair → gate
//!        → field filter → meta → persistence → AnalysisResult
//! ```
//!
//! [`TicketAnalysisOrchestrator::run_ticket_analysis`] never returns an
//! error: every failure becomes a `success = false` result gated TEACH and a
//! `failed` run row.

mod context;
mod gate;
mod retrieval;
mod types;

pub use context::{filter_field_proposals, summarize_fields, PromptContext, MAX_SUMMARIZED_FIELDS};
pub use gate::{Gate, GATE_CONFIRM_THRESHOLD, GATE_DECIDE_THRESHOLD, GATE_EDIT_THRESHOLD};
pub use retrieval::{RetrievalSource, StaticRetrieval};
pub use types::{
    confidence_of, AnalysisMeta, AnalysisOptions, AnalysisResult, NormalizedTicket, TicketFieldDef,
    TokenUsage,
};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::json_repair;
use crate::llm::{LlmGateway, LlmRequest};
use crate::persistence::AnalysisPersistence;
use crate::prompts::PromptRegistry;
use crate::schema::SchemaValidator;
use crate::storage::{AnalysisRecord, AnalysisRun};

/// Prompt driving the analysis.
pub const PROMPT_ID: &str = "ticket_analysis_cot_v1";
/// Gateway purpose for analysis calls.
pub const PURPOSE_ANALYZE_TICKET: &str = "analyze_ticket_cot";

/// Successful pipeline output before persistence.
struct Outcome {
    analysis: Map<String, Value>,
    gate: Gate,
    meta: AnalysisMeta,
    output_schema: Option<String>,
}

/// Composes prompt registry, gateway, repair, gate policy and persistence.
pub struct TicketAnalysisOrchestrator {
    prompts: Arc<PromptRegistry>,
    gateway: Arc<LlmGateway>,
    persistence: AnalysisPersistence,
    validator: Option<Arc<SchemaValidator>>,
    retrieval: Option<Arc<dyn RetrievalSource>>,
}

impl TicketAnalysisOrchestrator {
    /// Create an orchestrator with no output validation and no retrieval
    pub fn new(
        prompts: Arc<PromptRegistry>,
        gateway: Arc<LlmGateway>,
        persistence: AnalysisPersistence,
    ) -> Self {
        Self {
            prompts,
            gateway,
            persistence,
            validator: None,
            retrieval: None,
        }
    }

    /// Soft-check results against the prompt's output schema
    pub fn with_output_validator(mut self, validator: Arc<SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Supply similar cases and KB articles to the prompt
    pub fn with_retrieval(mut self, retrieval: Arc<dyn RetrievalSource>) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    /// Persistence handle
    pub fn persistence(&self) -> &AnalysisPersistence {
        &self.persistence
    }

    /// Run the full pipeline for one ticket.
    pub async fn run_ticket_analysis(
        &self,
        ticket: &NormalizedTicket,
        options: &AnalysisOptions,
        tenant_id: &str,
    ) -> AnalysisResult {
        let analysis_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        info!(
            analysis_id = %analysis_id,
            tenant_id,
            ticket_id = %ticket.ticket_id,
            "Ticket analysis started"
        );

        let run = AnalysisRun::running(&analysis_id, tenant_id, &ticket.ticket_id);
        self.persistence.save_run(&run).await;

        match self.execute(ticket, options, tenant_id, start).await {
            Ok(outcome) => self.finish_success(analysis_id, run, outcome).await,
            Err(e) => {
                let latency_ms = elapsed_ms(start);
                let message = e.to_string();
                error!(
                    analysis_id = %analysis_id,
                    ticket_id = %ticket.ticket_id,
                    error = %message,
                    latency_ms,
                    "Ticket analysis failed"
                );

                let failed = run.failed(&message, json!({ "latency_ms": latency_ms }));
                self.persistence.save_run(&failed).await;

                AnalysisResult {
                    analysis_id,
                    analysis: Map::new(),
                    gate: Gate::Teach,
                    meta: AnalysisMeta::failure(PROMPT_ID, latency_ms, &message),
                    success: false,
                    error: Some(message),
                }
            }
        }
    }

    /// Recent runs for a ticket, newest first.
    pub async fn history(&self, tenant_id: &str, ticket_id: &str, limit: u32) -> Vec<AnalysisRun> {
        self.persistence.history(tenant_id, ticket_id, limit).await
    }

    /// A stored analysis, scoped to its tenant.
    pub async fn get_analysis(&self, analysis_id: &str, tenant_id: &str) -> Option<AnalysisRecord> {
        self.persistence.get_analysis(analysis_id, tenant_id).await
    }

    async fn execute(
        &self,
        ticket: &NormalizedTicket,
        options: &AnalysisOptions,
        tenant_id: &str,
        start: Instant,
    ) -> AppResult<Outcome> {
        let prompt = self.prompts.load(PROMPT_ID)?;

        let (similar_cases, kb_articles) = self.retrieve(ticket, options, tenant_id).await;
        let context = PromptContext::build(ticket, options, similar_cases, kb_articles);
        let (system_prompt, user_prompt) = prompt.render(&context)?;

        let request = LlmRequest::new(PURPOSE_ANALYZE_TICKET, system_prompt, user_prompt)
            .with_temperature(prompt.temperature())
            .with_json_mode(prompt.json_mode())
            .with_max_tokens(prompt.max_tokens());

        let response = self.gateway.generate(&request, None).await?;

        let mut analysis = json_repair::try_parse(&response.content)
            .map_err(|message| AppError::Parse { message })?;

        let confidence = confidence_of(&analysis);
        let gate = Gate::from_confidence(confidence, options.confidence_threshold);
        debug!(confidence, gate = %gate, "Gate computed");

        if let Some(selected) = options.selected_fields.as_deref() {
            filter_field_proposals(&mut analysis, selected);
        }

        let meta = AnalysisMeta {
            llm_provider: response.provider,
            llm_model: response.model,
            prompt_version: PROMPT_ID.to_string(),
            latency_ms: elapsed_ms(start),
            token_usage: TokenUsage::default(),
            retrieval_count: context.retrieval_count(),
            created_at: Utc::now().to_rfc3339(),
            used_fallback: response.used_fallback,
            attempts: response.attempts,
            output_schema_valid: None,
            error: None,
        };

        Ok(Outcome {
            analysis,
            gate,
            meta,
            output_schema: prompt.output_schema.clone(),
        })
    }

    async fn finish_success(
        &self,
        analysis_id: String,
        run: AnalysisRun,
        outcome: Outcome,
    ) -> AnalysisResult {
        let mut result = AnalysisResult {
            analysis_id,
            analysis: outcome.analysis,
            gate: outcome.gate,
            meta: outcome.meta,
            success: true,
            error: None,
        };

        if let (Some(validator), Some(schema)) = (&self.validator, outcome.output_schema.as_deref()) {
            let valid = match serde_json::to_value(&result) {
                Ok(value) => validator.validate_soft(schema, &value),
                Err(e) => {
                    warn!(error = %e, "Result not serializable for validation");
                    false
                }
            };
            result.meta.output_schema_valid = Some(valid);
        }

        let meta = serde_json::to_value(&result.meta).unwrap_or_else(|_| json!({}));
        let completed = run.completed(result.gate, meta);
        self.persistence.save_run(&completed).await;

        let record = AnalysisRecord::from_analysis(
            &result.analysis_id,
            &completed.tenant_id,
            &completed.ticket_id,
            &result.analysis,
        );
        self.persistence.save_result(&record).await;

        info!(
            analysis_id = %result.analysis_id,
            gate = %result.gate,
            oversight = result.gate.oversight_level(),
            confidence = result.confidence(),
            provider = %result.meta.llm_provider,
            latency_ms = result.meta.latency_ms,
            "Ticket analysis completed"
        );

        result
    }

    /// Retrieval is enrichment only; failures degrade to empty context.
    async fn retrieve(
        &self,
        ticket: &NormalizedTicket,
        options: &AnalysisOptions,
        tenant_id: &str,
    ) -> (Vec<Value>, Vec<Value>) {
        let Some(retrieval) = self.retrieval.as_ref().filter(|_| !options.skip_retrieval) else {
            return (Vec::new(), Vec::new());
        };

        let similar_cases = retrieval
            .similar_cases(tenant_id, ticket)
            .await
            .unwrap_or_else(|e| {
                warn!(ticket_id = %ticket.ticket_id, error = %e, "Similar case retrieval failed");
                Vec::new()
            });
        let kb_articles = retrieval
            .kb_articles(tenant_id, ticket)
            .await
            .unwrap_or_else(|e| {
                warn!(ticket_id = %ticket.ticket_id, error = %e, "KB retrieval failed");
                Vec::new()
            });

        (similar_cases, kb_articles)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
