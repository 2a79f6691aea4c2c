//! Command-line driver over the analysis pipeline.
//!
//! Wires the orchestrator from [`Config`] so runs can be exercised without
//! the HTTP layer. Every command prints JSON to stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::llm::LlmGateway;
use crate::orchestrator::{AnalysisOptions, NormalizedTicket, TicketAnalysisOrchestrator, PROMPT_ID};
use crate::persistence::{AnalysisPersistence, DEFAULT_HISTORY_LIMIT};
use crate::prompts::PromptRegistry;
use crate::schema::SchemaValidator;
use crate::storage::SqliteStorage;

/// Schema applied to `analyze` input when the prompt names none.
pub const DEFAULT_INPUT_SCHEMA: &str = "ticket_normalized_v1";

/// Ticket analysis subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Analyze one normalized ticket read from a JSON file
    Analyze {
        /// Tenant the ticket belongs to
        #[arg(long)]
        tenant: String,

        /// Path to the normalized ticket JSON
        #[arg(long)]
        input: PathBuf,

        /// Minimum confidence for the EDIT gate (never below 0.7)
        #[arg(long, default_value_t = 0.7)]
        threshold: f64,

        /// Only keep proposals for this field (repeatable)
        #[arg(long = "field")]
        fields: Vec<String>,

        /// Response tone requested from the model
        #[arg(long, default_value = "formal")]
        tone: String,

        /// Do not consult the retrieval source
        #[arg(long)]
        skip_retrieval: bool,
    },

    /// Show recent analysis runs for a ticket
    History {
        /// Tenant the ticket belongs to
        #[arg(long)]
        tenant: String,

        /// Ticket identifier
        #[arg(long)]
        ticket: String,

        /// Maximum number of runs to show
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },

    /// Show a stored analysis result
    Show {
        /// Tenant the analysis belongs to
        #[arg(long)]
        tenant: String,

        /// Analysis identifier
        #[arg(long)]
        id: String,
    },

    /// List prompts in the registry
    Prompts,
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Shared components for command execution.
pub struct CliContext {
    /// Prompt registry.
    pub prompts: Arc<PromptRegistry>,
    /// Schema validator used for input and output checks.
    pub validator: Arc<SchemaValidator>,
    /// Analysis pipeline.
    pub orchestrator: TicketAnalysisOrchestrator,
}

impl CliContext {
    /// Open storage and build the gateway and orchestrator from configuration.
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        let storage = SqliteStorage::new(&config.database).await?;
        info!(path = %config.database.path.display(), "Database initialized");

        let gateway = LlmGateway::from_config(&config.llm, &config.request)?;

        let prompts = Arc::new(PromptRegistry::new(&config.registry.prompts_dir));
        let validator = Arc::new(SchemaValidator::new(&config.registry.schemas_dir));
        let orchestrator = TicketAnalysisOrchestrator::new(
            Arc::clone(&prompts),
            Arc::new(gateway),
            AnalysisPersistence::new(Arc::new(storage)),
        )
        .with_output_validator(Arc::clone(&validator));

        Ok(Self {
            prompts,
            validator,
            orchestrator,
        })
    }
}

/// Execute a CLI command.
pub async fn execute_command(command: Commands, ctx: &CliContext) -> CliResult {
    match command {
        Commands::Analyze {
            tenant,
            input,
            threshold,
            fields,
            tone,
            skip_retrieval,
        } => {
            let options = AnalysisOptions {
                skip_retrieval,
                include_evidence: true,
                confidence_threshold: threshold,
                selected_fields: (!fields.is_empty()).then_some(fields),
                response_tone: tone,
            };
            execute_analyze(ctx, &tenant, &input, &options).await
        }
        Commands::History {
            tenant,
            ticket,
            limit,
        } => {
            let runs = ctx.orchestrator.history(&tenant, &ticket, limit).await;
            render_json(&runs)
        }
        Commands::Show { tenant, id } => match ctx.orchestrator.get_analysis(&id, &tenant).await {
            Some(record) => render_json(&record),
            None => CliResult::error(format!("Analysis not found: {}", id)),
        },
        Commands::Prompts => execute_prompts(&ctx.prompts),
    }
}

async fn execute_analyze(
    ctx: &CliContext,
    tenant: &str,
    input: &Path,
    options: &AnalysisOptions,
) -> CliResult {
    let ticket = match load_ticket(ctx, input) {
        Ok(ticket) => ticket,
        Err(e) => return CliResult::error(e.to_string()),
    };

    let result = ctx
        .orchestrator
        .run_ticket_analysis(&ticket, options, tenant)
        .await;

    let mut output = render_json(&result);
    if !result.success {
        output.exit_code = 1;
    }
    output
}

/// Read, schema-check and deserialize the ticket before any LLM call.
fn load_ticket(ctx: &CliContext, input: &Path) -> AppResult<NormalizedTicket> {
    let text = std::fs::read_to_string(input).map_err(|e| AppError::Internal {
        message: format!("Failed to read {}: {}", input.display(), e),
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|e| AppError::Internal {
        message: format!("Input is not valid JSON: {}", e),
    })?;

    let schema = ctx
        .prompts
        .load(PROMPT_ID)?
        .input_schema
        .clone()
        .unwrap_or_else(|| DEFAULT_INPUT_SCHEMA.to_string());
    ctx.validator.validate_or_fail(&schema, &value)?;

    serde_json::from_value(value).map_err(|e| AppError::Internal {
        message: format!("Input does not match the normalized ticket shape: {}", e),
    })
}

fn execute_prompts(prompts: &PromptRegistry) -> CliResult {
    let ids = match prompts.list_prompt_ids() {
        Ok(ids) => ids,
        Err(e) => return CliResult::error(e.to_string()),
    };

    let mut listing = Vec::with_capacity(ids.len());
    for id in ids {
        let entry = match prompts.load(&id) {
            Ok(spec) => serde_json::json!({
                "id": spec.id,
                "version": spec.version,
                "purpose": spec.purpose,
                "description": spec.description,
            }),
            Err(e) => serde_json::json!({ "id": id, "error": e.to_string() }),
        };
        listing.push(entry);
    }
    render_json(&listing)
}

fn render_json<T: Serialize>(value: &T) -> CliResult {
    match serde_json::to_string_pretty(value) {
        Ok(text) => CliResult::success(text),
        Err(e) => CliResult::error(format!("Failed to serialize output: {}", e)),
    }
}
