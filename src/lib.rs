//! # Ticket Analysis
//!
//! Orchestrates LLM analysis of helpdesk tickets: a versioned prompt is
//! rendered against a normalized ticket, sent through a gateway that falls
//! back across providers, repaired into JSON, gated by confidence and
//! recorded in an audit trail.
//!
//! ## Architecture
//!
//! ```text
//! NormalizedTicket → Orchestrator → PromptRegistry (YAML + Jinja)
//!                         ↓
//!                    LlmGateway → DeepSeek / OpenAI / local (HTTP)
//!                         ↓
//!                    json_repair → Gate → SQLite (runs, results)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ticket_analysis::{
//!     AnalysisOptions, AnalysisPersistence, Config, LlmGateway, NormalizedTicket,
//!     PromptRegistry, SqliteStorage, TicketAnalysisOrchestrator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let gateway = LlmGateway::from_config(&config.llm, &config.request)?;
//!     let orchestrator = TicketAnalysisOrchestrator::new(
//!         Arc::new(PromptRegistry::new(&config.registry.prompts_dir)),
//!         Arc::new(gateway),
//!         AnalysisPersistence::new(Arc::new(storage)),
//!     );
//!
//!     let ticket = NormalizedTicket::new("1042").with_subject("Cannot log in");
//!     let result = orchestrator
//!         .run_ticket_analysis(&ticket, &AnalysisOptions::default(), "acme")
//!         .await;
//!     println!("{} {}", result.gate, result.success);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Command-line driver.
pub mod cli;
/// Configuration loaded from the environment.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Repair of malformed LLM JSON output.
pub mod json_repair;
/// LLM providers and the fallback gateway.
pub mod llm;
/// Ticket analysis pipeline and gate policy.
pub mod orchestrator;
/// Best-effort persistence wrapper.
pub mod persistence;
/// Versioned prompt registry.
pub mod prompts;
/// JSON Schema validation.
pub mod schema;
/// SQLite storage layer for runs and results.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use llm::LlmGateway;
pub use orchestrator::{
    AnalysisOptions, AnalysisResult, Gate, NormalizedTicket, TicketAnalysisOrchestrator,
};
pub use persistence::AnalysisPersistence;
pub use prompts::PromptRegistry;
pub use storage::SqliteStorage;
