use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to parse LLM response: {message}")]
    Parse { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Prompt registry errors
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt not found: {prompt_id} at {}", .path.display())]
    NotFound { prompt_id: String, path: PathBuf },

    #[error("Failed to parse prompt {prompt_id}: {message}")]
    Parse { prompt_id: String, message: String },

    #[error("Prompt {prompt_id} missing required field: {field}")]
    MissingField { prompt_id: String, field: String },

    #[error("Failed to render prompt template {prompt_id}: {source}")]
    Render {
        prompt_id: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("Failed to read prompt registry: {0}")]
    Io(#[from] std::io::Error),
}

/// Raised when LLM output cannot be coerced into JSON.
///
/// Keeps the untouched input so callers can log what the model actually said.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RepairError {
    /// What went wrong.
    pub message: String,
    /// Input as received, before any repair pass.
    pub original_text: String,
}

impl RepairError {
    /// Create a repair error
    pub fn new(message: impl Into<String>, original_text: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            original_text: original_text.into(),
        }
    }
}

/// LLM gateway and provider errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Timeout provider={provider} purpose={purpose} after {timeout_ms}ms")]
    Timeout {
        provider: String,
        purpose: String,
        timeout_ms: u64,
    },

    #[error("Unknown provider: {provider}")]
    UnknownProvider { provider: String },

    #[error("No providers in route for purpose: {purpose}")]
    EmptyRoute { purpose: String },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LlmError {
    /// True when the provider was abandoned because it exceeded its timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Timeout { .. })
    }
}

/// JSON Schema loading and validation errors
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema not found: {schema} at {}", .path.display())]
    NotFound { schema: String, path: PathBuf },

    #[error("Failed to parse schema {schema}: {message}")]
    Malformed { schema: String, message: String },

    #[error("Input validation failed against {schema}: {}", .errors.join("; "))]
    Invalid { schema: String, errors: Vec<String> },
}

impl SchemaError {
    /// Stable machine-readable error code.
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaError::NotFound { .. } => "SCHEMA_NOT_FOUND",
            SchemaError::Malformed { .. } => "SCHEMA_PARSE_ERROR",
            SchemaError::Invalid { .. } => "INVALID_INPUT_SCHEMA",
        }
    }

    /// Schema problems are service misconfiguration; validation failures are
    /// caller or model errors.
    pub fn is_misconfiguration(&self) -> bool {
        !matches!(self, SchemaError::Invalid { .. })
    }
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for prompt registry operations
pub type PromptResult<T> = Result<T, PromptError>;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Result type alias for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
