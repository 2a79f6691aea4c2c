use std::env;
use std::path::PathBuf;

use crate::error::AppError;
use crate::llm::ProviderKind;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Provider and routing settings.
    pub llm: LlmConfig,
    /// Audit store settings.
    pub database: DatabaseConfig,
    /// Log level and format.
    pub logging: LoggingConfig,
    /// HTTP client settings.
    pub request: RequestConfig,
    /// Prompt and schema directories.
    pub registry: RegistryConfig,
}

/// LLM provider and routing configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Cloud provider that heads every default route.
    pub primary: ProviderKind,
    /// DeepSeek endpoint.
    pub deepseek: ProviderConfig,
    /// OpenAI endpoint.
    pub openai: ProviderConfig,
    /// Local OpenAI-compatible server, only set when enabled and complete.
    pub local: Option<ProviderConfig>,
    /// Purposes routed local-first when the local provider is enabled.
    pub local_purposes: Vec<String>,
    /// Hard timeout for local provider calls.
    pub local_timeout_ms: Option<u64>,
    /// Hard timeout for cloud calls on the fields-only purpose.
    pub cloud_timeout_ms_fields_only: Option<u64>,
}

/// Connection settings for one OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Bearer token, absent for unauthenticated local servers.
    pub api_key: Option<String>,
    /// Base URL without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite file path.
    pub path: PathBuf,
    /// Pool size.
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Client-wide request timeout.
    pub timeout_ms: u64,
}

/// Locations of prompt templates and JSON schemas
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directory of `<prompt_id>.yaml` files.
    pub prompts_dir: PathBuf,
    /// Directory of `<name>.json` schemas.
    pub schemas_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let primary_name = env::var("LLM_PROVIDER").unwrap_or_else(|_| "deepseek".to_string());
        let primary: ProviderKind = primary_name.parse().map_err(|e| AppError::Config {
            message: format!("LLM_PROVIDER: {}", e),
        })?;
        if primary == ProviderKind::Local {
            return Err(AppError::Config {
                message: "LLM_PROVIDER must be a cloud provider (deepseek or openai)".to_string(),
            });
        }

        let deepseek = ProviderConfig {
            api_key: env::var("DEEPSEEK_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: env::var("DEEPSEEK_BASE_URL")
                .unwrap_or_else(|_| "https://api.deepseek.com".to_string()),
            model: env::var("DEEPSEEK_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string()),
        };

        let openai = ProviderConfig {
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        };

        let primary_config = match primary {
            ProviderKind::OpenAi => &openai,
            _ => &deepseek,
        };
        if primary_config.api_key.is_none() {
            return Err(AppError::Config {
                message: format!(
                    "{}_API_KEY is required for LLM_PROVIDER={}",
                    primary.as_str().to_uppercase(),
                    primary
                ),
            });
        }

        let local_enabled = env::var("LLM_LOCAL_ENABLED")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let local = match (
            local_enabled,
            env::var("LLM_LOCAL_BASE_URL").ok().filter(|v| !v.is_empty()),
            env::var("LLM_LOCAL_MODEL").ok().filter(|v| !v.is_empty()),
        ) {
            (true, Some(base_url), Some(model)) => Some(ProviderConfig {
                api_key: env::var("LLM_LOCAL_API_KEY").ok().filter(|k| !k.is_empty()),
                base_url,
                model,
            }),
            _ => None,
        };

        let llm = LlmConfig {
            primary,
            deepseek,
            openai,
            local,
            local_purposes: env::var("LLM_LOCAL_PURPOSES")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            local_timeout_ms: env::var("LLM_LOCAL_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok()),
            cloud_timeout_ms_fields_only: env::var("LLM_CLOUD_TIMEOUT_MS_FIELDS_ONLY")
                .ok()
                .and_then(|s| s.parse().ok()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/analysis.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60000),
        };

        let registry = RegistryConfig {
            prompts_dir: PathBuf::from(
                env::var("PROMPTS_DIR").unwrap_or_else(|_| "./prompts".to_string()),
            ),
            schemas_dir: PathBuf::from(
                env::var("SCHEMAS_DIR").unwrap_or_else(|_| "./schemas".to_string()),
            ),
        };

        Ok(Config {
            llm,
            database,
            logging,
            request,
            registry,
        })
    }
}

/// Split a comma-separated env value, dropping blanks.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 60000 }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            prompts_dir: PathBuf::from("./prompts"),
            schemas_dir: PathBuf::from("./schemas"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list("propose_fields_only, filter_query ,,"),
            vec!["propose_fields_only", "filter_query"]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_request_config_default() {
        assert_eq!(RequestConfig::default().timeout_ms, 60000);
    }
}
