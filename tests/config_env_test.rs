//! Config environment variable tests
//!
//! These tests verify that Config::from_env() reads provider, routing,
//! database, logging and registry settings from the environment.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use serial_test::serial;
use std::env;

use ticket_analysis::config::{Config, LogFormat};
use ticket_analysis::error::AppError;
use ticket_analysis::llm::{LlmGateway, ProviderKind};

const VARS: &[&str] = &[
    "LLM_PROVIDER",
    "DEEPSEEK_API_KEY",
    "DEEPSEEK_BASE_URL",
    "DEEPSEEK_MODEL",
    "OPENAI_API_KEY",
    "OPENAI_BASE_URL",
    "OPENAI_MODEL",
    "LLM_LOCAL_ENABLED",
    "LLM_LOCAL_BASE_URL",
    "LLM_LOCAL_MODEL",
    "LLM_LOCAL_API_KEY",
    "LLM_LOCAL_PURPOSES",
    "LLM_LOCAL_TIMEOUT_MS",
    "LLM_CLOUD_TIMEOUT_MS_FIELDS_ONLY",
    "DATABASE_PATH",
    "DATABASE_MAX_CONNECTIONS",
    "LOG_LEVEL",
    "LOG_FORMAT",
    "REQUEST_TIMEOUT_MS",
    "PROMPTS_DIR",
    "SCHEMAS_DIR",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_missing_primary_key_is_config_error() {
    clear_env();

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, AppError::Config { .. }));
    assert!(err.to_string().contains("DEEPSEEK_API_KEY"));
}

#[test]
#[serial]
fn test_defaults_with_deepseek_key() {
    clear_env();
    env::set_var("DEEPSEEK_API_KEY", "sk-test");

    let config = Config::from_env().unwrap();
    assert_eq!(config.llm.primary, ProviderKind::Deepseek);
    assert_eq!(config.llm.deepseek.base_url, "https://api.deepseek.com");
    assert_eq!(config.llm.deepseek.model, "deepseek-chat");
    assert!(config.llm.local.is_none());
    assert!(config.llm.local_purposes.is_empty());
    assert_eq!(config.database.path.to_str().unwrap(), "./data/analysis.db");
    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert_eq!(config.request.timeout_ms, 60000);
    assert_eq!(config.registry.prompts_dir.to_str().unwrap(), "./prompts");

    clear_env();
}

#[test]
#[serial]
fn test_openai_primary() {
    clear_env();
    env::set_var("LLM_PROVIDER", "openai");
    env::set_var("OPENAI_API_KEY", "sk-openai");
    env::set_var("OPENAI_MODEL", "gpt-4o");

    let config = Config::from_env().unwrap();
    assert_eq!(config.llm.primary, ProviderKind::OpenAi);
    assert_eq!(config.llm.openai.model, "gpt-4o");
    assert!(config.llm.deepseek.api_key.is_none());

    let gateway = LlmGateway::from_config(&config.llm, &config.request).unwrap();
    assert_eq!(gateway.registered_providers(), vec![ProviderKind::OpenAi]);
    assert_eq!(gateway.routes().default_route(), &[ProviderKind::OpenAi]);

    clear_env();
}

#[test]
#[serial]
fn test_local_primary_rejected() {
    clear_env();
    env::set_var("LLM_PROVIDER", "local");

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("cloud provider"));
}

#[test]
#[serial]
fn test_unknown_provider_rejected() {
    clear_env();
    env::set_var("LLM_PROVIDER", "gemini");

    assert!(matches!(
        Config::from_env().unwrap_err(),
        AppError::Config { .. }
    ));
    clear_env();
}

#[test]
#[serial]
fn test_local_provider_routes() {
    clear_env();
    env::set_var("DEEPSEEK_API_KEY", "sk-test");
    env::set_var("LLM_LOCAL_ENABLED", "true");
    env::set_var("LLM_LOCAL_BASE_URL", "http://localhost:11434/v1");
    env::set_var("LLM_LOCAL_MODEL", "qwen2.5");
    env::set_var("LLM_LOCAL_PURPOSES", "propose_fields_only, summarize");
    env::set_var("LLM_LOCAL_TIMEOUT_MS", "4000");
    env::set_var("LLM_CLOUD_TIMEOUT_MS_FIELDS_ONLY", "9000");

    let config = Config::from_env().unwrap();
    let local = config.llm.local.as_ref().unwrap();
    assert_eq!(local.model, "qwen2.5");
    assert_eq!(
        config.llm.local_purposes,
        vec!["propose_fields_only".to_string(), "summarize".to_string()]
    );
    assert_eq!(config.llm.local_timeout_ms, Some(4000));
    assert_eq!(config.llm.cloud_timeout_ms_fields_only, Some(9000));

    let gateway = LlmGateway::from_config(&config.llm, &config.request).unwrap();
    assert_eq!(
        gateway.routes().resolve("summarize"),
        &[ProviderKind::Local, ProviderKind::Deepseek]
    );
    assert_eq!(
        gateway.routes().resolve("analyze_ticket_cot"),
        &[ProviderKind::Deepseek]
    );

    clear_env();
}

#[test]
#[serial]
fn test_local_requires_enable_flag() {
    clear_env();
    env::set_var("DEEPSEEK_API_KEY", "sk-test");
    env::set_var("LLM_LOCAL_BASE_URL", "http://localhost:11434/v1");
    env::set_var("LLM_LOCAL_MODEL", "qwen2.5");

    let config = Config::from_env().unwrap();
    assert!(config.llm.local.is_none());

    clear_env();
}

#[test]
#[serial]
fn test_custom_database_logging_and_dirs() {
    clear_env();
    env::set_var("DEEPSEEK_API_KEY", "sk-test");
    env::set_var("DATABASE_PATH", "/custom/path.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");
    env::set_var("LOG_FORMAT", "json");
    env::set_var("LOG_LEVEL", "debug");
    env::set_var("REQUEST_TIMEOUT_MS", "15000");
    env::set_var("PROMPTS_DIR", "/etc/prompts");
    env::set_var("SCHEMAS_DIR", "/etc/schemas");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/path.db");
    assert_eq!(config.database.max_connections, 10);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.request.timeout_ms, 15000);
    assert_eq!(config.registry.prompts_dir.to_str().unwrap(), "/etc/prompts");
    assert_eq!(config.registry.schemas_dir.to_str().unwrap(), "/etc/schemas");

    clear_env();
}
