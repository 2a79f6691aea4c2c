//! Prompt registry and schema registry tests against real directories
//!
//! Covers the registry's file handling with temporary directories and checks
//! that the shipped prompt and schemas load and render.

use std::fs;
use std::path::PathBuf;

use serde_json::json;
use tempfile::tempdir;

use ticket_analysis::error::{PromptError, SchemaError};
use ticket_analysis::orchestrator::{
    AnalysisOptions, NormalizedTicket, PromptContext, TicketFieldDef, PROMPT_ID,
    PURPOSE_ANALYZE_TICKET,
};
use ticket_analysis::prompts::PromptRegistry;
use ticket_analysis::schema::SchemaValidator;

fn shipped(dir: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(dir)
}

const MINIMAL_PROMPT: &str = r#"
id: triage_v1
purpose: triage
system_prompt: "Triage assistant."
user_prompt_template: "Ticket {{ ticket_id }}"
"#;

// ============================================================================
// Registry file handling
// ============================================================================

#[cfg(test)]
mod registry_tests {
    use super::*;

    #[test]
    fn test_missing_prompt_is_not_found() {
        let dir = tempdir().unwrap();
        let registry = PromptRegistry::new(dir.path());

        match registry.load("nope_v1") {
            Err(PromptError::NotFound { prompt_id, path }) => {
                assert_eq!(prompt_id, "nope_v1");
                assert_eq!(path, dir.path().join("nope_v1.yaml"));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_list_prompt_ids_sorted_yaml_only() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("zeta_v1.yaml"), MINIMAL_PROMPT).unwrap();
        fs::write(dir.path().join("alpha_v2.yaml"), MINIMAL_PROMPT).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a prompt").unwrap();

        let registry = PromptRegistry::new(dir.path());
        assert_eq!(registry.list_prompt_ids().unwrap(), vec!["alpha_v2", "zeta_v1"]);
    }

    #[test]
    fn test_list_on_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let registry = PromptRegistry::new(dir.path().join("absent"));
        assert!(registry.list_prompt_ids().unwrap().is_empty());
    }

    #[test]
    fn test_load_is_cached_until_cleared() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("triage_v1.yaml");
        fs::write(&path, MINIMAL_PROMPT).unwrap();

        let registry = PromptRegistry::new(dir.path());
        let first = registry.load("triage_v1").unwrap();
        assert_eq!(first.system_prompt, "Triage assistant.");
        assert_eq!(registry.cached_count(), 1);

        fs::write(&path, MINIMAL_PROMPT.replace("Triage assistant.", "Edited.")).unwrap();
        let cached = registry.load("triage_v1").unwrap();
        assert_eq!(cached.system_prompt, "Triage assistant.");

        registry.clear_cache();
        assert_eq!(registry.cached_count(), 0);
        let reloaded = registry.load("triage_v1").unwrap();
        assert_eq!(reloaded.system_prompt, "Edited.");
    }

    #[test]
    fn test_missing_required_field_is_named() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("broken_v1.yaml"),
            "id: broken_v1\nsystem_prompt: hi\n",
        )
        .unwrap();

        let registry = PromptRegistry::new(dir.path());
        match registry.load("broken_v1") {
            Err(PromptError::MissingField { field, .. }) => {
                assert_eq!(field, "user_prompt_template")
            }
            other => panic!("expected MissingField, got {:?}", other),
        }
        assert_eq!(registry.cached_count(), 0);
    }
}

// ============================================================================
// Shipped prompt and schemas
// ============================================================================

#[cfg(test)]
mod shipped_tests {
    use super::*;

    #[test]
    fn test_shipped_prompt_metadata() {
        let registry = PromptRegistry::new(shipped("prompts"));
        assert!(registry.list_prompt_ids().unwrap().contains(&PROMPT_ID.to_string()));

        let spec = registry.load(PROMPT_ID).unwrap();
        assert_eq!(spec.id, PROMPT_ID);
        assert_eq!(spec.purpose, PURPOSE_ANALYZE_TICKET);
        assert_eq!(spec.max_tokens(), 2000);
        assert!(spec.json_mode());
        assert_eq!(spec.input_schema.as_deref(), Some("ticket_normalized_v1"));
        assert_eq!(spec.output_schema.as_deref(), Some("ticket_analysis_v1"));
        assert!(!spec.known_failure_modes.is_empty());
        assert!(!spec.eval_checks.is_empty());
    }

    #[test]
    fn test_shipped_prompt_renders_ticket() {
        let registry = PromptRegistry::new(shipped("prompts"));
        let spec = registry.load(PROMPT_ID).unwrap();

        let mut ticket = NormalizedTicket::new("T-7")
            .with_subject("Invoice charged twice")
            .with_description("My card shows two charges for March.")
            .with_conversation(json!({"incoming": false, "body": "Looking into it."}))
            .with_field(TicketFieldDef::new("cf_refund", "Refund needed", "custom_checkbox"));
        ticket
            .custom_fields
            .insert("cf_plan".to_string(), json!("pro"));

        let context = PromptContext::build(&ticket, &AnalysisOptions::default(), vec![], vec![]);
        let (system, user) = spec.render(&context).unwrap();

        assert!(system.contains("expert customer support analyst"));
        assert!(system.contains("formal tone"));
        assert!(system.contains("Cite evidence for every resolution step."));
        assert!(user.contains("Ticket #T-7"));
        assert!(user.contains("Subject: Invoice charged twice"));
        assert!(user.contains("My card shows two charges for March."));
        assert!(user.contains("Conversation (1 messages):"));
        assert!(user.contains("[agent] Looking into it."));
        assert!(user.contains("- cf_plan: pro"));
        assert!(user.contains("- cf_refund (Refund needed): custom_checkbox"));
        assert!(!user.contains("Similar resolved cases"));
        assert!(!user.contains("Knowledge base articles"));
    }

    #[test]
    fn test_shipped_input_schema() {
        let validator = SchemaValidator::new(shipped("schemas"));

        let ticket = json!({
            "ticket_id": "T-7",
            "subject": "Invoice charged twice",
            "ticket_fields": [{"name": "priority", "label": null, "type": "default_priority"}]
        });
        assert!(validator.validate_or_fail("ticket_normalized_v1", &ticket).is_ok());

        match validator.validate_or_fail("ticket_normalized_v1", &json!({"subject": 3})) {
            Err(SchemaError::Invalid { schema, errors }) => {
                assert_eq!(schema, "ticket_normalized_v1");
                assert!(!errors.is_empty());
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_shipped_output_schema_rejects_bad_gate() {
        let validator = SchemaValidator::new(shipped("schemas"));
        let result = json!({
            "analysis_id": "a1",
            "analysis": {"confidence": 0.4},
            "gate": "MAYBE",
            "meta": {
                "llm_provider": "deepseek",
                "llm_model": "deepseek-chat",
                "prompt_version": PROMPT_ID,
                "latency_ms": 10,
                "created_at": "2025-01-01T00:00:00Z"
            },
            "success": true
        });
        assert!(!validator.validate_soft("ticket_analysis_v1", &result));

        let mut fixed = result.clone();
        fixed["gate"] = json!("TEACH");
        assert!(validator.validate_soft("ticket_analysis_v1", &fixed));
    }
}
