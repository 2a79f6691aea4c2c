//! JSON Schema (Draft 7) validation against named schema files.
//!
//! Two modes:
//! - [`SchemaValidator::validate_or_fail`] rejects bad input before any LLM
//!   call is paid for.
//! - [`SchemaValidator::validate_soft`] only reports, for output sanity checks
//!   where an imperfect answer is still returned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use tracing::{error, warn};

use crate::error::{SchemaError, SchemaResult};

/// Maximum number of violations reported in one [`SchemaError::Invalid`].
pub const MAX_REPORTED_ERRORS: usize = 5;

/// Loads `<dir>/<name>.json` schemas on demand and caches them compiled.
pub struct SchemaValidator {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<JSONSchema>>>,
}

impl SchemaValidator {
    /// Create a validator over `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Schema directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load and compile a schema by name (cached after the first read).
    ///
    /// Unreadable JSON and structurally invalid schemas are both
    /// [`SchemaError::Malformed`].
    pub fn load(&self, name: &str) -> SchemaResult<Arc<JSONSchema>> {
        if let Some(compiled) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Ok(Arc::clone(compiled));
        }

        let path = self.dir.join(format!("{}.json", name));
        let text = std::fs::read_to_string(&path).map_err(|_| SchemaError::NotFound {
            schema: name.to_string(),
            path: path.clone(),
        })?;
        let schema: Value = serde_json::from_str(&text).map_err(|e| SchemaError::Malformed {
            schema: name.to_string(),
            message: e.to_string(),
        })?;
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .map_err(|e| SchemaError::Malformed {
                schema: name.to_string(),
                message: format!("Invalid JSON Schema: {}", e),
            })?;

        let compiled = Arc::new(compiled);
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Validate `obj`, failing with up to [`MAX_REPORTED_ERRORS`] messages.
    pub fn validate_or_fail(&self, name: &str, obj: &Value) -> SchemaResult<()> {
        let schema = self.load(name).map_err(|e| {
            error!(schema = name, error = %e, "Schema loading error");
            e
        })?;

        let errors = violations(&schema, obj);
        if errors.is_empty() {
            return Ok(());
        }

        warn!(schema = name, errors = ?errors, "Schema validation failed");
        Err(SchemaError::Invalid {
            schema: name.to_string(),
            errors,
        })
    }

    /// Validate `obj`, returning `false` (and logging) instead of failing.
    pub fn validate_soft(&self, name: &str, obj: &Value) -> bool {
        match self.validate_or_fail(name, obj) {
            Ok(()) => true,
            Err(e) => {
                warn!(schema = name, kind = e.kind(), error = %e, "Output validation failed");
                false
            }
        }
    }

    /// Drop cached schemas
    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Formatted violations of `obj`, at most [`MAX_REPORTED_ERRORS`].
fn violations(schema: &JSONSchema, obj: &Value) -> Vec<String> {
    match schema.validate(obj) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .take(MAX_REPORTED_ERRORS)
            .map(|e| format!("{}: {}", display_path(&e.instance_path.to_string()), e))
            .collect(),
    }
}

/// `/a/0/b` → `a.0.b`; the document root is `$`.
fn display_path(pointer: &str) -> String {
    let trimmed = pointer.trim_start_matches('/');
    if trimmed.is_empty() {
        "$".to_string()
    } else {
        trimmed.replace('/', ".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn validator_with(name: &str, schema: &str) -> (tempfile::TempDir, SchemaValidator) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(format!("{}.json", name)), schema).unwrap();
        let validator = SchemaValidator::new(dir.path());
        (dir, validator)
    }

    const PERSON: &str = r#"{
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string"},
            "tags": {"type": "array", "items": {"type": "string"}}
        }
    }"#;

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(""), "$");
        assert_eq!(display_path("/tags/0"), "tags.0");
    }

    #[test]
    fn test_valid_object_passes() {
        let (_dir, validator) = validator_with("person", PERSON);
        assert!(validator
            .validate_or_fail("person", &json!({"name": "Ada"}))
            .is_ok());
        assert!(validator.validate_soft("person", &json!({"name": "Ada"})));
    }

    #[test]
    fn test_invalid_object_reports_paths() {
        let (_dir, validator) = validator_with("person", PERSON);
        let err = validator
            .validate_or_fail("person", &json!({"tags": ["a", 7]}))
            .unwrap_err();

        assert_eq!(err.kind(), "INVALID_INPUT_SCHEMA");
        let SchemaError::Invalid { errors, .. } = err else {
            panic!("expected Invalid");
        };
        assert!(errors.iter().any(|e| e.starts_with("$: ")));
        assert!(errors.iter().any(|e| e.starts_with("tags.1: ")));
    }

    #[test]
    fn test_error_list_is_capped() {
        let (_dir, validator) = validator_with(
            "numbers",
            r#"{"type": "array", "items": {"type": "number"}}"#,
        );
        let err = validator
            .validate_or_fail("numbers", &json!(["a", "b", "c", "d", "e", "f", "g"]))
            .unwrap_err();
        let SchemaError::Invalid { errors, .. } = err else {
            panic!("expected Invalid");
        };
        assert_eq!(errors.len(), MAX_REPORTED_ERRORS);
    }

    #[test]
    fn test_missing_schema_is_misconfiguration() {
        let dir = tempdir().unwrap();
        let validator = SchemaValidator::new(dir.path());
        let err = validator
            .validate_or_fail("absent", &json!({}))
            .unwrap_err();
        assert_eq!(err.kind(), "SCHEMA_NOT_FOUND");
        assert!(err.is_misconfiguration());
        assert!(!validator.validate_soft("absent", &json!({})));
    }

    #[test]
    fn test_malformed_schema_file() {
        let (_dir, validator) = validator_with("broken", "{ not json");
        let err = validator
            .validate_or_fail("broken", &json!({}))
            .unwrap_err();
        assert_eq!(err.kind(), "SCHEMA_PARSE_ERROR");
    }

    #[test]
    fn test_schema_is_cached() {
        let (dir, validator) = validator_with("person", PERSON);
        validator.load("person").unwrap();
        fs::remove_file(dir.path().join("person.json")).unwrap();
        assert!(validator.load("person").is_ok());

        validator.clear_cache();
        assert!(validator.load("person").is_err());
    }

    #[test]
    fn test_structurally_invalid_schema_fails_at_load() {
        let (dir, validator) = validator_with("bad_type", r#"{"type": 42}"#);

        let err = validator.load("bad_type").unwrap_err();
        assert_eq!(err.kind(), "SCHEMA_PARSE_ERROR");
        assert!(err.to_string().contains("Invalid JSON Schema"));
        assert!(!validator.validate_soft("bad_type", &json!({})));

        fs::write(dir.path().join("bad_type.json"), r#"{"type": "object"}"#).unwrap();
        assert!(validator.load("bad_type").is_ok());
    }

    #[test]
    fn test_compiled_schema_is_shared() {
        let (_dir, validator) = validator_with("person", PERSON);
        let first = validator.load("person").unwrap();
        let second = validator.load("person").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_valid(&json!({"name": "Ada"})));
    }
}
