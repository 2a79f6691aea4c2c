//! Versioned prompt templates loaded from a YAML registry directory.
//!
//! Each prompt lives in `<dir>/<prompt_id>.yaml` and carries its system
//! prompt, a user prompt template, model defaults and schema references.
//! Templates use Jinja syntax (conditionals, loops, `default`), so prompt
//! text can change without touching code. Rendering is pure.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use minijinja::Environment;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{PromptError, PromptResult};

/// Model parameters a prompt was tuned for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefaults {
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion length cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request a JSON object response.
    #[serde(default = "default_json_mode")]
    pub json_mode: bool,
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_json_mode() -> bool {
    true
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            json_mode: default_json_mode(),
        }
    }
}

/// A loaded, immutable prompt definition.
#[derive(Debug, Clone, Serialize)]
pub struct PromptSpec {
    /// Prompt identifier, matching the file stem.
    pub id: String,
    /// Semantic version of the prompt text.
    pub version: String,
    /// Human description.
    pub description: String,
    /// Gateway routing tag.
    pub purpose: String,
    /// System prompt template.
    pub system_prompt: String,
    /// User prompt template.
    pub user_prompt_template: String,
    /// Model parameters.
    pub model_defaults: ModelDefaults,
    /// Schema the caller's input must satisfy.
    pub input_schema: Option<String>,
    /// Schema results are soft-checked against.
    pub output_schema: Option<String>,
    /// Documented failure modes and mitigations.
    pub known_failure_modes: Vec<BTreeMap<String, String>>,
    /// Offline evaluation rules.
    pub eval_checks: Vec<BTreeMap<String, String>>,
}

/// On-disk shape; required fields are optional here so their absence can be
/// reported by name.
#[derive(Debug, Deserialize)]
struct PromptFile {
    id: Option<String>,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    purpose: String,
    system_prompt: Option<String>,
    user_prompt_template: Option<String>,
    #[serde(default)]
    model_defaults: ModelDefaults,
    input_schema: Option<String>,
    output_schema: Option<String>,
    #[serde(default)]
    known_failure_modes: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    eval_checks: Vec<BTreeMap<String, String>>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl PromptSpec {
    /// Parse a prompt definition from YAML text.
    pub fn from_yaml(prompt_id: &str, yaml: &str) -> PromptResult<Self> {
        let file: PromptFile = serde_yaml::from_str(yaml).map_err(|e| PromptError::Parse {
            prompt_id: prompt_id.to_string(),
            message: e.to_string(),
        })?;

        let missing = |field: &str| PromptError::MissingField {
            prompt_id: prompt_id.to_string(),
            field: field.to_string(),
        };

        Ok(Self {
            id: file.id.ok_or_else(|| missing("id"))?,
            version: file.version,
            description: file.description,
            purpose: file.purpose,
            system_prompt: file.system_prompt.ok_or_else(|| missing("system_prompt"))?,
            user_prompt_template: file
                .user_prompt_template
                .ok_or_else(|| missing("user_prompt_template"))?,
            model_defaults: file.model_defaults,
            input_schema: file.input_schema,
            output_schema: file.output_schema,
            known_failure_modes: file.known_failure_modes,
            eval_checks: file.eval_checks,
        })
    }

    /// Render `(system_prompt, user_prompt)` against `context`.
    pub fn render<S: Serialize>(&self, context: &S) -> PromptResult<(String, String)> {
        let env = Environment::new();
        let render_err = |source: minijinja::Error| {
            error!(prompt_id = %self.id, error = %source, "Template render failed");
            PromptError::Render {
                prompt_id: self.id.clone(),
                source,
            }
        };

        let system = env
            .render_str(&self.system_prompt, context)
            .map_err(render_err)?;
        let user = env
            .render_str(&self.user_prompt_template, context)
            .map_err(render_err)?;
        Ok((system, user))
    }

    /// Sampling temperature from the model defaults
    pub fn temperature(&self) -> f32 {
        self.model_defaults.temperature
    }

    /// Completion length cap from the model defaults
    pub fn max_tokens(&self) -> u32 {
        self.model_defaults.max_tokens
    }

    /// Whether the prompt expects a JSON object response
    pub fn json_mode(&self) -> bool {
        self.model_defaults.json_mode
    }
}

/// Directory-backed prompt registry with a per-instance cache.
///
/// Entries are inserted once per id and never mutated. Two tasks loading the
/// same unseen id concurrently both read the file; the results are identical.
pub struct PromptRegistry {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<PromptSpec>>>,
}

impl PromptRegistry {
    /// Create a registry over `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Registry directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a prompt by id, reading the file only on first use.
    pub fn load(&self, prompt_id: &str) -> PromptResult<Arc<PromptSpec>> {
        if let Some(spec) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(prompt_id)
        {
            return Ok(Arc::clone(spec));
        }

        let path = self.dir.join(format!("{}.yaml", prompt_id));
        if !path.is_file() {
            return Err(PromptError::NotFound {
                prompt_id: prompt_id.to_string(),
                path,
            });
        }

        let yaml = std::fs::read_to_string(&path)?;
        let spec = Arc::new(PromptSpec::from_yaml(prompt_id, &yaml)?);

        info!(prompt_id, version = %spec.version, "Prompt loaded");

        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(prompt_id.to_string())
            .or_insert_with(|| Arc::clone(&spec));
        Ok(spec)
    }

    /// All prompt ids available in the registry directory, sorted.
    pub fn list_prompt_ids(&self) -> PromptResult<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Drop every cached prompt so the next load re-reads from disk.
    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        debug!(dir = %self.dir.display(), "Prompt cache cleared");
    }

    /// Number of cached prompts
    pub fn cached_count(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
