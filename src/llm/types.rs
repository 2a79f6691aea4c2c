use serde::{Deserialize, Serialize};

/// Names of the providers a route may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// DeepSeek chat API.
    Deepseek,
    /// OpenAI chat completions API.
    #[serde(rename = "openai")]
    OpenAi,
    /// Self-hosted OpenAI-compatible server.
    Local,
}

impl ProviderKind {
    /// Get the provider name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Deepseek => "deepseek",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Local => "local",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deepseek" => Ok(ProviderKind::Deepseek),
            "openai" => Ok(ProviderKind::OpenAi),
            "local" => Ok(ProviderKind::Local),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// One LLM call, built once per pipeline invocation.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// Routing tag (e.g. `analyze_ticket_cot`).
    pub purpose: String,
    /// Rendered system prompt.
    pub system_prompt: String,
    /// Rendered user prompt.
    pub user_prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Ask the provider for a JSON object.
    pub json_mode: bool,
    /// Completion length cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Per-provider timeout; overrides gateway defaults when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl LlmRequest {
    /// Create a new request
    pub fn new(
        purpose: impl Into<String>,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            purpose: purpose.into(),
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: 0.3,
            json_mode: false,
            max_tokens: None,
            timeout_ms: None,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Request a JSON object response
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    /// Cap the completion length
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the per-provider timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Successful generation with routing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Raw completion text.
    pub content: String,
    /// Provider that answered.
    pub provider: String,
    /// Model that answered.
    pub model: String,
    /// Latency of the successful call.
    pub latency_ms: u64,
    /// Route entries consumed, including the one that answered.
    pub attempts: u32,
    /// Whether the answering provider was not first in the route.
    pub used_fallback: bool,
}

/// Message in an OpenAI-style chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instructions.
    System,
    /// End-user turn.
    User,
    /// Model turn.
    Assistant,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// `response_format` body field
#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    /// `json_object` or `text`.
    #[serde(rename = "type")]
    pub format_type: String,
}

/// Body of a `POST /chat/completions` call
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model name.
    pub model: String,
    /// System then user message.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion length cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Set when JSON mode is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    /// Always false.
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Build the wire body for a gateway request
    pub fn from_request(model: &str, request: &LlmRequest) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage::system(&request.system_prompt),
                ChatMessage::user(&request.user_prompt),
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            stream: false,
        }
    }
}

/// Response of a `POST /chat/completions` call
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Model that served the request.
    #[serde(default)]
    pub model: Option<String>,
    /// Completion choices.
    pub choices: Vec<ChatChoice>,
    /// Token usage, when reported.
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// One completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// Assistant message.
    pub message: ChoiceMessage,
    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant message inside a choice
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    /// Message text.
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage information
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    pub prompt_tokens: Option<u32>,
    /// Completion tokens.
    pub completion_tokens: Option<u32>,
    /// Sum of both.
    pub total_tokens: Option<u32>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if any.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}
