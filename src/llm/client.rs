use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::types::{ChatCompletionRequest, ChatCompletionResponse, LlmRequest, ProviderKind};
use super::LlmProvider;
use crate::config::{ProviderConfig, RequestConfig};
use crate::error::{LlmError, LlmResult};

/// Client for any OpenAI-compatible chat completions endpoint
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    kind: ProviderKind,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_ms: u64,
}

impl OpenAiCompatProvider {
    /// Create a new provider client
    pub fn new(
        kind: ProviderKind,
        config: &ProviderConfig,
        request_config: &RequestConfig,
    ) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(LlmError::Http)?;

        Ok(Self {
            kind,
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout_ms: request_config.timeout_ms,
        })
    }

    /// Route name this client is registered under
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute a single completion call
    async fn execute_request(&self, request: &LlmRequest) -> LlmResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest::from_request(&self.model, request);

        debug!(
            model = %self.model,
            purpose = %request.purpose,
            json_mode = request.json_mode,
            "Calling chat completions"
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout {
                    provider: self.kind.to_string(),
                    purpose: request.purpose.clone(),
                    timeout_ms: self.timeout_ms,
                }
            } else {
                LlmError::Http(e)
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let completion: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        completion
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse {
                message: "Response contained no message content".to_string(),
            })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &LlmRequest) -> LlmResult<String> {
        let start = Instant::now();

        match self.execute_request(request).await {
            Ok(content) => {
                info!(
                    model = %self.model,
                    purpose = %request.purpose,
                    latency_ms = start.elapsed().as_millis() as u64,
                    chars = content.len(),
                    "Chat completion succeeded"
                );
                Ok(content)
            }
            Err(e) => {
                error!(
                    model = %self.model,
                    purpose = %request.purpose,
                    error = %e,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Chat completion failed"
                );
                Err(e)
            }
        }
    }
}
