//! Provider routing with timeout races and ordered fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{info, warn};

use super::client::OpenAiCompatProvider;
use super::types::{LlmRequest, LlmResponse, ProviderKind};
use super::LlmProvider;
use crate::config::{LlmConfig, RequestConfig};
use crate::error::{LlmError, LlmResult};

/// Purpose whose cloud calls get the dedicated fields-only timeout.
pub const PURPOSE_PROPOSE_FIELDS_ONLY: &str = "propose_fields_only";

/// Purpose → ordered provider list, with a default for unknown purposes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    default_route: Vec<ProviderKind>,
    purpose_routes: HashMap<String, Vec<ProviderKind>>,
}

impl RouteTable {
    /// Create a table with only a default route
    pub fn new(default_route: Vec<ProviderKind>) -> Self {
        Self {
            default_route,
            purpose_routes: HashMap::new(),
        }
    }

    /// Register a purpose-specific route
    pub fn with_route(mut self, purpose: impl Into<String>, route: Vec<ProviderKind>) -> Self {
        self.purpose_routes.insert(purpose.into(), route);
        self
    }

    /// Route for a purpose, falling back to the default route.
    pub fn resolve(&self, purpose: &str) -> &[ProviderKind] {
        self.purpose_routes
            .get(purpose)
            .unwrap_or(&self.default_route)
    }

    /// The default route
    pub fn default_route(&self) -> &[ProviderKind] {
        &self.default_route
    }
}

/// Single entry point for LLM calls.
///
/// Tries each provider of a route in order and returns the first success.
/// A provider that errors or exceeds its timeout is skipped immediately;
/// only exhausting the whole route is reported to the caller.
pub struct LlmGateway {
    providers: HashMap<ProviderKind, Arc<dyn LlmProvider>>,
    routes: RouteTable,
    local_timeout_ms: Option<u64>,
    cloud_timeout_ms_fields_only: Option<u64>,
}

impl LlmGateway {
    /// Create a gateway over an explicit provider set
    pub fn new(routes: RouteTable) -> Self {
        Self {
            providers: HashMap::new(),
            routes,
            local_timeout_ms: None,
            cloud_timeout_ms_fields_only: None,
        }
    }

    /// Register a provider implementation under a name
    pub fn with_provider(mut self, kind: ProviderKind, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    /// Default timeout for the local provider when the request sets none
    pub fn with_local_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.local_timeout_ms = timeout_ms;
        self
    }

    /// Default timeout for cloud providers on `propose_fields_only` calls
    pub fn with_cloud_timeout_ms_fields_only(mut self, timeout_ms: Option<u64>) -> Self {
        self.cloud_timeout_ms_fields_only = timeout_ms;
        self
    }

    /// Build providers and routes from configuration.
    ///
    /// Cloud providers are registered when they have an API key. The default
    /// route is the primary cloud provider; configured local purposes route
    /// `[local, primary]` when the local provider is enabled.
    pub fn from_config(config: &LlmConfig, request: &RequestConfig) -> LlmResult<Self> {
        let mut routes = RouteTable::new(vec![config.primary]);
        let mut gateway_providers: Vec<(ProviderKind, Arc<dyn LlmProvider>)> = Vec::new();

        for (kind, provider_config) in [
            (ProviderKind::Deepseek, &config.deepseek),
            (ProviderKind::OpenAi, &config.openai),
        ] {
            if provider_config.api_key.is_some() {
                let provider = OpenAiCompatProvider::new(kind, provider_config, request)?;
                gateway_providers.push((kind, Arc::new(provider)));
            }
        }

        if let Some(local) = &config.local {
            let provider = OpenAiCompatProvider::new(ProviderKind::Local, local, request)?;
            gateway_providers.push((ProviderKind::Local, Arc::new(provider)));
            for purpose in &config.local_purposes {
                routes = routes.with_route(
                    purpose.clone(),
                    vec![ProviderKind::Local, config.primary],
                );
            }
        }

        let gateway = gateway_providers
            .into_iter()
            .fold(LlmGateway::new(routes), |gw, (kind, provider)| {
                gw.with_provider(kind, provider)
            })
            .with_local_timeout_ms(config.local_timeout_ms)
            .with_cloud_timeout_ms_fields_only(config.cloud_timeout_ms_fields_only);

        info!(
            providers = ?gateway.registered_providers(),
            default_route = ?gateway.routes.default_route(),
            "LLM gateway initialized"
        );

        Ok(gateway)
    }

    /// Names of registered providers, sorted for stable output.
    pub fn registered_providers(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    /// The routing table in use
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Generate a completion, walking the route until a provider answers.
    pub async fn generate(
        &self,
        request: &LlmRequest,
        route: Option<&[ProviderKind]>,
    ) -> LlmResult<LlmResponse> {
        let route = route.unwrap_or_else(|| self.routes.resolve(&request.purpose));
        let mut last_error: Option<LlmError> = None;

        for (idx, kind) in route.iter().enumerate() {
            let attempts = idx as u32 + 1;

            let Some(provider) = self.providers.get(kind) else {
                warn!(
                    provider = %kind,
                    purpose = %request.purpose,
                    attempt = attempts,
                    "Provider not registered, trying next in route"
                );
                last_error = Some(LlmError::UnknownProvider {
                    provider: kind.to_string(),
                });
                continue;
            };

            let timeout_ms = self.effective_timeout_ms(*kind, request);
            let start = Instant::now();

            let outcome = match timeout_ms {
                Some(ms) => {
                    match tokio::time::timeout(Duration::from_millis(ms), provider.generate(request))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(LlmError::Timeout {
                            provider: kind.to_string(),
                            purpose: request.purpose.clone(),
                            timeout_ms: ms,
                        }),
                    }
                }
                None => provider.generate(request).await,
            };

            let outcome = outcome.and_then(|content| require_json_object(request, content));
            let latency_ms = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(content) => {
                    let used_fallback = idx > 0;
                    info!(
                        purpose = %request.purpose,
                        provider = %kind,
                        model = %provider.model(),
                        json_mode = request.json_mode,
                        sys_chars = request.system_prompt.len(),
                        user_chars = request.user_prompt.len(),
                        latency_ms,
                        attempts,
                        fallback = used_fallback,
                        "LLM done"
                    );

                    return Ok(LlmResponse {
                        content,
                        provider: kind.to_string(),
                        model: provider.model().to_string(),
                        latency_ms,
                        attempts,
                        used_fallback,
                    });
                }
                Err(e) => {
                    warn!(
                        purpose = %request.purpose,
                        provider = %kind,
                        error = %e,
                        timeout = e.is_timeout(),
                        latency_ms,
                        attempt = attempts,
                        "LLM provider failed, trying next in route"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::EmptyRoute {
            purpose: request.purpose.clone(),
        }))
    }

    fn effective_timeout_ms(&self, kind: ProviderKind, request: &LlmRequest) -> Option<u64> {
        if request.timeout_ms.is_some() {
            return request.timeout_ms;
        }
        match kind {
            ProviderKind::Local => self.local_timeout_ms,
            _ if request.purpose == PURPOSE_PROPOSE_FIELDS_ONLY => {
                self.cloud_timeout_ms_fields_only
            }
            _ => None,
        }
    }
}

/// In JSON mode a reply that is not a JSON object counts as a provider
/// failure, so the route moves on instead of handing prose downstream.
fn require_json_object(request: &LlmRequest, content: String) -> LlmResult<String> {
    if !request.json_mode {
        return Ok(content);
    }
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(_)) => Ok(content),
        _ => Err(LlmError::InvalidResponse {
            message: "LLM JSON mode must return a JSON object".to_string(),
        }),
    }
}
