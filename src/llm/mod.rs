//! LLM access: provider capability, HTTP adapter and the routing gateway.
//!
//! The orchestrator only ever talks to [`LlmGateway`]. Vendor request and
//! response shapes stay inside provider adapters such as
//! [`OpenAiCompatProvider`].

mod client;
mod gateway;
mod types;

pub use client::OpenAiCompatProvider;
pub use gateway::{LlmGateway, RouteTable, PURPOSE_PROPOSE_FIELDS_ONLY};
pub use types::*;

use async_trait::async_trait;

use crate::error::LlmResult;

/// A model endpoint that turns a request into raw completion text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier reported in response metadata.
    fn model(&self) -> &str;

    /// Produce the raw completion for a request.
    async fn generate(&self, request: &LlmRequest) -> LlmResult<String>;
}
