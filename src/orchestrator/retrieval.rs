use async_trait::async_trait;
use serde_json::Value;

use super::NormalizedTicket;
use crate::error::AppResult;

/// Source of supporting context for the analysis prompt.
///
/// Results are opaque JSON objects; the prompt template reads `title`,
/// `summary` and `excerpt` when present.
#[async_trait]
pub trait RetrievalSource: Send + Sync {
    /// Previously resolved tickets resembling `ticket`.
    async fn similar_cases(&self, tenant_id: &str, ticket: &NormalizedTicket) -> AppResult<Vec<Value>>;

    /// Knowledge base articles relevant to `ticket`.
    async fn kb_articles(&self, tenant_id: &str, ticket: &NormalizedTicket) -> AppResult<Vec<Value>>;
}

/// Fixed results, for wiring and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRetrieval {
    /// Returned from every `similar_cases` call.
    pub similar_cases: Vec<Value>,
    /// Returned from every `kb_articles` call.
    pub kb_articles: Vec<Value>,
}

#[async_trait]
impl RetrievalSource for StaticRetrieval {
    async fn similar_cases(&self, _tenant_id: &str, _ticket: &NormalizedTicket) -> AppResult<Vec<Value>> {
        Ok(self.similar_cases.clone())
    }

    async fn kb_articles(&self, _tenant_id: &str, _ticket: &NormalizedTicket) -> AppResult<Vec<Value>> {
        Ok(self.kb_articles.clone())
    }
}
