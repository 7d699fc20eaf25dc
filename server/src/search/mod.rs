use ::agora_protocol::query::{Query, SearchResult};

pub mod memory;
pub mod opensearch;

/// Queryable mirror of entity documents, one collection per entity kind.
#[async_trait::async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index(
        &self,
        collection: &str,
        id: &str,
        document: &::serde_json::Value,
    ) -> ::anyhow::Result<()>;

    /// Replaces the stored document, creating it when absent.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        document: &::serde_json::Value,
    ) -> ::anyhow::Result<()>;

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> ::anyhow::Result<SearchResult>;
}
