use ::anyhow::Result;

#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the whole value. Entries without a ttl live until
    /// explicitly deleted or evicted.
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<::std::time::Duration>,
    ) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Returns the number of entries removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64>;
}
