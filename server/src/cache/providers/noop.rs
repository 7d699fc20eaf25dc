use crate::cache::providers::interface;

pub struct NoopProvider;

impl NoopProvider {
    pub fn new() -> Self {
        NoopProvider
    }
}

#[async_trait::async_trait]
impl interface::CacheStore for NoopProvider {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, anyhow::Error> {
        Ok(None)
    }

    async fn set(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _ttl: Option<::std::time::Duration>,
    ) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn delete_by_prefix(&self, _prefix: &str) -> Result<u64, anyhow::Error> {
        Ok(0)
    }
}
