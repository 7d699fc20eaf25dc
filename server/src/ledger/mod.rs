use ::agora_protocol::model::ledger::{LedgerFilter, LedgerKey, LedgerRow};

pub mod memory;
pub mod postgres;

/// One row per (actor, subject, kind). Rows are never aggregated here.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts the row or replaces the row with the same key in place.
    async fn upsert(&self, row: &LedgerRow) -> ::anyhow::Result<()>;

    /// Rows matching the filter, most recently updated first.
    async fn query(
        &self,
        filter: &LedgerFilter,
        limit: Option<usize>,
    ) -> ::anyhow::Result<Vec<LedgerRow>>;

    async fn delete(&self, key: &LedgerKey) -> ::anyhow::Result<()>;

    async fn get(&self, key: &LedgerKey) -> ::anyhow::Result<Option<LedgerRow>> {
        let filter = LedgerFilter::kind(key.kind)
            .actor(&key.actor)
            .subject(&key.subject);

        Ok(self.query(&filter, Some(1)).await?.into_iter().next())
    }
}
