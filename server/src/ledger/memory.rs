use crate::ledger::LedgerStore;
use ::agora_protocol::model::ledger::{LedgerFilter, LedgerKey, LedgerRow};

#[derive(Default)]
pub struct MemoryLedgerStore {
    rows: ::tokio::sync::RwLock<::std::collections::HashMap<LedgerKey, LedgerRow>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn upsert(&self, row: &LedgerRow) -> ::anyhow::Result<()> {
        let mut rows = self.rows.write().await;

        let created_on = rows
            .get(&row.key())
            .map(|existing| existing.created_on)
            .unwrap_or(row.created_on);

        let mut row = row.clone();
        row.created_on = created_on;
        rows.insert(row.key(), row);

        Ok(())
    }

    async fn query(
        &self,
        filter: &LedgerFilter,
        limit: Option<usize>,
    ) -> ::anyhow::Result<Vec<LedgerRow>> {
        let rows = self.rows.read().await;

        let mut result: Vec<LedgerRow> =
            rows.values().filter(|x| filter.matches(x)).cloned().collect();

        result.sort_by(|a, b| {
            b.updated_on
                .cmp(&a.updated_on)
                .then_with(|| a.actor.cmp(&b.actor))
                .then_with(|| a.subject.cmp(&b.subject))
        });

        if let Some(limit) = limit {
            result.truncate(limit);
        }

        Ok(result)
    }

    async fn delete(&self, key: &LedgerKey) -> ::anyhow::Result<()> {
        self.rows.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::agora_protocol::model::ledger::{LedgerKind, VoteDirection};

    fn vote(actor: &str, subject: &str, direction: VoteDirection) -> LedgerRow {
        let mut row = LedgerRow::new(
            LedgerKey::new(actor, subject, LedgerKind::Vote),
            ::chrono::Utc::now(),
        );
        row.vote = Some(direction);
        row
    }

    #[tokio::test]
    async fn upsert_replaces_row_with_same_key() {
        let store = MemoryLedgerStore::new();

        store.upsert(&vote("u1", "e1", VoteDirection::Up)).await.unwrap();
        store.upsert(&vote("u1", "e1", VoteDirection::Down)).await.unwrap();
        store.upsert(&vote("u2", "e1", VoteDirection::Up)).await.unwrap();

        let rows = store
            .query(&LedgerFilter::kind(LedgerKind::Vote).subject("e1"), None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let row = store
            .get(&LedgerKey::new("u1", "e1", LedgerKind::Vote))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.vote, Some(VoteDirection::Down));
    }

    #[tokio::test]
    async fn query_filters_by_kind_and_activity() {
        let store = MemoryLedgerStore::new();
        let now = ::chrono::Utc::now();

        let mut bookmark = LedgerRow::new(
            LedgerKey::new("u1", "e1", LedgerKind::Bookmark),
            now,
        );
        store.upsert(&bookmark).await.unwrap();
        store.upsert(&vote("u1", "e1", VoteDirection::Up)).await.unwrap();

        let filter = LedgerFilter::kind(LedgerKind::Bookmark)
            .actor("u1")
            .active(true);
        assert_eq!(store.query(&filter, None).await.unwrap().len(), 1);

        bookmark.active = false;
        store.upsert(&bookmark).await.unwrap();
        assert!(store.query(&filter, None).await.unwrap().is_empty());

        store.delete(&bookmark.key()).await.unwrap();
        assert!(store.get(&bookmark.key()).await.unwrap().is_none());
    }
}
