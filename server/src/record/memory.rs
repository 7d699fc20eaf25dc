use crate::record::RecordStore;
use ::agora_protocol::model::{entity::Entity, ids::EntityId};

#[derive(Default)]
pub struct MemoryRecordStore {
    entities: ::tokio::sync::RwLock<::std::collections::HashMap<EntityId, Entity>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, id: &EntityId) -> ::anyhow::Result<Option<Entity>> {
        Ok(self.entities.read().await.get(id).cloned())
    }

    async fn put(&self, entity: &Entity) -> ::anyhow::Result<Entity> {
        self.entities
            .write()
            .await
            .insert(entity.id(), entity.clone());
        Ok(entity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::agora_protocol::test_utils::make_test_question;

    #[tokio::test]
    async fn put_replaces_whole_document() {
        let store = MemoryRecordStore::new();
        let mut question = make_test_question("c1", "u1");

        store.put(&question).await.unwrap();
        question.base_mut().body = "edited".to_string();
        store.put(&question).await.unwrap();

        let stored = store.get(&question.id()).await.unwrap().unwrap();
        assert_eq!(stored.base().body, "edited");
        assert_eq!(store.len().await, 1);
        assert!(store.get(&EntityId::new()).await.unwrap().is_none());
    }
}
