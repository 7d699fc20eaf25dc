use ::agora_protocol::model::{entity::Entity, ids::EntityId};

pub mod memory;
pub mod postgres;

/// Authoritative store of entity documents. Soft deleted entities are
/// still returned; callers check `isActive`.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, id: &EntityId) -> ::anyhow::Result<Option<Entity>>;

    /// Full document upsert, last write wins.
    async fn put(&self, entity: &Entity) -> ::anyhow::Result<Entity>;
}
