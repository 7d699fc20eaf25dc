use crate::cache::{providers::interface::CacheStore, util};
use crate::search::SearchIndex;
use ::agora_protocol::model::entity::Entity;

/// Replaces the whole indexed document so removed keys do not linger.
pub async fn mirror_search(
    search: &dyn SearchIndex,
    entity: &Entity,
) -> ::anyhow::Result<()> {
    search
        .index(
            entity.kind().collection(),
            &entity.id().to_string(),
            &entity.to_document()?,
        )
        .await
}

/// Single entity entries carry no ttl.
pub async fn refresh_entity_cache(
    cache: &dyn CacheStore,
    entity: &Entity,
) -> ::anyhow::Result<()> {
    util::set_json(cache, &util::entity_key(&entity.id()), entity, None).await
}

/// Writes the entity to both projections. Both writes are attempted even
/// when the first fails.
pub async fn mirror(
    search: &dyn SearchIndex,
    cache: &dyn CacheStore,
    entity: &Entity,
) -> ::anyhow::Result<()> {
    let search_result = mirror_search(search, entity).await;
    let cache_result = refresh_entity_cache(cache, entity).await;

    search_result?;
    cache_result
}
