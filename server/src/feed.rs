use crate::users::UserDirectory;
use ::agora_protocol::model::entity::Entity;
use ::agora_protocol::model::feed::FeedRow;
use ::agora_protocol::model::ids::UserId;

/// Decodes search rows and attaches creator and mentioned user display
/// data, preserving row order.
pub async fn enrich_rows(
    users: &dyn UserDirectory,
    documents: Vec<::serde_json::Value>,
) -> ::anyhow::Result<Vec<FeedRow>> {
    let entities = documents
        .into_iter()
        .map(Entity::from_document)
        .collect::<::anyhow::Result<Vec<Entity>>>()?;

    enrich_entities(users, entities).await
}

pub async fn enrich_entities(
    users: &dyn UserDirectory,
    entities: Vec<Entity>,
) -> ::anyhow::Result<Vec<FeedRow>> {
    let mut ids: Vec<UserId> = vec![];
    for entity in &entities {
        ids.push(entity.created_by().clone());
        ids.extend(entity.base().mentioned_users.iter().cloned());
    }
    ids.sort();
    ids.dedup();

    let directory = users.get_users(&ids).await?;

    Ok(entities
        .into_iter()
        .map(|entity| {
            let creator = directory.get(entity.created_by()).cloned();
            let mentioned_users = entity
                .base()
                .mentioned_users
                .iter()
                .filter_map(|x| directory.get(x).cloned())
                .collect();

            FeedRow {
                entity,
                creator,
                mentioned_users,
            }
        })
        .collect())
}
