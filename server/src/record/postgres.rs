use crate::record::RecordStore;
use ::agora_protocol::model::{entity::Entity, ids::EntityId};
use ::anyhow::Context;

pub struct PostgresRecordStore {
    pool: ::sqlx::PgPool,
}

impl PostgresRecordStore {
    pub fn new(pool: ::sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecordStore for PostgresRecordStore {
    async fn get(&self, id: &EntityId) -> ::anyhow::Result<Option<Entity>> {
        let query = "
            SELECT document FROM entities WHERE id = $1;
        ";

        let row = ::sqlx::query_scalar::<_, ::sqlx::types::Json<Entity>>(query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("select entity {}", id))?;

        Ok(row.map(|x| x.0))
    }

    async fn put(&self, entity: &Entity) -> ::anyhow::Result<Entity> {
        let query = "
            INSERT INTO entities (
                id,
                kind,
                community_id,
                updated_on,
                document
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id)
            DO UPDATE SET
                kind = EXCLUDED.kind,
                community_id = EXCLUDED.community_id,
                updated_on = EXCLUDED.updated_on,
                document = EXCLUDED.document;
        ";

        ::sqlx::query(query)
            .bind(entity.id().to_string())
            .bind(entity.kind().as_str())
            .bind(entity.community_id().as_str())
            .bind(entity.base().updated_on.timestamp_millis())
            .bind(::sqlx::types::Json(entity))
            .execute(&self.pool)
            .await
            .with_context(|| format!("upsert entity {}", entity.id()))?;

        Ok(entity.clone())
    }
}
