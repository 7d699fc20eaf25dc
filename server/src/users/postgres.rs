use crate::users::UserDirectory;
use ::agora_protocol::model::{ids::UserId, user::UserSummary};
use ::anyhow::Context;
use ::std::collections::HashMap;

pub struct PostgresUserDirectory {
    pool: ::sqlx::PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: ::sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[derive(::sqlx::FromRow)]
struct UserRow {
    id: String,
    display_name: String,
    avatar_url: Option<String>,
}

#[async_trait::async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn get_users(
        &self,
        ids: &[UserId],
    ) -> ::anyhow::Result<HashMap<UserId, UserSummary>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = "
            SELECT id, display_name, avatar_url
            FROM users
            WHERE id = ANY($1);
        ";

        let ids: Vec<String> = ids.iter().map(|x| x.to_string()).collect();

        let rows = ::sqlx::query_as::<_, UserRow>(query)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .context("select users")?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = UserId::new(row.id);
                (
                    id.clone(),
                    UserSummary {
                        id,
                        display_name: row.display_name,
                        avatar_url: row.avatar_url,
                    },
                )
            })
            .collect())
    }
}
