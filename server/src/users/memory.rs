use crate::users::UserDirectory;
use ::agora_protocol::model::{ids::UserId, user::UserSummary};
use ::std::collections::HashMap;

#[derive(Default)]
pub struct MemoryUserDirectory {
    users: ::tokio::sync::RwLock<HashMap<UserId, UserSummary>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: UserSummary) {
        self.users.write().await.insert(user.id.clone(), user);
    }
}

#[async_trait::async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get_users(
        &self,
        ids: &[UserId],
    ) -> ::anyhow::Result<HashMap<UserId, UserSummary>> {
        let users = self.users.read().await;

        Ok(ids
            .iter()
            .filter_map(|id| users.get(id).map(|x| (id.clone(), x.clone())))
            .collect())
    }
}
