use ::agora_protocol::model::{ids::UserId, user::UserSummary};
use ::std::collections::HashMap;

pub mod memory;
pub mod postgres;

/// Display data used to enrich feed rows.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    /// Unknown ids are absent from the result.
    async fn get_users(
        &self,
        ids: &[UserId],
    ) -> ::anyhow::Result<HashMap<UserId, UserSummary>>;
}
