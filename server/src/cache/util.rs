use crate::cache::providers::interface::CacheStore;
use ::agora_protocol::model::ids::{CommunityId, EntityId, UserId};

pub const ENTITY_PREFIX: &str = "entity:";
pub const OPAQUE_PREFIX: &str = "q:";

pub fn entity_key(id: &EntityId) -> String {
    format!("{}{}", ENTITY_PREFIX, id)
}

// Every namespace key is "{namespace}:{variable}:{bucket}:p{page}" so that
// all buckets sharing a variable value can be dropped with one prefix.

pub fn namespace_prefix(namespace: &str, variable: &str) -> String {
    format!("{}:{}:", namespace, variable)
}

pub fn namespace_key(
    namespace: &str,
    variable: &str,
    bucket: &str,
    page: u32,
) -> String {
    format!("{}{}:p{}", namespace_prefix(namespace, variable), bucket, page)
}

pub fn feed_prefix(community: &CommunityId) -> String {
    namespace_prefix("feed", community.as_str())
}

pub fn moderation_prefix(community: &CommunityId) -> String {
    namespace_prefix("modq", community.as_str())
}

pub fn children_prefix(parent: &EntityId) -> String {
    namespace_prefix("children", &parent.to_string())
}

pub fn bookmarks_prefix(user: &UserId) -> String {
    namespace_prefix("bookmarks", user.as_str())
}

/// Reads and decodes a cached JSON value. Cache failures and undecodable
/// entries read as a miss.
pub async fn get_json<T: ::serde::de::DeserializeOwned>(
    cache: &dyn CacheStore,
    key: &str,
) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(bytes)) => match ::serde_json::from_slice(&bytes) {
            Ok(x) => Some(x),
            Err(err) => {
                ::log::warn!("dropping undecodable cache entry {}: {}", key, err);
                if let Err(err) = cache.delete(key).await {
                    ::log::warn!("failed to delete cache entry {}: {}", key, err);
                }
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            ::log::warn!("cache read {} failed: {:?}", key, err);
            None
        }
    }
}

pub async fn set_json<T: ::serde::Serialize + Sync>(
    cache: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Option<::std::time::Duration>,
) -> ::anyhow::Result<()> {
    cache.set(key, ::serde_json::to_vec(value)?, ttl).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_keys_share_their_prefix() {
        let community = CommunityId::from("c1");
        let key = namespace_key("feed", "c1", "default", 3);

        assert_eq!(key, "feed:c1:default:p3");
        assert!(key.starts_with(&feed_prefix(&community)));
        assert!(!key.starts_with(&moderation_prefix(&community)));
        assert!(!namespace_key("feed", "c10", "default", 1)
            .starts_with(&feed_prefix(&community)));
    }
}
