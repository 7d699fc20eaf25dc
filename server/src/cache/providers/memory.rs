use crate::cache::providers::interface;
use ::anyhow::Result;
use ::lru::LruCache;
use ::tokio::time::Instant;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |x| x <= now)
    }
}

/// Bounded in-process cache. Least recently used entries are evicted once
/// the capacity is reached; expired entries are dropped lazily on read.
pub struct MemoryProvider {
    entries: ::tokio::sync::Mutex<LruCache<String, Entry>>,
}

impl MemoryProvider {
    pub fn new(capacity: ::std::num::NonZeroUsize) -> Self {
        Self {
            entries: ::tokio::sync::Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl interface::CacheStore for MemoryProvider {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => true,
            Some(entry) => return Ok(Some(entry.value.clone())),
            None => return Ok(None),
        };

        if expired {
            entries.pop(key);
        }

        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<::std::time::Duration>,
    ) -> Result<()> {
        let entry = Entry {
            value,
            expires_at: ttl.map(|x| Instant::now() + x),
        };

        self.entries.lock().await.put(key.to_string(), entry);

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.pop(key);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        let mut entries = self.entries.lock().await;

        let keys: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            entries.pop(key);
        }

        Ok(keys.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::providers::interface::CacheStore;

    fn make_provider(capacity: usize) -> MemoryProvider {
        MemoryProvider::new(::std::num::NonZeroUsize::new(capacity).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = make_provider(16);

        cache
            .set("a", b"1".to_vec(), Some(::std::time::Duration::from_secs(5)))
            .await
            .unwrap();
        cache.set("b", b"2".to_vec(), None).await.unwrap();

        assert_eq!(cache.get("a").await.unwrap(), Some(b"1".to_vec()));

        ::tokio::time::advance(::std::time::Duration::from_secs(6)).await;

        assert_eq!(cache.get("a").await.unwrap(), None);
        assert_eq!(cache.get("b").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(cache.keys().await, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn delete_by_prefix_only_touches_matching_keys() {
        let cache = make_provider(16);

        for key in ["feed:c1:default:p1", "feed:c1:default:p2", "feed:c2:default:p1", "q:abc"] {
            cache.set(key, vec![], None).await.unwrap();
        }

        assert_eq!(cache.delete_by_prefix("feed:c1:").await.unwrap(), 2);

        let mut keys = cache.keys().await;
        keys.sort();
        assert_eq!(keys, vec!["feed:c2:default:p1".to_string(), "q:abc".to_string()]);
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let cache = make_provider(2);

        cache.set("a", vec![1], None).await.unwrap();
        cache.set("b", vec![2], None).await.unwrap();
        cache.get("a").await.unwrap();
        cache.set("c", vec![3], None).await.unwrap();

        assert!(cache.get("b").await.unwrap().is_none());
        assert!(cache.get("a").await.unwrap().is_some());
    }
}
