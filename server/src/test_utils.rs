//! In-memory stores with failure injection, shared by unit and
//! integration tests.

use crate::cache::canonical::Canonicalizer;
use crate::cache::providers::{interface::CacheStore, memory::MemoryProvider};
use crate::config::SyncSettings;
use crate::counts::CounterAggregator;
use crate::identity::{HmacTokenVerifier, Identity};
use crate::ledger::{memory::MemoryLedgerStore, LedgerStore};
use crate::notify::recording::RecordingNotifier;
use crate::prewarm::Prewarmer;
use crate::reads::Reader;
use crate::record::{memory::MemoryRecordStore, RecordStore};
use crate::search::{memory::MemorySearchIndex, SearchIndex};
use crate::service::AgoraService;
use crate::stores::Stores;
use crate::synchronizer::Synchronizer;
use crate::text::TextAnalyzer;
use crate::users::memory::MemoryUserDirectory;
use ::agora_protocol::model::entity::Entity;
use ::agora_protocol::model::ids::{EntityId, UserId};
use ::agora_protocol::model::ledger::{LedgerFilter, LedgerKey, LedgerRow};
use ::agora_protocol::model::user::UserSummary;
use ::agora_protocol::query::{Query, SearchResult};
use ::std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use ::std::sync::Arc;

pub const TEST_TOKEN_KEY: &[u8] = b"test-token-key";
pub const TEST_CACHE_KEY: &[u8] = b"test-cache-key";

fn injected(operation: &str) -> ::anyhow::Error {
    ::anyhow::anyhow!("injected {} failure", operation)
}

#[derive(Default)]
pub struct FlakyRecordStore {
    inner: MemoryRecordStore,
    failing_puts: AtomicUsize,
    failing: AtomicBool,
}

impl FlakyRecordStore {
    /// The next `count` puts fail.
    pub fn fail_puts(&self, count: usize) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl RecordStore for FlakyRecordStore {
    async fn get(&self, id: &EntityId) -> ::anyhow::Result<Option<Entity>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(injected("record get"));
        }
        self.inner.get(id).await
    }

    async fn put(&self, entity: &Entity) -> ::anyhow::Result<Entity> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(injected("record put"));
        }
        let skipped = self.failing_puts.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |x| x.checked_sub(1),
        );
        if skipped.is_ok() {
            return Err(injected("record put"));
        }
        self.inner.put(entity).await
    }
}

#[derive(Default)]
pub struct FlakyLedger {
    inner: MemoryLedgerStore,
    failing: AtomicBool,
}

impl FlakyLedger {
    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> ::anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(injected("ledger"))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl LedgerStore for FlakyLedger {
    async fn upsert(&self, row: &LedgerRow) -> ::anyhow::Result<()> {
        self.check()?;
        self.inner.upsert(row).await
    }

    async fn query(
        &self,
        filter: &LedgerFilter,
        limit: Option<usize>,
    ) -> ::anyhow::Result<Vec<LedgerRow>> {
        self.check()?;
        self.inner.query(filter, limit).await
    }

    async fn delete(&self, key: &LedgerKey) -> ::anyhow::Result<()> {
        self.check()?;
        self.inner.delete(key).await
    }
}

#[derive(Default)]
pub struct FlakySearchIndex {
    inner: MemorySearchIndex,
    failing: AtomicBool,
    queries: AtomicUsize,
}

impl FlakySearchIndex {
    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn document(
        &self,
        collection: &str,
        id: &str,
    ) -> Option<::serde_json::Value> {
        self.inner.document(collection, id).await
    }

    /// Number of queries that reached the index.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check(&self) -> ::anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(injected("search"))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl SearchIndex for FlakySearchIndex {
    async fn index(
        &self,
        collection: &str,
        id: &str,
        document: &::serde_json::Value,
    ) -> ::anyhow::Result<()> {
        self.check()?;
        self.inner.index(collection, id, document).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        document: &::serde_json::Value,
    ) -> ::anyhow::Result<()> {
        self.check()?;
        self.inner.update(collection, id, document).await
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> ::anyhow::Result<SearchResult> {
        self.check()?;
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(collection, query).await
    }
}

pub struct FlakyCache {
    inner: MemoryProvider,
    failing: AtomicBool,
}

impl Default for FlakyCache {
    fn default() -> Self {
        Self {
            inner: MemoryProvider::new(
                ::std::num::NonZeroUsize::new(4096).unwrap(),
            ),
            failing: AtomicBool::new(false),
        }
    }
}

impl FlakyCache {
    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn keys(&self) -> Vec<String> {
        self.inner.keys().await
    }

    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .await
            .into_iter()
            .filter(|x| x.starts_with(prefix))
            .collect()
    }

    fn check(&self) -> ::anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(injected("cache"))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl CacheStore for FlakyCache {
    async fn get(&self, key: &str) -> ::anyhow::Result<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<::std::time::Duration>,
    ) -> ::anyhow::Result<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> ::anyhow::Result<()> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn delete_by_prefix(&self, prefix: &str) -> ::anyhow::Result<u64> {
        self.check()?;
        self.inner.delete_by_prefix(prefix).await
    }
}

/// Every collaborator of the core, wired in memory, with typed handles
/// kept for failure injection and inspection.
pub struct Harness {
    pub stores: Stores,
    pub records: Arc<FlakyRecordStore>,
    pub ledger: Arc<FlakyLedger>,
    pub search: Arc<FlakySearchIndex>,
    pub cache: Arc<FlakyCache>,
    pub users: Arc<MemoryUserDirectory>,
    pub notifier: Arc<RecordingNotifier>,
    pub settings: SyncSettings,
    pub canonicalizer: Arc<Canonicalizer>,
    pub metrics: Arc<::cadence::StatsdClient>,
}

impl Harness {
    pub fn new() -> Harness {
        Harness::with_settings(SyncSettings::default())
    }

    pub fn with_settings(settings: SyncSettings) -> Harness {
        let records = Arc::new(FlakyRecordStore::default());
        let ledger = Arc::new(FlakyLedger::default());
        let search = Arc::new(FlakySearchIndex::default());
        let cache = Arc::new(FlakyCache::default());
        let users = Arc::new(MemoryUserDirectory::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let stores = Stores {
            records: records.clone(),
            ledger: ledger.clone(),
            search: search.clone(),
            cache: cache.clone(),
            users: users.clone(),
            notifier: notifier.clone(),
        };

        let canonicalizer = Arc::new(Canonicalizer::with_default_shapes(
            settings.feed_page_size,
            TEST_CACHE_KEY,
        ));

        Harness {
            stores,
            records,
            ledger,
            search,
            cache,
            users,
            notifier,
            settings,
            canonicalizer,
            metrics: Arc::new(crate::metrics::make_nop_client()),
        }
    }

    pub async fn add_user(&self, id: &str, display_name: &str) {
        self.users
            .insert(UserSummary {
                id: UserId::from(id),
                display_name: display_name.to_string(),
                avatar_url: None,
            })
            .await;
    }

    pub fn counters(&self) -> CounterAggregator {
        CounterAggregator::new(self.stores.clone())
    }

    pub fn prewarmer(&self) -> Prewarmer {
        Prewarmer::new(
            self.stores.clone(),
            self.canonicalizer.clone(),
            self.settings.clone(),
        )
    }

    pub fn synchronizer(&self) -> Synchronizer {
        Synchronizer::new(
            self.stores.clone(),
            self.canonicalizer.clone(),
            self.settings.clone(),
            TextAnalyzer::new(&["darn".to_string()]).unwrap(),
            self.metrics.clone(),
        )
    }

    pub fn reader(&self) -> Reader {
        Reader::new(
            self.stores.clone(),
            self.canonicalizer.clone(),
            self.settings.clone(),
        )
    }

    pub fn service(&self) -> AgoraService {
        AgoraService::new(
            self.synchronizer(),
            self.reader(),
            Arc::new(HmacTokenVerifier::new(TEST_TOKEN_KEY)),
        )
    }

    pub fn token(&self, identity: &Identity) -> String {
        HmacTokenVerifier::new(TEST_TOKEN_KEY)
            .sign(identity, ::chrono::Duration::minutes(10))
            .unwrap()
    }

    pub async fn entity(&self, id: &EntityId) -> Entity {
        self.stores.records.get(id).await.unwrap().unwrap()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Harness::new()
    }
}
