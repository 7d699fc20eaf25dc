use crate::cache::providers::interface::CacheStore;
use crate::ledger::LedgerStore;
use crate::notify::Notifier;
use crate::record::RecordStore;
use crate::search::SearchIndex;
use crate::users::UserDirectory;
use ::std::sync::Arc;

/// The independently failing collaborators the core writes through.
#[derive(Clone)]
pub struct Stores {
    pub records: Arc<dyn RecordStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub search: Arc<dyn SearchIndex>,
    pub cache: Arc<dyn CacheStore>,
    pub users: Arc<dyn UserDirectory>,
    pub notifier: Arc<dyn Notifier>,
}
