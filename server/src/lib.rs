pub mod cache;
pub mod config;
pub mod counts;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod identity;
pub mod ledger;
pub mod metrics;
pub mod mirror;
pub mod moderation;
pub mod notify;
pub mod postgres;
pub mod prewarm;
pub mod reads;
pub mod record;
pub mod search;
pub mod service;
pub mod stores;
pub mod synchronizer;
pub mod test_utils;
pub mod text;
pub mod users;

/// Shared by every HTTP handler. The connections are only used for health
/// reporting and are absent when running on in-memory stores.
pub struct State {
    pub service: service::AgoraService,
    pub pool: Option<::sqlx::PgPool>,
    pub search: Option<::opensearch::OpenSearch>,
}
