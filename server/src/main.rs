use ::envconfig::Envconfig;
use ::log::*;
use ::std::sync::Arc;

use ::agora_server::cache::canonical::Canonicalizer;
use ::agora_server::config::Config;
use ::agora_server::identity::HmacTokenVerifier;
use ::agora_server::ledger::postgres::PostgresLedgerStore;
use ::agora_server::reads::Reader;
use ::agora_server::record::postgres::PostgresRecordStore;
use ::agora_server::search::opensearch::{prepare_indices, OpenSearchIndex};
use ::agora_server::service::AgoraService;
use ::agora_server::stores::Stores;
use ::agora_server::synchronizer::Synchronizer;
use ::agora_server::text::TextAnalyzer;
use ::agora_server::users::postgres::PostgresUserDirectory;

#[tokio::main]
async fn main() -> Result<(), Box<dyn ::std::error::Error>> {
    ::env_logger::init();

    let config = Config::init_from_env()?;

    info!("Connecting to Postgres");
    let pool = ::sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.postgres_string)
        .await?;

    let mut transaction = pool.begin().await?;
    ::agora_server::postgres::prepare_database(&mut transaction).await?;
    transaction.commit().await?;

    info!("Connecting to OpenSearch");
    let opensearch_transport =
        ::opensearch::http::transport::Transport::single_node(
            &config.opensearch_string,
        )?;
    let opensearch_client = ::opensearch::OpenSearch::new(opensearch_transport);
    prepare_indices(&opensearch_client).await?;

    info!(
        "Sending metrics to {}:{}",
        config.statsd_address, config.statsd_port
    );
    let metrics = Arc::new(::agora_server::metrics::make_udp_client(
        &config.statsd_address,
        config.statsd_port,
    )?);

    let stores = Stores {
        records: Arc::new(PostgresRecordStore::new(pool.clone())),
        ledger: Arc::new(PostgresLedgerStore::new(pool.clone())),
        search: Arc::new(OpenSearchIndex::new(opensearch_client.clone())),
        cache: ::agora_server::cache::providers::make_provider(&config)?,
        users: Arc::new(PostgresUserDirectory::new(pool.clone())),
        notifier: ::agora_server::notify::make_provider(&config)?,
    };

    let settings = config.sync_settings();
    let canonicalizer = Arc::new(Canonicalizer::with_default_shapes(
        settings.feed_page_size,
        config.cache_signing_key.as_bytes(),
    ));
    let analyzer = TextAnalyzer::new(&config.profanity_word_list())?;

    let synchronizer = Synchronizer::new(
        stores.clone(),
        canonicalizer.clone(),
        settings.clone(),
        analyzer,
        metrics,
    );
    let reader = Reader::new(stores, canonicalizer, settings);
    let verifier =
        Arc::new(HmacTokenVerifier::new(config.token_key.as_bytes()));

    let state = Arc::new(::agora_server::State {
        service: AgoraService::new(synchronizer, reader, verifier),
        pool: Some(pool),
        search: Some(opensearch_client),
    });

    let routes = ::agora_server::handlers::create_routes(state);

    info!("Listening on {}", config.http_port_api);
    ::warp::serve(routes)
        .run(([0, 0, 0, 0], config.http_port_api))
        .await;

    Ok(())
}
