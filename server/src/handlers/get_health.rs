use ::warp::reply::Response;
use ::warp::{http::StatusCode, Reply};

/// Checks database and OpenSearch connectivity when configured. Returns 200
/// if all subsystems are healthy, otherwise 503.
pub(crate) async fn handler(
    state: ::std::sync::Arc<crate::State>,
) -> Result<Response, ::std::convert::Infallible> {
    use ::serde_json::json;
    use ::tokio::time::{timeout, Duration};

    let db_ok = match &state.pool {
        Some(pool) => timeout(Duration::from_secs(2), async {
            ::sqlx::query_scalar::<_, i32>("SELECT 1")
                .fetch_one(pool)
                .await
                .is_ok()
        })
        .await
        .unwrap_or(false),
        None => true,
    };

    let os_ok = match &state.search {
        Some(search) => timeout(Duration::from_secs(2), async {
            use ::opensearch::indices::IndicesExistsParts;
            search
                .indices()
                .exists(IndicesExistsParts::Index(&[
                    ::agora_protocol::model::entity::EntityKind::Question
                        .collection(),
                ]))
                .send()
                .await
                .map(|resp| resp.status_code().is_success())
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false),
        None => true,
    };

    let overall_ok = db_ok && os_ok;

    let body = json!({
        "db": db_ok,
        "opensearch": os_ok,
        "status": if overall_ok { "ok" } else { "degraded" }
    });

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok(
        ::warp::reply::with_status(::warp::reply::json(&body), status)
            .into_response(),
    )
}
