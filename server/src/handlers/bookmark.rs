use ::agora_protocol::model::ids::EntityId;

/// POST sets the bookmark, DELETE clears it.
pub(crate) async fn handler(
    id: EntityId,
    method: ::warp::http::Method,
    state: ::std::sync::Arc<crate::State>,
    authorization: Option<String>,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    let active = method != ::warp::http::Method::DELETE;

    let response = state
        .service
        .bookmark(authorization.as_deref(), &id, active)
        .await;

    Ok(super::util::reply(response))
}
