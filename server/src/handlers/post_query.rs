pub(crate) async fn handler(
    state: ::std::sync::Arc<crate::State>,
    authorization: Option<String>,
    query: ::agora_protocol::query::Query,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    Ok(super::util::reply(
        state.service.query(authorization.as_deref(), query).await,
    ))
}
