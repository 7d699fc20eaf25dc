use ::agora_protocol::model::ids::CommunityId;

/// POST joins the community, DELETE leaves it.
pub(crate) async fn handler(
    community: String,
    method: ::warp::http::Method,
    state: ::std::sync::Arc<crate::State>,
    authorization: Option<String>,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    let active = method != ::warp::http::Method::DELETE;

    let response = state
        .service
        .membership(
            authorization.as_deref(),
            &CommunityId::new(community),
            active,
        )
        .await;

    Ok(super::util::reply(response))
}
