use ::agora_protocol::model::ids::CommunityId;

pub(crate) async fn handler(
    community: String,
    state: ::std::sync::Arc<crate::State>,
    authorization: Option<String>,
    query: super::util::PageQuery,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    let response = state
        .service
        .moderation_queue(
            authorization.as_deref(),
            &CommunityId::new(community),
            query.page,
        )
        .await;

    Ok(super::util::reply(response))
}
