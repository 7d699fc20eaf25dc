use ::agora_protocol::model::ids::CommunityId;

#[derive(::serde::Deserialize)]
pub(crate) struct Query {
    #[serde(default = "super::util::first_page")]
    page: u32,
    #[serde(default)]
    documents: bool,
}

pub(crate) async fn community_handler(
    community: String,
    state: ::std::sync::Arc<crate::State>,
    query: Query,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    let response = state
        .service
        .community_feed(&CommunityId::new(community), query.page, query.documents)
        .await;

    Ok(super::util::reply(response))
}

pub(crate) async fn global_handler(
    state: ::std::sync::Arc<crate::State>,
    query: super::util::PageQuery,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    Ok(super::util::reply(
        state.service.global_feed(query.page).await,
    ))
}
