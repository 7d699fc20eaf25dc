use ::agora_protocol::model::ids::CommunityId;

pub(crate) async fn handler(
    community: String,
    state: ::std::sync::Arc<crate::State>,
    authorization: Option<String>,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    let response = state
        .service
        .report_stats(authorization.as_deref(), &CommunityId::new(community))
        .await;

    Ok(super::util::reply(response))
}
