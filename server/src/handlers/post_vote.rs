use ::agora_protocol::model::{ids::EntityId, payload::VoteRequest};

pub(crate) async fn handler(
    id: EntityId,
    state: ::std::sync::Arc<crate::State>,
    authorization: Option<String>,
    request: VoteRequest,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    let response = state
        .service
        .vote(authorization.as_deref(), &id, request.direction)
        .await;

    Ok(super::util::reply(response))
}
