use ::agora_protocol::model::{ids::EntityId, payload::ModerationRequest};

pub(crate) async fn handler(
    id: EntityId,
    state: ::std::sync::Arc<crate::State>,
    authorization: Option<String>,
    request: ModerationRequest,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    let response = state
        .service
        .moderate(authorization.as_deref(), &id, request.action)
        .await;

    Ok(super::util::reply(response))
}
