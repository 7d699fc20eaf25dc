use ::agora_protocol::model::{ids::EntityId, payload::EntityPatch};

pub(crate) async fn handler(
    id: EntityId,
    state: ::std::sync::Arc<crate::State>,
    authorization: Option<String>,
    patch: EntityPatch,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    let response = state
        .service
        .update(authorization.as_deref(), &id, patch)
        .await;

    Ok(super::util::reply(response))
}
