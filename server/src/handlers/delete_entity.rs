use ::agora_protocol::model::ids::EntityId;

pub(crate) async fn handler(
    id: EntityId,
    state: ::std::sync::Arc<crate::State>,
    authorization: Option<String>,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    let response = state
        .service
        .delete(authorization.as_deref(), &id)
        .await;

    Ok(super::util::reply(response))
}
