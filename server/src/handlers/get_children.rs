use ::agora_protocol::model::ids::EntityId;

pub(crate) async fn handler(
    id: EntityId,
    state: ::std::sync::Arc<crate::State>,
    query: super::util::PageQuery,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    Ok(super::util::reply(
        state.service.children(&id, query.page).await,
    ))
}
