use ::agora_protocol::model::payload::EntityDraft;

pub(crate) async fn handler(
    state: ::std::sync::Arc<crate::State>,
    authorization: Option<String>,
    draft: EntityDraft,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    let response = state
        .service
        .create(authorization.as_deref(), draft)
        .await;

    Ok(super::util::reply(response))
}
