use ::agora_protocol::model::entity::EntityKind;

#[derive(::serde::Deserialize)]
pub(crate) struct Query {
    #[serde(rename = "type", default = "default_kind")]
    kind: EntityKind,
    #[serde(default = "super::util::first_page")]
    page: u32,
}

fn default_kind() -> EntityKind {
    EntityKind::Question
}

pub(crate) async fn handler(
    state: ::std::sync::Arc<crate::State>,
    authorization: Option<String>,
    query: Query,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    let response = state
        .service
        .bookmarks(authorization.as_deref(), query.kind, query.page)
        .await;

    Ok(super::util::reply(response))
}
