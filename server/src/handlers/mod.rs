use ::agora_protocol::model::ids::EntityId;
use ::std::sync::Arc;
use ::warp::Filter;

mod bookmark;
mod delete_entity;
mod get_bookmarks;
mod get_children;
mod get_entity;
mod get_feed;
mod get_health;
mod get_moderation_queue;
mod get_report_stats;
mod membership;
mod post_entity;
mod post_moderate;
mod post_query;
mod post_report;
mod post_vote;
mod put_entity;
pub(crate) mod util;

fn with_state(
    state: Arc<crate::State>,
) -> impl Filter<Extract = (Arc<crate::State>,), Error = ::std::convert::Infallible>
       + Clone {
    ::warp::any().map(move || state.clone())
}

fn authorization(
) -> impl Filter<Extract = (Option<String>,), Error = ::warp::Rejection> + Clone
{
    ::warp::header::optional::<String>("authorization")
}

pub fn create_routes(
    state: Arc<crate::State>,
) -> impl Filter<Extract = (impl ::warp::Reply,), Error = ::std::convert::Infallible>
       + Clone {
    let cors = ::warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(&[
            ::warp::http::Method::GET,
            ::warp::http::Method::POST,
            ::warp::http::Method::PUT,
            ::warp::http::Method::DELETE,
        ]);

    let health = ::warp::get()
        .and(::warp::path!("health"))
        .and(with_state(state.clone()))
        .and_then(get_health::handler);

    let post_entity = ::warp::post()
        .and(::warp::path!("entities"))
        .and(with_state(state.clone()))
        .and(authorization())
        .and(::warp::body::json())
        .and_then(post_entity::handler);

    let get_entity = ::warp::get()
        .and(::warp::path!("entities" / EntityId))
        .and(with_state(state.clone()))
        .and_then(get_entity::handler);

    let put_entity = ::warp::put()
        .and(::warp::path!("entities" / EntityId))
        .and(with_state(state.clone()))
        .and(authorization())
        .and(::warp::body::json())
        .and_then(put_entity::handler);

    let delete_entity = ::warp::delete()
        .and(::warp::path!("entities" / EntityId))
        .and(with_state(state.clone()))
        .and(authorization())
        .and_then(delete_entity::handler);

    let get_children = ::warp::get()
        .and(::warp::path!("entities" / EntityId / "children"))
        .and(with_state(state.clone()))
        .and(::warp::query::<util::PageQuery>())
        .and_then(get_children::handler);

    let post_vote = ::warp::post()
        .and(::warp::path!("entities" / EntityId / "vote"))
        .and(with_state(state.clone()))
        .and(authorization())
        .and(::warp::body::json())
        .and_then(post_vote::handler);

    let post_report = ::warp::post()
        .and(::warp::path!("entities" / EntityId / "report"))
        .and(with_state(state.clone()))
        .and(authorization())
        .and_then(post_report::handler);

    let post_moderate = ::warp::post()
        .and(::warp::path!("entities" / EntityId / "moderate"))
        .and(with_state(state.clone()))
        .and(authorization())
        .and(::warp::body::json())
        .and_then(post_moderate::handler);

    let bookmark = ::warp::path!("entities" / EntityId / "bookmark")
        .and(::warp::post().or(::warp::delete()).unify())
        .and(::warp::method())
        .and(with_state(state.clone()))
        .and(authorization())
        .and_then(bookmark::handler);

    let get_bookmarks = ::warp::get()
        .and(::warp::path!("bookmarks"))
        .and(with_state(state.clone()))
        .and(authorization())
        .and(::warp::query::<get_bookmarks::Query>())
        .and_then(get_bookmarks::handler);

    let membership = ::warp::path!("communities" / String / "membership")
        .and(::warp::post().or(::warp::delete()).unify())
        .and(::warp::method())
        .and(with_state(state.clone()))
        .and(authorization())
        .and_then(membership::handler);

    let community_feed = ::warp::get()
        .and(::warp::path!("communities" / String / "feed"))
        .and(with_state(state.clone()))
        .and(::warp::query::<get_feed::Query>())
        .and_then(get_feed::community_handler);

    let global_feed = ::warp::get()
        .and(::warp::path!("feed"))
        .and(with_state(state.clone()))
        .and(::warp::query::<util::PageQuery>())
        .and_then(get_feed::global_handler);

    let moderation_queue = ::warp::get()
        .and(::warp::path!("communities" / String / "moderation_queue"))
        .and(with_state(state.clone()))
        .and(authorization())
        .and(::warp::query::<util::PageQuery>())
        .and_then(get_moderation_queue::handler);

    let report_stats = ::warp::get()
        .and(::warp::path!("communities" / String / "report_stats"))
        .and(with_state(state.clone()))
        .and(authorization())
        .and_then(get_report_stats::handler);

    let post_query = ::warp::post()
        .and(::warp::path!("query"))
        .and(with_state(state))
        .and(authorization())
        .and(::warp::body::json())
        .and_then(post_query::handler);

    health
        .or(post_entity)
        .or(get_entity)
        .or(put_entity)
        .or(delete_entity)
        .or(get_children)
        .or(post_vote)
        .or(post_report)
        .or(post_moderate)
        .or(bookmark)
        .or(get_bookmarks)
        .or(membership)
        .or(community_feed)
        .or(global_feed)
        .or(moderation_queue)
        .or(report_stats)
        .or(post_query)
        .with(cors)
        .recover(util::handle_rejection)
}
