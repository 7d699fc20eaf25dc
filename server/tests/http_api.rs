mod common;

use ::agora_protocol::model::entity::{Entity, EntityKind};
use ::agora_protocol::model::feed::FeedPage;
use ::agora_protocol::response::ApiResponse;
use ::agora_protocol::test_utils::make_test_draft;
use ::agora_server::handlers::create_routes;
use ::agora_server::identity::Identity;

#[tokio::test]
async fn health_reports_ok_without_connections() {
    let harness = common::create_test_harness(3);
    let routes = create_routes(common::create_test_state(&harness));

    let response = ::warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn create_requires_token() {
    let harness = common::create_test_harness(3);
    let routes = create_routes(common::create_test_state(&harness));
    let draft = make_test_draft(EntityKind::Question, "C1", None);

    let response = ::warp::test::request()
        .method("POST")
        .path("/entities")
        .json(&draft)
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 401);
    let body: ApiResponse<Entity> =
        ::serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body.status, "unauthorized");
    assert!(body.result.is_none());
}

#[tokio::test]
async fn create_then_read_through_routes() {
    let harness = common::create_test_harness(3);
    let routes = create_routes(common::create_test_state(&harness));
    let token = common::bearer(&harness, &Identity::user("U1"));

    let response = ::warp::test::request()
        .method("POST")
        .path("/entities")
        .header("authorization", &token)
        .json(&make_test_draft(EntityKind::Question, "C1", None))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 201);
    let created: ApiResponse<Entity> =
        ::serde_json::from_slice(response.body()).unwrap();
    let question = created.result.unwrap();

    let response = ::warp::test::request()
        .method("GET")
        .path(&format!("/entities/{}", question.id()))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 200);

    let response = ::warp::test::request()
        .method("POST")
        .path(&format!("/entities/{}/vote", question.id()))
        .header("authorization", &token)
        .json(&::serde_json::json!({ "direction": "up" }))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 200);

    let response = ::warp::test::request()
        .method("GET")
        .path("/communities/C1/feed?page=1")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 200);
    let feed: ApiResponse<FeedPage> =
        ::serde_json::from_slice(response.body()).unwrap();
    let feed = feed.result.unwrap();
    assert_eq!(feed.total_count, 1);
    assert_eq!(feed.rows[0].entity.base().votes, 1);

    let response = ::warp::test::request()
        .method("POST")
        .path(&format!("/entities/{}/bookmark", question.id()))
        .header("authorization", &token)
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 200);

    let response = ::warp::test::request()
        .method("GET")
        .path("/bookmarks?type=question")
        .header("authorization", &token)
        .reply(&routes)
        .await;
    let bookmarks: ApiResponse<FeedPage> =
        ::serde_json::from_slice(response.body()).unwrap();
    assert_eq!(bookmarks.result.unwrap().total_count, 1);
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let harness = common::create_test_harness(3);
    let routes = create_routes(common::create_test_state(&harness));
    let token = common::bearer(&harness, &Identity::user("U1"));

    let response = ::warp::test::request()
        .method("POST")
        .path("/entities")
        .header("authorization", &token)
        .header("content-type", "application/json")
        .body("{\"type\": \"question\"}")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 400);
}
