//! HTTP API tests driven through the router without a socket

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use engagement_sync::api::create_router;
use engagement_sync::types::Topic;
use engagement_sync::{AppState, SyncConfig};

fn setup() -> (Arc<AppState>, Router) {
    let state = Arc::new(AppState::new(SyncConfig::default()));
    let router = create_router(Arc::clone(&state));
    (state, router)
}

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn seed(router: &Router) {
    let (status, _) = call(
        router,
        Method::POST,
        "/api/contents",
        Some(json!({"id": "C1", "authorId": "author"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        router,
        Method::POST,
        "/api/comments",
        Some(json!({"id": "K1", "contentId": "C1", "authorId": "bob", "body": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_comment_created_returns_counts_and_event_id() {
    let (state, router) = setup();
    seed(&router).await;

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/comments",
        Some(json!({
            "id": "R1",
            "contentId": "C1",
            "parentCommentId": "K1",
            "authorId": "carol",
            "body": "hi back"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "applied");
    assert_eq!(body["data"]["parentCommentId"], "K1");
    assert_eq!(body["data"]["eventId"], json!(state.current_event_id()));
    assert_eq!(body["lastEventId"], json!(state.current_event_id()));
}

#[tokio::test]
async fn test_repeated_comment_is_already_processed() {
    let (_state, router) = setup();
    seed(&router).await;

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/comments",
        Some(json!({"id": "K1", "contentId": "C1", "authorId": "bob", "body": "hello"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "already_processed");
    assert!(body["data"].get("eventId").is_none());
}

#[tokio::test]
async fn test_like_then_snapshot_reflects_viewer() {
    let (_state, router) = setup();
    seed(&router).await;

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/likes",
        Some(json!({"subjectType": "content", "subjectId": "C1", "actorId": "alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["likesCount"], 1);
    assert_eq!(body["data"]["isLiked"], true);

    let (status, body) = call(&router, Method::GET, "/api/contents/C1?viewer=alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"]["likesCount"], 1);
    assert_eq!(body["data"]["content"]["commentsCount"], 1);
    assert_eq!(body["data"]["isLiked"], true);
    assert_eq!(body["data"]["comments"][0]["id"], "K1");

    let (_, body) = call(&router, Method::GET, "/api/contents/C1?viewer=dave", None).await;
    assert_eq!(body["data"]["isLiked"], false);
}

#[tokio::test]
async fn test_bookmark_assignment_is_idempotent() {
    let (_state, router) = setup();
    seed(&router).await;

    let request = json!({"contentId": "C1", "actorId": "alice", "bookmarked": true});
    let (_, first) = call(&router, Method::POST, "/api/bookmarks", Some(request.clone())).await;
    let (status, second) = call(&router, Method::POST, "/api/bookmarks", Some(request)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["outcome"], "applied");
    assert_eq!(second["data"]["outcome"], "already_processed");
    assert_eq!(second["data"]["bookmarksCount"], 1);
}

#[tokio::test]
async fn test_empty_actor_is_rejected() {
    let (_state, router) = setup();
    seed(&router).await;

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/likes",
        Some(json!({"subjectType": "comment", "subjectId": "K1", "actorId": " "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_delete_cascades_and_blocks_late_replies() {
    let (state, router) = setup();
    seed(&router).await;
    let (conn, mut rx) = state.registry().connect(8);
    conn.subscribe(Topic::thread("K1")).unwrap();

    let (status, body) = call(&router, Method::DELETE, "/api/comments/K1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deletedIds"], json!(["K1"]));
    assert_eq!(body["data"]["commentsCount"], 0);

    let delivery = rx.recv().await.unwrap();
    assert_eq!(delivery.envelope.event.kind(), "comment.deleted");

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/comments",
        Some(json!({
            "id": "R9",
            "contentId": "C1",
            "parentCommentId": "K1",
            "authorId": "carol",
            "body": "too late"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "PARENT_DELETED");

    let (status, _) = call(&router, Method::GET, "/api/comments/K1/thread", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reply_to_reply_is_rejected() {
    let (_state, router) = setup();
    seed(&router).await;

    let reply = |id: &str, parent: &str| {
        json!({
            "id": id,
            "contentId": "C1",
            "parentCommentId": parent,
            "authorId": "carol",
            "body": "nested"
        })
    };
    let (status, _) = call(&router, Method::POST, "/api/comments", Some(reply("R1", "K1"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&router, Method::POST, "/api/comments", Some(reply("R2", "R1"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NESTED_REPLY");

    let (status, body) = call(&router, Method::GET, "/api/comments/K1/thread", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["parent"]["repliesCount"], 1);
    assert_eq!(body["data"]["replies"][0]["id"], "R1");
}

#[tokio::test]
async fn test_stats_counts_live_connections() {
    let (state, router) = setup();
    let (conn, _rx) = state.registry().connect(4);
    conn.subscribe(Topic::content("C1")).unwrap();

    let (status, body) = call(&router, Method::GET, "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connections"], 1);
    assert_eq!(body["topics"], 1);
}
