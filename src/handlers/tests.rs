use super::*;
use crate::db::MemoryStorage;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request};
use serde_json::Value;
use tower::ServiceExt;

fn app() -> Router {
    router(Arc::new(PollStore::new(Arc::new(MemoryStorage::new()))))
}

fn request(method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(IDENTITY_HEADER, user);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create_color_poll(app: &Router) -> String {
    let (status, body) = send(
        app,
        request(
            Method::POST,
            "/api/polls",
            Some("user_owner"),
            Some(json!({ "title": "Color?", "options": ["Red", "Blue"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["poll"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn create_requires_identity() {
    let app = app();
    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/polls",
            None,
            Some(json!({ "title": "Color?", "options": ["Red", "Blue"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn malformed_identity_is_unauthenticated() {
    let app = app();
    let (status, _) = send(
        &app,
        request(Method::POST, "/api/polls/poll_x/vote", Some("has spaces"), Some(json!({ "optionId": "opt_0" }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_validates_options() {
    let app = app();
    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/polls",
            Some("user_owner"),
            Some(json!({ "title": "Color?", "options": ["Red", " "] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/polls", Some("user_owner"), Some(json!({ "nope": 1 }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn vote_flow_over_http() {
    let app = app();
    let poll_id = create_color_poll(&app).await;
    let vote_uri = format!("/api/polls/{}/vote", poll_id);

    let (status, body) = send(
        &app,
        request(Method::POST, &vote_uri, Some("voter_1"), Some(json!({ "optionId": "opt_0" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["poll"]["totalVotes"], 1);
    assert_eq!(body["poll"]["options"][0]["votes"], 1);

    let (status, body) = send(
        &app,
        request(Method::POST, &vote_uri, Some("voter_1"), Some(json!({ "optionId": "opt_1" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "ALREADY_VOTED");

    let (status, _) = send(&app, request(Method::POST, &vote_uri, Some("voter_2"), Some(json!({})))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        request(Method::GET, &format!("/api/polls/{}/results", poll_id), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"]["options"][0]["percentage"], 100);
    assert_eq!(body["results"]["options"][0]["leading"], true);
}

#[tokio::test]
async fn vote_identity_from_cookie() {
    let app = app();
    let poll_id = create_color_poll(&app).await;

    let req = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/polls/{}/vote", poll_id))
        .header(header::COOKIE, "theme=dark; user_id=cookie_voter")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "optionId": "opt_1" }).to_string()))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["poll"]["options"][1]["votes"], 1);
}

#[tokio::test]
async fn closing_and_ownership() {
    let app = app();
    let poll_id = create_color_poll(&app).await;
    let poll_uri = format!("/api/polls/{}", poll_id);

    let (status, body) = send(
        &app,
        request(Method::PATCH, &poll_uri, Some("user_other"), Some(json!({ "active": false }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");

    let (status, body) = send(
        &app,
        request(Method::PATCH, &poll_uri, Some("user_owner"), Some(json!({ "active": false }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["poll"]["active"], false);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            &format!("{}/vote", poll_uri),
            Some("voter_1"),
            Some(json!({ "optionId": "opt_0" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "POLL_CLOSED");

    let (status, body) = send(&app, request(Method::GET, "/api/polls?active=true", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["polls"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn list_filters_by_active_flag() {
    let app = app();
    let open_id = create_color_poll(&app).await;
    let closed_id = create_color_poll(&app).await;
    let (status, _) = send(
        &app,
        request(
            Method::PATCH,
            &format!("/api/polls/{}", closed_id),
            Some("user_owner"),
            Some(json!({ "active": false })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let ids = |body: &Value| -> Vec<String> {
        body["polls"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap().to_string())
            .collect()
    };

    let (status, body) = send(&app, request(Method::GET, "/api/polls?active=false", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![closed_id.clone()]);

    let (_, body) = send(&app, request(Method::GET, "/api/polls?active=true", None, None)).await;
    assert_eq!(ids(&body), vec![open_id.clone()]);

    let (_, body) = send(&app, request(Method::GET, "/api/polls", None, None)).await;
    assert_eq!(ids(&body), vec![open_id, closed_id]);
}

#[tokio::test]
async fn malformed_identity_cookie_is_unauthenticated() {
    let app = app();
    let poll_id = create_color_poll(&app).await;

    let req = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/polls/{}/vote", poll_id))
        .header(header::COOKIE, "user_id=not%20valid")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "optionId": "opt_1" }).to_string()))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn delete_then_get_is_404() {
    let app = app();
    let poll_id = create_color_poll(&app).await;
    let poll_uri = format!("/api/polls/{}", poll_id);

    let (status, body) = send(&app, request(Method::DELETE, &poll_uri, Some("user_owner"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(&app, request(Method::GET, &poll_uri, None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");

    let (status, body) = send(&app, request(Method::GET, "/api/polls", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["polls"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = send(&app(), request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
