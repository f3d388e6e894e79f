//! End-to-end tests driving the HTTP router against the in-memory store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use reviewer_server::api::REQUEST_ID_HEADER;
use reviewer_server::metrics::ReviewCounters;
use reviewer_server::repository::InMemoryStore;
use reviewer_server::{router, AppState};

struct TestResponse {
    status: StatusCode,
    body: Value,
    request_id: Option<String>,
}

fn app() -> Router {
    let state = AppState::new(Arc::new(InMemoryStore::new()), Arc::new(ReviewCounters::new()));
    router(Arc::new(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> TestResponse {
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    TestResponse {
        status,
        body,
        request_id,
    }
}

async fn post(app: &Router, uri: &str, body: Value) -> TestResponse {
    send(app, "POST", uri, Some(body)).await
}

async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, "GET", uri, None).await
}

fn member(id: &str, active: bool) -> Value {
    json!({"user_id": id, "username": id.to_uppercase(), "is_active": active})
}

async fn add_team(app: &Router, name: &str, members: Vec<Value>) -> TestResponse {
    post(app, "/team/add", json!({"team_name": name, "members": members})).await
}

async fn create_pr(app: &Router, id: &str, author: &str) -> TestResponse {
    post(
        app,
        "/pullRequest/create",
        json!({"pull_request_id": id, "pull_request_name": "Test", "author_id": author}),
    )
    .await
}

async fn reassign(app: &Router, id: &str, old: &str) -> TestResponse {
    post(
        app,
        "/pullRequest/reassign",
        json!({"pull_request_id": id, "old_user_id": old}),
    )
    .await
}

fn assert_error(response: &TestResponse, status: StatusCode, code: &str) {
    assert_eq!(response.status, status, "body: {}", response.body);
    assert_eq!(response.body["error"]["code"], code, "body: {}", response.body);
    assert!(response.body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_full_review_lifecycle() {
    let app = app();

    let team = add_team(
        &app,
        "t",
        vec![member("u1", true), member("u2", true), member("u3", true)],
    )
    .await;
    assert_eq!(team.status, StatusCode::CREATED);
    assert_eq!(team.body["team"]["team_name"], "t");
    assert_eq!(team.body["team"]["members"].as_array().unwrap().len(), 3);

    // Author excluded, both teammates assigned.
    let created = create_pr(&app, "pr1", "u1").await;
    assert_eq!(created.status, StatusCode::CREATED);
    let pr = &created.body["pr"];
    assert_eq!(pr["pull_request_id"], "pr1");
    assert_eq!(pr["status"], "OPEN");
    assert_eq!(pr["assigned_reviewers"], json!(["u2", "u3"]));
    assert!(pr["createdAt"].is_string());
    assert!(pr.get("mergedAt").is_none());

    // Nobody left but the author.
    let rejected = reassign(&app, "pr1", "u2").await;
    assert_error(&rejected, StatusCode::CONFLICT, "NO_CANDIDATE");

    // Members of other teams are not candidates.
    let elsewhere = add_team(&app, "t2", vec![member("u4", true)]).await;
    assert_eq!(elsewhere.status, StatusCode::CREATED);
    assert_error(
        &reassign(&app, "pr1", "u2").await,
        StatusCode::CONFLICT,
        "NO_CANDIDATE",
    );

    // u2 moves to a team with a free member, who takes over.
    let other = add_team(&app, "t3", vec![member("u2", true), member("u5", true)]).await;
    assert_eq!(other.status, StatusCode::CREATED);
    let swapped = reassign(&app, "pr1", "u2").await;
    assert_eq!(swapped.status, StatusCode::OK, "body: {}", swapped.body);
    assert_eq!(swapped.body["replaced_by"], "u5");
    assert_eq!(swapped.body["pr"]["assigned_reviewers"], json!(["u3", "u5"]));

    // Merge twice: same state both times.
    let merged = post(&app, "/pullRequest/merge", json!({"pull_request_id": "pr1"})).await;
    assert_eq!(merged.status, StatusCode::OK);
    assert_eq!(merged.body["pr"]["status"], "MERGED");
    assert!(merged.body["pr"]["mergedAt"].is_string());

    let again = post(&app, "/pullRequest/merge", json!({"pull_request_id": "pr1"})).await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.body, merged.body);

    // Merged pull requests are frozen.
    assert_error(
        &reassign(&app, "pr1", "u3").await,
        StatusCode::CONFLICT,
        "PR_MERGED",
    );

    let reviews = get(&app, "/users/getReview?user_id=u3").await;
    assert_eq!(reviews.status, StatusCode::OK);
    assert_eq!(
        reviews.body,
        json!({
            "user_id": "u3",
            "pull_requests": [{
                "pull_request_id": "pr1",
                "pull_request_name": "Test",
                "author_id": "u1",
                "status": "MERGED"
            }]
        })
    );

    let metrics = get(&app, "/metrics").await;
    assert_eq!(metrics.body["pull_requests_created"], 1);
    assert_eq!(metrics.body["pull_requests_merged"], 1);
    assert_eq!(metrics.body["reassignments"]["no_candidate"], 2);
    assert_eq!(metrics.body["reassignments"]["success"], 1);
    assert_eq!(metrics.body["reassignments"]["pr_merged"], 1);
}

#[tokio::test]
async fn test_reassign_with_new_teammate() {
    let app = app();
    add_team(
        &app,
        "t",
        vec![member("u1", true), member("u2", true), member("u3", true)],
    )
    .await;
    create_pr(&app, "pr1", "u1").await;

    // Re-registering the team is refused, so the newcomer joins via a fresh
    // team that then takes everyone over.
    let dup = add_team(&app, "t", vec![member("u4", true)]).await;
    assert_error(&dup, StatusCode::BAD_REQUEST, "TEAM_EXISTS");

    let regroup = add_team(
        &app,
        "core",
        vec![
            member("u1", true),
            member("u2", true),
            member("u3", true),
            member("u4", true),
        ],
    )
    .await;
    assert_eq!(regroup.status, StatusCode::CREATED);

    let swapped = reassign(&app, "pr1", "u2").await;
    assert_eq!(swapped.status, StatusCode::OK, "body: {}", swapped.body);
    assert_eq!(swapped.body["replaced_by"], "u4");
    assert_eq!(swapped.body["pr"]["assigned_reviewers"], json!(["u3", "u4"]));
}

#[tokio::test]
async fn test_create_conflicts_and_missing_author() {
    let app = app();
    add_team(&app, "t", vec![member("u1", true), member("u2", true)]).await;

    assert_eq!(create_pr(&app, "pr1", "u1").await.status, StatusCode::CREATED);
    assert_error(
        &create_pr(&app, "pr1", "u2").await,
        StatusCode::CONFLICT,
        "PR_EXISTS",
    );

    let missing = create_pr(&app, "pr2", "ghost").await;
    assert_error(&missing, StatusCode::NOT_FOUND, "NOT_FOUND");
    assert_eq!(missing.body["error"]["message"], "author not found");
}

#[tokio::test]
async fn test_reassign_not_found_and_not_assigned() {
    let app = app();
    add_team(
        &app,
        "t",
        vec![
            member("u1", true),
            member("u2", true),
            member("u3", true),
            member("u4", true),
        ],
    )
    .await;
    create_pr(&app, "pr1", "u1").await;

    let missing = reassign(&app, "nope", "u2").await;
    assert_error(&missing, StatusCode::NOT_FOUND, "NOT_FOUND");
    assert_eq!(missing.body["error"]["message"], "pull request not found");

    assert_error(
        &reassign(&app, "pr1", "u4").await,
        StatusCode::CONFLICT,
        "NOT_ASSIGNED",
    );
}

#[tokio::test]
async fn test_team_and_user_lookups() {
    let app = app();
    add_team(&app, "t", vec![member("u2", false), member("u1", true)]).await;

    let team = get(&app, "/team/get?team_name=t").await;
    assert_eq!(team.status, StatusCode::OK);
    assert_eq!(
        team.body,
        json!({
            "team_name": "t",
            "members": [
                {"user_id": "u1", "username": "U1", "is_active": true},
                {"user_id": "u2", "username": "U2", "is_active": false}
            ]
        })
    );

    assert_error(
        &get(&app, "/team/get?team_name=nope").await,
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
    );

    let user = post(
        &app,
        "/users/setIsActive",
        json!({"user_id": "u2", "is_active": true}),
    )
    .await;
    assert_eq!(user.status, StatusCode::OK);
    assert_eq!(
        user.body,
        json!({"user": {"user_id": "u2", "username": "U2", "team_name": "t", "is_active": true}})
    );

    assert_error(
        &post(
            &app,
            "/users/setIsActive",
            json!({"user_id": "ghost", "is_active": true}),
        )
        .await,
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
    );

    let empty = get(&app, "/users/getReview?user_id=u1").await;
    assert_eq!(empty.body, json!({"user_id": "u1", "pull_requests": []}));
}

#[tokio::test]
async fn test_malformed_and_incomplete_requests() {
    let app = app();

    let request = Request::builder()
        .method("POST")
        .uri("/pullRequest/create")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    assert_error(
        &post(&app, "/pullRequest/create", json!({"pull_request_id": "pr1"})).await,
        StatusCode::BAD_REQUEST,
        "BAD_REQUEST",
    );
    assert_error(
        &post(&app, "/pullRequest/reassign", json!({"pull_request_id": "pr1"})).await,
        StatusCode::BAD_REQUEST,
        "BAD_REQUEST",
    );
    assert_error(
        &post(&app, "/pullRequest/merge", json!({})).await,
        StatusCode::BAD_REQUEST,
        "BAD_REQUEST",
    );
    assert_error(
        &add_team(&app, "t", vec![json!({"user_id": "u1"})]).await,
        StatusCode::BAD_REQUEST,
        "BAD_REQUEST",
    );
    assert_error(
        &get(&app, "/team/get").await,
        StatusCode::BAD_REQUEST,
        "BAD_REQUEST",
    );
    assert_error(
        &get(&app, "/users/getReview").await,
        StatusCode::BAD_REQUEST,
        "BAD_REQUEST",
    );
    assert_error(
        &get(&app, "/team/get?team_name=a&team_name=b").await,
        StatusCode::BAD_REQUEST,
        "BAD_REQUEST",
    );
    assert_error(
        &get(&app, "/users/getReview?user_id=u1&user_id=u2").await,
        StatusCode::BAD_REQUEST,
        "BAD_REQUEST",
    );

    // Nothing was registered by the rejected team request.
    assert_error(
        &get(&app, "/team/get?team_name=t").await,
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
    );
}

#[tokio::test]
async fn test_repeated_team_member_listed_once() {
    let app = app();
    let created = add_team(&app, "backend", vec![member("u1", true), member("u1", false)]).await;
    assert_eq!(created.status, StatusCode::CREATED, "body: {}", created.body);

    let team = get(&app, "/team/get?team_name=backend").await;
    assert_eq!(
        team.body["members"],
        json!([{"user_id": "u1", "username": "U1", "is_active": false}])
    );
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let app = app();
    let response = get(&app, "/pullRequest/create").await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_every_response_carries_request_id() {
    let app = app();

    let health = get(&app, "/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "healthy");

    let first = health.request_id.expect("request id header");
    assert!(uuid::Uuid::parse_str(&first).is_ok());

    let failed = get(&app, "/team/get?team_name=nope").await;
    let second = failed.request_id.expect("request id header");
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_http_requests_are_counted_by_route() {
    let app = app();
    get(&app, "/health").await;
    get(&app, "/team/get?team_name=nope").await;
    get(&app, "/team/get?team_name=nope").await;

    let metrics = get(&app, "/metrics").await;
    let requests = metrics.body["http_requests"].as_array().unwrap();
    let lookup = requests
        .iter()
        .find(|r| r["route"] == "/team/get")
        .expect("team lookups counted");
    assert_eq!(lookup["method"], "GET");
    assert_eq!(lookup["status"], 404);
    assert_eq!(lookup["count"], 2);

    assert!(lookup["duration_seconds_sum"].as_f64().unwrap() >= 0.0);
    let buckets = lookup["duration_seconds_buckets"].as_array().unwrap();
    assert_eq!(buckets.len(), 11);
    assert_eq!(buckets[0]["le"], 0.005);
    let last = buckets.last().unwrap();
    assert_eq!(last["le"], 10.0);
    assert_eq!(last["count"], 2);
}
