use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{self, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use todo_core::{ErrorBody, Success, Todo, TodoFilter, TodoId, TodoSort};
use todo_server::{
    app, build_router, cors_layer, AppState, Config, MemoryStore, StoreConfig, StoreError, TodoStore,
};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

async fn send(app: &Router, request: Request<String>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn create(app: &Router, body: &str) -> Todo {
    let payload = serde_json::json!({ "body": body }).to_string();
    let resp = send(app, json_request("POST", "/api/todos", &payload)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
}

async fn list(app: &Router, query: &str) -> Vec<Todo> {
    let resp = send(app, empty_request("GET", &format!("/api/todos{query}"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
}

async fn bodies(app: &Router, query: &str) -> Vec<String> {
    list(app, query).await.into_iter().map(|t| t.body).collect()
}

async fn assert_rejected(resp: axum::response::Response, message: &str) {
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.error, message);
}

fn id_of(todo: &Todo) -> TodoId {
    todo.id.expect("created todo has an id")
}

// --- list ---

#[tokio::test]
async fn list_todos_empty_is_an_empty_array() {
    let app = app(AppState::in_memory());
    let resp = send(&app, empty_request("GET", "/api/todos")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let raw: serde_json::Value = body_json(resp).await;
    assert_eq!(raw, serde_json::json!([]));
}

#[tokio::test]
async fn status_filter_round_trip() {
    let app = app(AppState::in_memory());
    let todo = create(&app, "buy milk").await;

    assert_eq!(bodies(&app, "?status=all").await, ["buy milk"]);
    assert_eq!(bodies(&app, "?status=active").await, ["buy milk"]);
    assert!(bodies(&app, "?status=completed").await.is_empty());

    let resp = send(&app, empty_request("PATCH", &format!("/api/todos/{}", id_of(&todo)))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(bodies(&app, "?status=COMPLETED").await, ["buy milk"]);
    assert!(bodies(&app, "?status=active").await.is_empty());
    assert_eq!(bodies(&app, "?status=whatever").await, ["buy milk"]);
}

#[tokio::test]
async fn search_is_case_insensitive_substring() {
    let app = app(AppState::in_memory());
    create(&app, "Buy MILK").await;
    create(&app, "walk dog").await;
    create(&app, "milkshake").await;

    let mut found = bodies(&app, "?search=milk").await;
    found.sort();
    assert_eq!(found, ["Buy MILK", "milkshake"]);
    assert_eq!(bodies(&app, "?search=%20%20").await.len(), 3);
}

#[tokio::test]
async fn search_matches_metacharacters_literally() {
    let app = app(AppState::in_memory());
    create(&app, "a.c").await;
    create(&app, "abc").await;

    assert_eq!(bodies(&app, "?search=a.c").await, ["a.c"]);
    assert!(bodies(&app, "?search=.%2A").await.is_empty());
}

#[tokio::test]
async fn sort_by_body_and_order() {
    let app = app(AppState::in_memory());
    create(&app, "banana").await;
    create(&app, "apple").await;
    create(&app, "cherry").await;

    assert_eq!(
        bodies(&app, "?sortBy=body&order=asc").await,
        ["apple", "banana", "cherry"]
    );
    assert_eq!(
        bodies(&app, "?sortBy=body&order=desc").await,
        ["cherry", "banana", "apple"]
    );
    // Unknown sort field falls back to createdAt; default order is newest first.
    let todos = list(&app, "?sortBy=priority").await;
    assert_eq!(todos.len(), 3);
    assert!(todos.windows(2).all(|w| w[0].created_at >= w[1].created_at));
}

#[tokio::test]
async fn repeated_query_keys_use_the_first_value() {
    let app = app(AppState::in_memory());
    let done = create(&app, "done").await;
    create(&app, "open").await;
    send(&app, empty_request("PATCH", &format!("/api/todos/{}", id_of(&done)))).await;

    assert_eq!(bodies(&app, "?status=active&status=completed").await, ["open"]);
    assert_eq!(bodies(&app, "?status=completed&status=active").await, ["done"]);
    assert_eq!(
        bodies(&app, "?sortBy=body&order=asc&order=desc").await,
        ["done", "open"]
    );
}

// --- create ---

#[tokio::test]
async fn create_todo_returns_201_with_trimmed_body() {
    let app = app(AppState::in_memory());
    let resp = send(&app, json_request("POST", "/api/todos", r#"{"body":"  Buy milk  "}"#)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let raw: serde_json::Value = body_json(resp).await;
    assert_eq!(raw["body"], "Buy milk");
    assert_eq!(raw["completed"], false);
    assert_eq!(raw["_id"].as_str().map(str::len), Some(24));
    assert!(raw["createdAt"].is_string());
    assert!(raw.get("updatedAt").is_none());
}

#[tokio::test]
async fn create_todo_malformed_json_is_invalid_payload() {
    let app = app(AppState::in_memory());
    let resp = send(&app, json_request("POST", "/api/todos", r#"{"body":"#)).await;
    assert_rejected(resp, "Invalid payload").await;

    let resp = send(&app, json_request("POST", "/api/todos", r#"{"body":42}"#)).await;
    assert_rejected(resp, "Invalid payload").await;
}

#[tokio::test]
async fn create_todo_rejects_empty_body() {
    let app = app(AppState::in_memory());
    for payload in [r#"{"body":""}"#, r#"{"body":"   \n\t"}"#, "{}"] {
        let resp = send(&app, json_request("POST", "/api/todos", payload)).await;
        assert_rejected(resp, "Todo body cannot be empty").await;
    }
    assert!(list(&app, "").await.is_empty());
}

#[tokio::test]
async fn create_todo_rejects_long_body() {
    let app = app(AppState::in_memory());
    let payload = serde_json::json!({ "body": "x".repeat(201) }).to_string();
    let resp = send(&app, json_request("POST", "/api/todos", &payload)).await;
    assert_rejected(resp, "Todo body must be 200 characters or less").await;
    assert!(list(&app, "").await.is_empty());

    create(&app, &"x".repeat(200)).await;
}

#[tokio::test]
async fn create_todo_rejects_case_insensitive_duplicate() {
    let app = app(AppState::in_memory());
    let original = create(&app, "Buy milk").await;

    let resp = send(&app, json_request("POST", "/api/todos", r#"{"body":" BUY MILK "}"#)).await;
    assert_rejected(resp, "A todo with the same text already exists").await;

    let todos = list(&app, "").await;
    assert_eq!(todos, vec![original]);
}

// --- update ---

#[tokio::test]
async fn update_without_payload_marks_complete() {
    let app = app(AppState::in_memory());
    let todo = create(&app, "Walk dog").await;
    let uri = format!("/api/todos/{}", id_of(&todo));

    let resp = send(&app, empty_request("PATCH", &uri)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let ok: Success = body_json(resp).await;
    assert!(ok.success);

    let stored = &list(&app, "").await[0];
    assert!(stored.completed);
    assert!(stored.updated_at.is_some());
    assert_eq!(stored.created_at, todo.created_at);
}

#[tokio::test]
async fn update_sets_explicit_value() {
    let app = app(AppState::in_memory());
    let todo = create(&app, "Walk dog").await;
    let uri = format!("/api/todos/{}", id_of(&todo));

    send(&app, json_request("PATCH", &uri, r#"{"completed":true}"#)).await;
    assert!(list(&app, "").await[0].completed);

    let resp = send(&app, json_request("PATCH", &uri, r#"{"completed":false}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!list(&app, "").await[0].completed);
}

#[tokio::test]
async fn update_with_malformed_payload_still_marks_complete() {
    let app = app(AppState::in_memory());
    let todo = create(&app, "Walk dog").await;
    let uri = format!("/api/todos/{}", id_of(&todo));

    let resp = send(&app, json_request("PATCH", &uri, "{not json")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(list(&app, "").await[0].completed);
}

#[tokio::test]
async fn update_with_oversized_payload_still_marks_complete() {
    let app = app(AppState::in_memory());
    let todo = create(&app, "Walk dog").await;
    let uri = format!("/api/todos/{}", id_of(&todo));

    let huge = " ".repeat(3 * 1024 * 1024);
    let resp = send(&app, json_request("PATCH", &uri, &huge)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(list(&app, "").await[0].completed);
}

#[tokio::test]
async fn timestamps_are_stable_at_millisecond_precision() {
    let app = app(AppState::in_memory());
    let todo = create(&app, "Walk dog").await;
    assert_eq!(todo.created_at.timestamp_subsec_nanos() % 1_000_000, 0);

    send(&app, empty_request("PATCH", &format!("/api/todos/{}", id_of(&todo)))).await;
    let stored = &list(&app, "").await[0];
    assert_eq!(stored.created_at, todo.created_at);
    let updated_at = stored.updated_at.unwrap();
    assert_eq!(updated_at.timestamp_subsec_nanos() % 1_000_000, 0);
}

#[tokio::test]
async fn update_unknown_id_succeeds_without_effect() {
    let app = app(AppState::in_memory());
    create(&app, "Walk dog").await;

    let resp = send(&app, empty_request("PATCH", "/api/todos/000000000000000000000000")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!list(&app, "").await[0].completed);
}

// --- delete ---

#[tokio::test]
async fn delete_removes_todo_and_is_idempotent() {
    let app = app(AppState::in_memory());
    let keep = create(&app, "keep").await;
    let gone = create(&app, "gone").await;
    let uri = format!("/api/todos/{}", id_of(&gone));

    for _ in 0..2 {
        let resp = send(&app, empty_request("DELETE", &uri)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let ok: Success = body_json(resp).await;
        assert!(ok.success);
    }
    assert_eq!(list(&app, "").await, vec![keep]);
}

// --- failing stores ---

/// Fails every call, so any 500 proves the store was reached.
struct BrokenStore;

#[async_trait]
impl TodoStore for BrokenStore {
    async fn list(&self, _: &TodoFilter, _: TodoSort) -> Result<Vec<Todo>, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
    async fn body_exists(&self, _: &str) -> Result<bool, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
    async fn insert(&self, _: &Todo) -> Result<TodoId, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
    async fn set_completed(&self, _: TodoId, _: bool, _: DateTime<Utc>) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
    async fn delete(&self, _: TodoId) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

/// In-memory store whose duplicate lookup always fails.
struct FlakyLookupStore(MemoryStore);

#[async_trait]
impl TodoStore for FlakyLookupStore {
    async fn list(&self, filter: &TodoFilter, sort: TodoSort) -> Result<Vec<Todo>, StoreError> {
        self.0.list(filter, sort).await
    }
    async fn body_exists(&self, _: &str) -> Result<bool, StoreError> {
        Err(StoreError::Backend("lookup failed".to_string()))
    }
    async fn insert(&self, todo: &Todo) -> Result<TodoId, StoreError> {
        self.0.insert(todo).await
    }
    async fn set_completed(&self, id: TodoId, completed: bool, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.0.set_completed(id, completed, at).await
    }
    async fn delete(&self, id: TodoId) -> Result<(), StoreError> {
        self.0.delete(id).await
    }
}

/// Never answers within any reasonable deadline.
struct StalledStore;

#[async_trait]
impl TodoStore for StalledStore {
    async fn list(&self, _: &TodoFilter, _: TodoSort) -> Result<Vec<Todo>, StoreError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
    async fn body_exists(&self, _: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
    async fn insert(&self, _: &Todo) -> Result<TodoId, StoreError> {
        Ok(TodoId::from_bytes([0; 12]))
    }
    async fn set_completed(&self, _: TodoId, _: bool, _: DateTime<Utc>) -> Result<(), StoreError> {
        Ok(())
    }
    async fn delete(&self, _: TodoId) -> Result<(), StoreError> {
        Ok(())
    }
}

fn broken_app() -> Router {
    app(AppState::new(Arc::new(BrokenStore), Duration::from_secs(1)))
}

async fn assert_server_error(resp: axum::response::Response, message: &str) {
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.error, message);
}

#[tokio::test]
async fn invalid_ids_are_rejected_before_the_store() {
    let app = broken_app();
    for uri in [
        "/api/todos/not-an-id",
        "/api/todos/12345",
        "/api/todos/zzzzzzzzzzzzzzzzzzzzzzzz",
        "/api/todos/%FF",
    ] {
        assert_rejected(send(&app, empty_request("PATCH", uri)).await, "Invalid todo ID").await;
        assert_rejected(send(&app, empty_request("DELETE", uri)).await, "Invalid todo ID").await;
    }
}

#[tokio::test]
async fn store_errors_are_structured_500s() {
    let app = broken_app();
    let id = "65a1f0c2e4b0a1b2c3d4e5f6";

    assert_server_error(send(&app, empty_request("GET", "/api/todos")).await, "connection refused").await;
    assert_server_error(
        send(&app, json_request("POST", "/api/todos", r#"{"body":"x"}"#)).await,
        "connection refused",
    )
    .await;
    assert_server_error(
        send(&app, empty_request("PATCH", &format!("/api/todos/{id}"))).await,
        "connection refused",
    )
    .await;
    assert_server_error(
        send(&app, empty_request("DELETE", &format!("/api/todos/{id}"))).await,
        "connection refused",
    )
    .await;
}

#[tokio::test]
async fn failed_duplicate_check_does_not_block_create() {
    let store = FlakyLookupStore(MemoryStore::new());
    let app = app(AppState::new(Arc::new(store), Duration::from_secs(1)));

    let todo = create(&app, "Buy milk").await;
    assert_eq!(todo.body, "Buy milk");

    // The store itself still refuses the duplicate on insert.
    let resp = send(&app, json_request("POST", "/api/todos", r#"{"body":"buy milk"}"#)).await;
    assert_rejected(resp, "A todo with the same text already exists").await;
}

#[tokio::test]
async fn slow_store_calls_time_out() {
    let app = app(AppState::new(Arc::new(StalledStore), Duration::from_millis(20)));
    assert_server_error(
        send(&app, empty_request("GET", "/api/todos")).await,
        "store operation timed out",
    )
    .await;
}

// --- cors ---

#[tokio::test]
async fn cors_admits_only_the_configured_origin() {
    let app = app(AppState::in_memory()).layer(cors_layer("http://localhost:5173").unwrap());

    let preflight = |origin: &str| {
        Request::builder()
            .method("OPTIONS")
            .uri("/api/todos")
            .header(http::header::ORIGIN, origin)
            .header(http::header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
            .body(String::new())
            .unwrap()
    };

    let resp = send(&app, preflight("http://localhost:5173")).await;
    assert_eq!(
        resp.headers()
            .get(http::header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:5173"
    );
    let methods = resp
        .headers()
        .get(http::header::ACCESS_CONTROL_ALLOW_METHODS)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("PATCH"));
    assert!(methods.contains("DELETE"));
    assert_eq!(allowed_headers(&resp), ["accept", "content-type", "origin"]);

    let resp = send(&app, preflight("http://evil.example")).await;
    assert!(resp
        .headers()
        .get(http::header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

fn allowed_headers(resp: &axum::response::Response) -> Vec<String> {
    let mut headers: Vec<String> = resp
        .headers()
        .get(http::header::ACCESS_CONTROL_ALLOW_HEADERS)
        .expect("preflight lists allowed headers")
        .to_str()
        .unwrap()
        .split(',')
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();
    headers.sort();
    headers
}

// --- production router ---

fn config(production: bool, static_dir: &std::path::Path) -> Config {
    Config {
        port: 0,
        production,
        store: StoreConfig::Memory,
        cors_origin: "http://localhost:5173".to_string(),
        static_dir: static_dir.to_path_buf(),
        store_timeout: Duration::from_secs(1),
        log_json: false,
    }
}

fn static_site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>todos</h1>").unwrap();
    dir
}

#[tokio::test]
async fn production_router_serves_static_assets() {
    let dir = static_site();
    let router = build_router(AppState::in_memory(), &config(true, dir.path())).unwrap();

    let resp = send(&router, empty_request("GET", "/index.html")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"<h1>todos</h1>");

    // The API still takes precedence over the static fallback.
    assert!(list(&router, "").await.is_empty());
}

#[tokio::test]
async fn development_router_does_not_serve_static_assets() {
    let dir = static_site();
    let router = build_router(AppState::in_memory(), &config(false, dir.path())).unwrap();

    let resp = send(&router, empty_request("GET", "/index.html")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn built_router_applies_cors_policy() {
    let dir = static_site();
    let router = build_router(AppState::in_memory(), &config(false, dir.path())).unwrap();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/todos")
        .header(http::header::ORIGIN, "http://localhost:5173")
        .header(http::header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(String::new())
        .unwrap();
    let resp = send(&router, request).await;
    assert_eq!(
        resp.headers()
            .get(http::header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:5173"
    );
    assert_eq!(allowed_headers(&resp), ["accept", "content-type", "origin"]);
}

#[test]
fn invalid_cors_origin_is_a_startup_error() {
    let dir = static_site();
    let mut bad = config(false, dir.path());
    bad.cors_origin = "http://bad\norigin".to_string();
    assert!(build_router(AppState::in_memory(), &bad).is_err());
}
