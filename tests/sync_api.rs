use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use room_editor_sync::config::Environment;
use room_editor_sync::routes::create_app;
use room_editor_sync::{DocumentSummary, Instance, InstanceStore, MemoryStore, StoreError, StoreResult, Timestamp};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// Test client wrapper for driving the router in process
struct TestClient {
    app: Router,
}

struct TestResponse {
    status: StatusCode,
    content_type: String,
    body: Vec<u8>,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl TestClient {
    fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), Environment::Development)
    }

    fn with_store<S: InstanceStore + 'static>(store: Arc<S>, environment: Environment) -> Self {
        Self {
            app: create_app(store, environment, "does-not-exist"),
        }
    }

    async fn send(&self, method: Method, path: &str, body: Option<Body>) -> TestResponse {
        let mut request = Request::builder().method(method).uri(path);
        if body.is_some() {
            request = request.header(header::CONTENT_TYPE, "application/json");
        }
        let request = request.body(body.unwrap_or_else(Body::empty)).unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        TestResponse {
            status,
            content_type,
            body,
        }
    }

    async fn get(&self, path: &str) -> TestResponse {
        self.send(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, json: Value) -> TestResponse {
        self.send(Method::POST, path, Some(Body::from(json.to_string()))).await
    }

    async fn put(&self, path: &str, json: Value) -> TestResponse {
        self.send(Method::PUT, path, Some(Body::from(json.to_string()))).await
    }

    async fn delete(&self, path: &str) -> TestResponse {
        self.send(Method::DELETE, path, None).await
    }
}

const D1: &str = "/api/v1/documents/D1/instances";

#[tokio::test]
async fn test_push_update_delete_round_trip() {
    let client = TestClient::new();

    let first = client
        .post(D1, json!({"id": "A1", "documentGuid": "D1", "transform": {"x": 0, "y": 0, "rot": 0}}))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    let t1 = first.json()["lastModified"].as_i64().unwrap();
    assert!(t1 > 0);

    let second = client
        .post(D1, json!({"id": "A1", "documentGuid": "D1", "transform": {"x": 5, "y": 0, "rot": 0}}))
        .await;
    assert_eq!(second.status, StatusCode::OK);
    let t2 = second.json()["lastModified"].as_i64().unwrap();
    assert!(t2 > t1);

    let fetched = client.get(&format!("{}/A1", D1)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json()["transform"]["x"], json!(5.0));
    assert_eq!(fetched.json()["lastModified"], json!(t2));

    let deleted = client.delete(&format!("{}/A1", D1)).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = client.get(&format!("{}/A1", D1)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert!(!gone.json()["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let client = TestClient::new();
    client.post(D1, json!({"id": "A1"})).await;

    assert_eq!(client.delete(&format!("{}/A1", D1)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(client.delete(&format!("{}/A1", D1)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(
        client.delete("/api/v1/documents/never/instances/seen").await.status,
        StatusCode::NO_CONTENT
    );
}

#[tokio::test]
async fn test_put_uses_path_id() {
    let client = TestClient::new();

    let stored = client.put(&format!("{}/R1", D1), json!({"familyName": "Room"})).await;
    assert_eq!(stored.status, StatusCode::OK);
    assert_eq!(stored.json()["id"], json!("R1"));
    assert_eq!(stored.json()["documentGuid"], json!("D1"));

    let mismatch = client.put(&format!("{}/R1", D1), json!({"id": "R2"})).await;
    assert_eq!(mismatch.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_push_validation_errors() {
    let client = TestClient::new();

    let missing_id = client.post(D1, json!({"familyName": "Desk"})).await;
    assert_eq!(missing_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing_id.json()["error"]["kind"], json!("validation"));

    let wrong_doc = client.post(D1, json!({"id": "A1", "documentGuid": "D2"})).await;
    assert_eq!(wrong_doc.status, StatusCode::BAD_REQUEST);

    let wrong_shape = client.post(D1, json!({"id": "A1", "points": "square"})).await;
    assert_eq!(wrong_shape.status, StatusCode::BAD_REQUEST);

    let not_json = client
        .send(Method::POST, D1, Some(Body::from("{not json")))
        .await;
    assert_eq!(not_json.status, StatusCode::BAD_REQUEST);
    assert!(!not_json.json()["message"].as_str().unwrap().is_empty());

    let nul_id = client.post(D1, json!({"id": "A\u{0}1"})).await;
    assert_eq!(nul_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(nul_id.json()["error"]["kind"], json!("validation"));

    let nul_attribute = client
        .post(D1, json!({"id": "A2", "attributes": {"comment": "a\u{0}b"}}))
        .await;
    assert_eq!(nul_attribute.status, StatusCode::BAD_REQUEST);

    // Nothing was stored by any of the above
    assert_eq!(client.get(D1).await.json(), json!([]));
}

#[tokio::test]
async fn test_batch_reports_each_element() {
    let client = TestClient::new();

    let response = client
        .post(
            &format!("{}/batch", D1),
            json!([
                {"id": "A", "transform": {"x": 1, "y": 1, "rot": 0}},
                {"id": "B"},
                {"familyName": "no id"},
                {"id": "C", "points": [{"x": 0, "y": 0}, {"x": 1, "y": 0}, {"x": 1, "y": 1}]}
            ]),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert_eq!(body["succeeded"], json!(3));
    assert_eq!(body["failed"], json!(1));

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 4);
    for (index, result) in results.iter().enumerate() {
        assert_eq!(result["index"], json!(index));
    }
    assert_eq!(results[0]["status"], json!("ok"));
    assert_eq!(results[2]["status"], json!("error"));
    assert_eq!(results[2]["error"]["kind"], json!("validation"));
    assert!(results[2].get("instance").is_none());
    assert_eq!(results[3]["instance"]["points"].as_array().unwrap().len(), 3);

    let pulled = client.get(D1).await.json();
    assert_eq!(pulled.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_batch_accepts_wrapped_array() {
    let client = TestClient::new();
    let response = client
        .post(&format!("{}/batch", D1), json!({"instances": [{"id": "A"}, "junk"]}))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["succeeded"], json!(1));
    assert_eq!(body["results"][1]["status"], json!("error"));
    assert_eq!(body["results"][1]["id"], Value::Null);

    let rejected = client.post(&format!("{}/batch", D1), json!("not a batch")).await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_incremental_pull() {
    let client = TestClient::new();
    let a = client.post(D1, json!({"id": "A"})).await.json();
    client.post(D1, json!({"id": "B"})).await;
    client
        .post("/api/v1/documents/D2/instances", json!({"id": "X"}))
        .await;

    let all = client.get(D1).await.json();
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|i| i["documentGuid"] == json!("D1")));

    let since = a["lastModified"].as_i64().unwrap();
    let changed = client.get(&format!("{}?since={}", D1, since)).await.json();
    let changed = changed.as_array().unwrap();
    assert!(changed.iter().all(|i| i["lastModified"].as_i64().unwrap() > since));
    assert!(changed.iter().any(|i| i["id"] == json!("B")));
    assert!(changed.iter().all(|i| i["id"] != json!("A")));

    let bad_since = client.get(&format!("{}?since=yesterday", D1)).await;
    assert_eq!(bad_since.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_document_listing() {
    let client = TestClient::new();
    client.post(D1, json!({"id": "A"})).await;
    client.post(D1, json!({"id": "B"})).await;
    client.post("/api/v1/documents/D2/instances", json!({"id": "X"})).await;

    let documents: Vec<DocumentSummary> =
        serde_json::from_value(client.get("/api/v1/documents").await.json()).unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].document_guid, "D1");
    assert_eq!(documents[0].instance_count, 2);
}

#[tokio::test]
async fn test_unknown_route_is_structured_404() {
    let client = TestClient::new();

    let response = client.get("/no/such/thing").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.content_type.starts_with("application/json"));
    let body = response.json();
    assert_eq!(body["message"], json!("Error 404 - Resource Not Found"));
    assert_eq!(body["error"]["kind"], json!("route_not_found"));

    let post = client.post("/no/such/thing", json!({})).await;
    assert_eq!(post.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_production_hides_error_detail() {
    let client = TestClient::with_store(Arc::new(MemoryStore::new()), Environment::Production);

    let response = client.get("/no/such/thing").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let body = response.json();
    assert!(!body["message"].as_str().unwrap().is_empty());
    assert_eq!(body["error"], json!({}));
}

#[tokio::test]
async fn test_body_limit() {
    let client = TestClient::new();
    let padding = "x".repeat(1024 * 1024 + 1);
    let response = client
        .post(D1, json!({"id": "A", "attributes": {"padding": padding}}))
        .await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(response.json()["message"].is_string());
}

#[tokio::test]
async fn test_banner_and_diagnostics() {
    let client = TestClient::new();

    let banner = client.get("/").await;
    assert_eq!(banner.status, StatusCode::OK);
    assert!(banner.text().contains(env!("CARGO_PKG_VERSION")));
    assert!(banner.text().contains("Hello, world!"));

    let echo = client.get("/hello/bim").await;
    assert!(echo.text().contains("bim"));

    client.post(D1, json!({"id": "A"})).await;
    client.post("/api/v1/documents/D2/instances", json!({"id": "B"})).await;
    let count = client.get("/html/count").await;
    assert!(count.content_type.starts_with("text/html"));
    assert!(count.text().contains("<b>2</b>"));

    let health = client.get("/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.json()["status"], json!("healthy"));

    let index = client.get("/api/v1").await;
    assert_eq!(index.json()["apiVersion"], json!("v1"));
}

#[tokio::test]
async fn test_static_viewer_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("viewer.html"), "<svg></svg>").unwrap();
    let app = create_app(
        Arc::new(MemoryStore::new()),
        Environment::Development,
        dir.path(),
    );
    let client = TestClient { app };

    let page = client.get("/viewer.html").await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.text(), "<svg></svg>");

    assert_eq!(client.get("/missing.html").await.status, StatusCode::NOT_FOUND);
}

/// Store whose database is gone; `get` panics to exercise the panic layer.
struct BrokenStore;

#[async_trait::async_trait]
impl InstanceStore for BrokenStore {
    async fn upsert(&self, _document_guid: &str, _instance: Instance) -> StoreResult<Instance> {
        Err(StoreError::Connection(
            "connection refused to db.internal:5432 (user=editor password=hunter2)".into(),
        ))
    }

    async fn get(&self, _document_guid: &str, _id: &str) -> StoreResult<Instance> {
        panic!("driver invariant violated")
    }

    async fn list(&self, _document_guid: &str, _since: Option<Timestamp>) -> StoreResult<Vec<Instance>> {
        Err(StoreError::Internal("relation \"instances\" does not exist".into()))
    }

    async fn delete(&self, _document_guid: &str, _id: &str) -> StoreResult<bool> {
        Err(StoreError::Connection("connection reset".into()))
    }

    async fn count(&self, _document_guid: Option<&str>) -> StoreResult<u64> {
        Err(StoreError::Connection("connection reset".into()))
    }

    async fn list_documents(&self) -> StoreResult<Vec<DocumentSummary>> {
        Err(StoreError::Connection("connection reset".into()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Err(StoreError::Connection("connection reset".into()))
    }
}

#[tokio::test]
async fn test_store_failures_map_to_status() {
    let client = TestClient::with_store(Arc::new(BrokenStore), Environment::Production);

    let push = client.post(D1, json!({"id": "A"})).await;
    assert_eq!(push.status, StatusCode::SERVICE_UNAVAILABLE);
    let body = push.json();
    assert!(!body["message"].as_str().unwrap().contains("db.internal"));
    assert_eq!(body["error"], json!({}));

    let pull = client.get(D1).await;
    assert_eq!(pull.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!pull.text().contains("relation"));

    let panicked = client.get(&format!("{}/A", D1)).await;
    assert_eq!(panicked.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!panicked.text().contains("invariant"));

    assert_eq!(client.get("/health").await.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_batch_survives_store_failures() {
    let client = TestClient::with_store(Arc::new(BrokenStore), Environment::Development);

    let response = client
        .post(&format!("{}/batch", D1), json!([{"id": "A"}, {"id": "B"}]))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["failed"], json!(2));
    assert_eq!(body["results"][0]["error"]["kind"], json!("connection"));
    assert_eq!(body["results"][1]["id"], json!("B"));
}

#[tokio::test]
async fn test_production_batch_hides_store_detail() {
    let client = TestClient::with_store(Arc::new(BrokenStore), Environment::Production);

    let response = client
        .post(&format!("{}/batch", D1), json!([{"id": "A"}, {"familyName": "Desk"}]))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let text = response.text();
    assert!(!text.contains("db.internal"));
    assert!(!text.contains("hunter2"));

    let body = response.json();
    assert_eq!(body["failed"], json!(2));
    let failed = &body["results"][0]["error"];
    assert_eq!(failed["kind"], json!("connection"));
    assert!(failed["message"].as_str().unwrap().contains("incident"));

    // Client mistakes keep their explanation
    let invalid = &body["results"][1]["error"];
    assert_eq!(invalid["kind"], json!("validation"));
    assert!(invalid["message"].as_str().unwrap().contains("id is required"));
}

#[tokio::test]
async fn test_development_shows_panic_detail() {
    let client = TestClient::with_store(Arc::new(BrokenStore), Environment::Development);
    let panicked = client.get(&format!("{}/A", D1)).await;
    assert_eq!(panicked.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(panicked.json()["error"]["kind"], json!("panic"));
    assert!(panicked.json()["error"]["detail"]
        .as_str()
        .unwrap()
        .contains("invariant"));
}
