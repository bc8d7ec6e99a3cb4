use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Json},
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::handlers::AppState;
use crate::store::traits::Store;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn banner() -> String {
    format!(
        "RoomEditorWeb 2D round-trip real-time Revit BIM room editor {}. Hello, world!",
        VERSION
    )
}

/// Diagnostic echo
pub async fn hello(Path(message): Path<String>) -> String {
    format!("Room editor {}: Hello! You sent me '{}'", VERSION, message)
}

/// Small admin page with the number of stored instances
pub async fn html_count<S: Store>(State(store): State<AppState<S>>) -> Result<Html<String>, ApiError> {
    let count = store.count(None).await?;
    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Room Editor instances</title>
</head>
<body>
    <h1>Room Editor {}</h1>
    <p>Database contains <b>{}</b> instance{}.</p>
</body>
</html>
"#,
        VERSION,
        count,
        if count == 1 { "" } else { "s" }
    )))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
}

pub async fn health_check<S: Store>(
    State(store): State<AppState<S>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, database) = match store.ping().await {
        Ok(()) => (StatusCode::OK, "healthy", "connected".to_string()),
        Err(e) => {
            log::warn!("health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", e.kind().to_string())
        }
    };
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            database,
        }),
    )
}

/// Machine-readable listing of the versioned synchronization API
pub async fn api_index() -> Json<Value> {
    Json(json!({
        "name": "room-editor-sync",
        "version": VERSION,
        "apiVersion": "v1",
        "conflictPolicy": "last-write-wins by server arrival order; compare lastModified client side",
        "routes": [
            {"method": "GET", "path": "/api/v1/documents", "description": "List documents with instance counts"},
            {"method": "GET", "path": "/api/v1/documents/:documentGuid/instances", "query": {"since": "epoch milliseconds, optional"}, "description": "Pull all instances or those changed after `since`"},
            {"method": "POST", "path": "/api/v1/documents/:documentGuid/instances", "description": "Push one instance (upsert)"},
            {"method": "POST", "path": "/api/v1/documents/:documentGuid/instances/batch", "description": "Push many instances; per-element results"},
            {"method": "GET", "path": "/api/v1/documents/:documentGuid/instances/:id", "description": "Fetch one instance"},
            {"method": "PUT", "path": "/api/v1/documents/:documentGuid/instances/:id", "description": "Push one instance addressed by id (upsert)"},
            {"method": "DELETE", "path": "/api/v1/documents/:documentGuid/instances/:id", "description": "Remove one instance (idempotent)"}
        ]
    }))
}
