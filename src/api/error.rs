use axum::{
    body::Body,
    extract::{rejection::JsonRejection, rejection::QueryRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;

use crate::config::Environment;
use crate::error::StoreError;

pub const NOT_FOUND_MESSAGE: &str = "Error 404 - Resource Not Found";

/// Body of every error response. `error` is `{}` in production.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub error: Value,
}

/// Diagnostic detail attached to error responses and rendered only outside production
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub status: u16,
    pub detail: String,
}

#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    RouteNotFound { method: String, path: String },
    PayloadTooLarge(String),
    Panic(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Connection(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(StoreError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Panic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Store(err) => err.kind(),
            ApiError::RouteNotFound { .. } => "route_not_found",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::Panic(_) => "panic",
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Store(err) => err.to_string(),
            ApiError::RouteNotFound { method, path } => format!("no route for {} {}", method, path),
            ApiError::PayloadTooLarge(detail) | ApiError::Panic(detail) => detail.clone(),
        }
    }

    /// Client-facing message; never carries internal error text.
    fn message(&self, incident: Option<&str>) -> String {
        match self {
            ApiError::Store(err) => store_message(err, incident),
            ApiError::RouteNotFound { .. } => NOT_FOUND_MESSAGE.to_string(),
            ApiError::PayloadTooLarge(_) => "Request body exceeds the 1 MB limit".to_string(),
            ApiError::Panic(_) => internal_message(incident),
        }
    }
}

fn store_message(err: &StoreError, incident: Option<&str>) -> String {
    match err {
        StoreError::Validation(_) | StoreError::NotFound { .. } => err.to_string(),
        StoreError::Connection(_) => match incident {
            Some(id) => format!("Database unavailable (incident {})", id),
            None => "Database unavailable".to_string(),
        },
        StoreError::Internal(_) => internal_message(incident),
    }
}

fn internal_message(incident: Option<&str>) -> String {
    match incident {
        Some(id) => format!("Internal server error (incident {})", id),
        None => "Internal server error".to_string(),
    }
}

/// Message for a store failure reported inside an otherwise successful
/// response, such as one element of a batch.
///
/// Client errors keep their own text. Server errors are logged under a fresh
/// incident id and only that id reaches the client, in every environment.
pub fn item_error_message(err: &StoreError) -> String {
    if err.is_client_error() {
        return err.to_string();
    }
    let incident = uuid::Uuid::new_v4().to_string();
    log::error!("incident {}: {}", incident, err);
    store_message(err, Some(&incident))
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::Store(StoreError::validation(rejection.body_text()))
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Store(StoreError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let incident = status
            .is_server_error()
            .then(|| uuid::Uuid::new_v4().to_string());

        match &incident {
            Some(id) => log::error!("incident {}: {} ({})", id, self.detail(), status),
            None => log::debug!("request failed with {}: {}", status, self.detail()),
        }

        let body = ErrorResponse {
            message: self.message(incident.as_deref()),
            error: json!({}),
        };
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(ErrorDetail {
            kind: self.kind(),
            status: status.as_u16(),
            detail: self.detail(),
        });
        response
    }
}

/// Fallback for requests no route or static file matched
pub async fn route_not_found(request: axum::extract::Request) -> ApiError {
    ApiError::RouteNotFound {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
    }
}

/// Turn a handler panic into the structured 500 body
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    ApiError::Panic(detail).into_response()
}

/// Outside production, re-render error bodies with their diagnostic detail.
pub async fn expose_error_detail(State(environment): State<Environment>, response: Response) -> Response {
    if environment.is_production() {
        return response;
    }
    let Some(detail) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let message = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => serde_json::from_slice::<ErrorResponse>(&bytes)
            .map(|b| b.message)
            .unwrap_or_default(),
        Err(_) => String::new(),
    };
    let body = ErrorResponse {
        message,
        error: json!(detail),
    };
    let bytes = match serde_json::to_vec(&body) {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
