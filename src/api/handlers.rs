use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::api::error::{item_error_message, ApiError};
use crate::error::StoreError;
use crate::model::{DocumentSummary, Id, Instance, InstancePayload, Timestamp};
use crate::store::traits::Store;

pub type AppState<S> = Arc<S>;

/// Largest number of elements accepted in one batch push
pub const MAX_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct PullQuery {
    /// Only return instances stamped after this epoch-millisecond value
    pub since: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchItemError {
    pub kind: String,
    pub message: String,
}

/// Outcome of one element of a batch push, in request order.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub id: Option<Id>,
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<Instance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchItemError>,
}

impl BatchItemResult {
    fn from_result(index: usize, id: Option<Id>, result: Result<Instance, StoreError>) -> Self {
        match result {
            Ok(instance) => Self {
                index,
                id: Some(instance.id.clone()),
                status: BatchStatus::Ok,
                instance: Some(instance),
                error: None,
            },
            Err(err) => Self {
                index,
                id,
                status: BatchStatus::Error,
                instance: None,
                error: Some(BatchItemError {
                    kind: err.kind().to_string(),
                    message: item_error_message(&err),
                }),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
}

/// Push one instance into a document
pub async fn push_instance<S: Store>(
    State(store): State<AppState<S>>,
    Path(document_guid): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Instance>, ApiError> {
    let Json(body) = body?;
    let instance = InstancePayload::from_value(body)?.into_instance(&document_guid, None)?;
    let stored = store.upsert(&document_guid, instance).await?;
    Ok(Json(stored))
}

/// Push one instance addressed by id in the path
pub async fn put_instance<S: Store>(
    State(store): State<AppState<S>>,
    Path((document_guid, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Instance>, ApiError> {
    let Json(body) = body?;
    let instance = InstancePayload::from_value(body)?.into_instance(&document_guid, Some(&id))?;
    let stored = store.upsert(&document_guid, instance).await?;
    Ok(Json(stored))
}

/// Push many instances; each element succeeds or fails on its own
pub async fn push_batch<S: Store>(
    State(store): State<AppState<S>>,
    Path(document_guid): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(body) = body?;
    let elements = match body {
        Value::Array(elements) => elements,
        Value::Object(mut wrapper) => match wrapper.remove("instances") {
            Some(Value::Array(elements)) => elements,
            _ => {
                return Err(StoreError::validation(
                    "batch body must be an array or an object with an 'instances' array",
                )
                .into())
            }
        },
        _ => return Err(StoreError::validation("batch body must be a JSON array").into()),
    };
    if elements.len() > MAX_BATCH_SIZE {
        return Err(StoreError::validation(format!(
            "batch of {} elements exceeds the limit of {}",
            elements.len(),
            MAX_BATCH_SIZE
        ))
        .into());
    }

    let total = elements.len();
    let mut results: Vec<Option<BatchItemResult>> = (0..total).map(|_| None).collect();
    let mut accepted_indices = Vec::new();
    let mut accepted = Vec::new();

    for (index, element) in elements.into_iter().enumerate() {
        let id_hint = InstancePayload::id_hint(&element);
        match InstancePayload::from_value(element)
            .and_then(|payload| payload.into_instance(&document_guid, None))
        {
            Ok(instance) => {
                accepted_indices.push(index);
                accepted.push(instance);
            }
            Err(err) => results[index] = Some(BatchItemResult::from_result(index, id_hint, Err(err))),
        }
    }

    let ids: Vec<Id> = accepted.iter().map(|i| i.id.clone()).collect();
    let outcomes = store.upsert_batch(&document_guid, accepted).await;
    for ((index, id), outcome) in accepted_indices.into_iter().zip(ids).zip(outcomes) {
        results[index] = Some(BatchItemResult::from_result(index, Some(id), outcome));
    }

    let results: Vec<BatchItemResult> = results.into_iter().flatten().collect();
    let succeeded = results
        .iter()
        .filter(|r| r.status == BatchStatus::Ok)
        .count();
    let failed = results.len() - succeeded;

    log::info!(
        "batch push to {}: {} accepted, {} rejected",
        document_guid,
        succeeded,
        failed
    );

    Ok(Json(BatchResponse {
        succeeded,
        failed,
        results,
    }))
}

/// Pull every instance of a document, or only those changed since `?since=`
pub async fn pull_instances<S: Store>(
    State(store): State<AppState<S>>,
    Path(document_guid): Path<String>,
    query: Result<Query<PullQuery>, QueryRejection>,
) -> Result<Json<Vec<Instance>>, ApiError> {
    let Query(query) = query?;
    let instances = store.list(&document_guid, query.since).await?;
    Ok(Json(instances))
}

pub async fn get_instance<S: Store>(
    State(store): State<AppState<S>>,
    Path((document_guid, id)): Path<(String, String)>,
) -> Result<Json<Instance>, ApiError> {
    let instance = store.get(&document_guid, &id).await?;
    Ok(Json(instance))
}

/// Remove an instance. Answers 204 whether or not it existed.
pub async fn delete_instance<S: Store>(
    State(store): State<AppState<S>>,
    Path((document_guid, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let existed = store.delete(&document_guid, &id).await?;
    if !existed {
        log::debug!("delete of absent instance {}/{}", document_guid, id);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_documents<S: Store>(
    State(store): State<AppState<S>>,
) -> Result<Json<Vec<DocumentSummary>>, ApiError> {
    let documents = store.list_documents().await?;
    Ok(Json(documents))
}
