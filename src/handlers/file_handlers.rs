//! HTTP handlers for the file-browser API.
//! Each handler unpacks the request, calls `BrowserService` and returns JSON;
//! all path and storage logic lives in the service.

use crate::{
    errors::AppError,
    models::{
        contents::{CheckpointModel, Contents, ListingEntry},
        requests::{CopyRequest, MoveRequest, NewRequest, SaveRequest},
    },
    services::browser_service::BrowserService,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

/// Query string naming the file a checkpoint request applies to.
#[derive(Debug, Deserialize)]
pub struct CheckpointQuery {
    pub path: String,
}

/// `GET /files` — list buckets.
pub async fn list_root(
    State(service): State<BrowserService>,
) -> Result<Json<Contents>, AppError> {
    Ok(Json(service.read("/").await?))
}

/// `GET /files/{*path}` — download a file or list a directory.
pub async fn get_contents(
    State(service): State<BrowserService>,
    Path(path): Path<String>,
) -> Result<Json<Contents>, AppError> {
    Ok(Json(service.read(&path).await?))
}

/// `POST /files` — save a file, whole or one chunk at a time.
pub async fn save_contents(
    State(service): State<BrowserService>,
    Json(request): Json<SaveRequest>,
) -> Result<Json<Value>, AppError> {
    service.save(&request).await?;
    Ok(Json(json!({})))
}

/// `DELETE /files/{*path}` — delete a single file; anything else is a no-op.
pub async fn delete_contents(
    State(service): State<BrowserService>,
    Path(path): Path<String>,
) -> Result<Json<Value>, AppError> {
    service.delete(&path).await?;
    Ok(Json(json!({})))
}

/// `POST /move`
pub async fn move_object(
    State(service): State<BrowserService>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<ListingEntry>, AppError> {
    let entry = service
        .rename(&request.old_local_path, &request.new_local_path)
        .await?;
    Ok(Json(entry))
}

/// `POST /copy`
pub async fn copy_object(
    State(service): State<BrowserService>,
    Json(request): Json<CopyRequest>,
) -> Result<Json<ListingEntry>, AppError> {
    let entry = service
        .copy(&request.local_path, &request.to_local_dir)
        .await?;
    Ok(Json(entry))
}

/// `POST /new` — create an untitled file or directory.
pub async fn new_untitled(
    State(service): State<BrowserService>,
    Json(request): Json<NewRequest>,
) -> Result<Json<ListingEntry>, AppError> {
    let entry = service
        .new_untitled(&request.path, request.kind, request.ext.as_deref())
        .await?;
    Ok(Json(entry))
}

/// `GET /checkpoints?path=`
pub async fn list_checkpoints(
    State(service): State<BrowserService>,
    Query(q): Query<CheckpointQuery>,
) -> Result<Json<Vec<CheckpointModel>>, AppError> {
    Ok(Json(service.list_checkpoints(&q.path).await?))
}

/// `POST /checkpoints?path=`
pub async fn create_checkpoint(
    State(service): State<BrowserService>,
    Query(q): Query<CheckpointQuery>,
) -> Result<Json<CheckpointModel>, AppError> {
    Ok(Json(service.create_checkpoint(&q.path).await?))
}

/// `POST /checkpoints/{id}/restore?path=`
pub async fn restore_checkpoint(
    State(service): State<BrowserService>,
    Path(id): Path<String>,
    Query(q): Query<CheckpointQuery>,
) -> Result<Json<Value>, AppError> {
    service.restore_checkpoint(&q.path, &id).await?;
    Ok(Json(json!({})))
}

/// `DELETE /checkpoints/{id}?path=`
pub async fn delete_checkpoint(
    State(service): State<BrowserService>,
    Path(id): Path<String>,
    Query(q): Query<CheckpointQuery>,
) -> Result<Json<Value>, AppError> {
    service.delete_checkpoint(&q.path, &id).await?;
    Ok(Json(json!({})))
}
