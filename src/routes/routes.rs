//! Defines routes for the file-browser API.
//!
//! ## Structure
//! All API routes sit under a configurable base (default `/gcp/v1`):
//!   - `GET    {base}/files`            — list buckets
//!   - `GET    {base}/files/{*path}`    — read a file or list a directory
//!   - `POST   {base}/files`            — save a file (whole or one chunk)
//!   - `DELETE {base}/files/{*path}`    — delete a file
//!   - `POST   {base}/move`             — rename a file within its bucket
//!   - `POST   {base}/copy`             — copy a file into a directory
//!   - `POST   {base}/new`              — create an untitled file or directory
//!   - `GET|POST {base}/checkpoints`    — list / create checkpoints (`?path=`)
//!   - `POST   {base}/checkpoints/{id}/restore`, `DELETE {base}/checkpoints/{id}`
//!
//! Health endpoints are mounted at the root regardless of the base.

use crate::{
    handlers::{
        file_handlers::{
            copy_object, create_checkpoint, delete_checkpoint, delete_contents, get_contents,
            list_checkpoints, list_root, move_object, new_untitled, restore_checkpoint,
            save_contents,
        },
        health_handlers::{healthz, readyz},
    },
    services::browser_service::BrowserService,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build the router with the API nested under `base_url` (`""` mounts it at the root).
pub fn routes(base_url: &str) -> Router<BrowserService> {
    let api = Router::new()
        .route("/files", get(list_root).post(save_contents))
        .route("/files/{*path}", get(get_contents).delete(delete_contents))
        .route("/move", post(move_object))
        .route("/copy", post(copy_object))
        .route("/new", post(new_untitled))
        .route(
            "/checkpoints",
            get(list_checkpoints).post(create_checkpoint),
        )
        .route("/checkpoints/{id}/restore", post(restore_checkpoint))
        .route("/checkpoints/{id}", delete(delete_checkpoint));

    let health = Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz));

    if base_url.is_empty() {
        health.merge(api)
    } else {
        health.nest(base_url, api)
    }
}
