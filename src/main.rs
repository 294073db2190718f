use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod store;

use config::{AppConfig, BackendKind};
use services::browser_service::BrowserService;
use store::{GcsStore, MemoryStore, ObjectStore, gcs::GcsOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!(
        host = %cfg.host,
        port = cfg.port,
        base_url = %cfg.base_url,
        backend = ?cfg.backend,
        strict_chunk_order = cfg.strict_chunk_order,
        "Starting bucket-browser"
    );

    // --- Initialize backend client, shared by every request ---
    let store = build_store(&cfg)?;

    // --- Initialize core service ---
    let mut service = BrowserService::new(store);
    if cfg.strict_chunk_order {
        let secs = i64::try_from(cfg.chunk_session_ttl_secs)?;
        let ttl = chrono::Duration::try_seconds(secs).context("chunk session TTL out of range")?;
        service = service.with_strict_chunk_order(ttl);
    }

    // --- Build router ---
    let app: Router = routes::routes::routes(&cfg.base_url).with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Construct the configured object store.
fn build_store(cfg: &AppConfig) -> Result<Arc<dyn ObjectStore>> {
    match cfg.backend {
        BackendKind::Gcs => {
            if cfg.project.is_none() {
                tracing::warn!("No project configured; listing the root will fail");
            }
            if cfg.access_token.is_none() {
                tracing::debug!("No access token configured; sending unauthenticated requests");
            }
            let store = GcsStore::new(GcsOptions {
                endpoint: cfg.gcs_endpoint.clone(),
                project: cfg.project.clone(),
                access_token: cfg.access_token.clone(),
                timeout: Duration::from_secs(cfg.request_timeout_secs),
            })?;
            tracing::info!("Using GCS backend at {}", cfg.gcs_endpoint);
            Ok(Arc::new(store))
        }
        BackendKind::Memory => {
            let store = MemoryStore::with_buckets(cfg.memory_buckets.iter().cloned());
            tracing::info!(
                "Using in-memory backend with buckets {:?}",
                cfg.memory_buckets
            );
            Ok(Arc::new(store))
        }
    }
}
