use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::env::{self, VarError};

/// Which object store backs the browser.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Google Cloud Storage JSON API.
    Gcs,
    /// In-process buckets; contents vanish on exit.
    Memory,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub backend: BackendKind,
    pub gcs_endpoint: String,
    pub project: Option<String>,
    pub access_token: Option<String>,
    pub request_timeout_secs: u64,
    pub memory_buckets: Vec<String>,
    pub strict_chunk_order: bool,
    pub chunk_session_ttl_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Hierarchical file browser over bucket/object storage")]
pub struct Args {
    /// Host to bind to (overrides BUCKET_BROWSER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BUCKET_BROWSER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Route prefix for the API (overrides BUCKET_BROWSER_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Storage backend (overrides BUCKET_BROWSER_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// GCS API endpoint (overrides BUCKET_BROWSER_GCS_ENDPOINT)
    #[arg(long)]
    pub gcs_endpoint: Option<String>,

    /// Project whose buckets are listed at the root (overrides BUCKET_BROWSER_PROJECT)
    #[arg(long)]
    pub project: Option<String>,

    /// Timeout for each backend request in seconds
    /// (overrides BUCKET_BROWSER_REQUEST_TIMEOUT_SECS)
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Bucket to create in the memory backend; repeatable
    /// (overrides BUCKET_BROWSER_MEMORY_BUCKETS)
    #[arg(long = "memory-bucket")]
    pub memory_buckets: Vec<String>,

    /// Reject chunked-upload chunks that arrive out of order
    #[arg(long)]
    pub strict_chunk_order: bool,

    /// How long an idle chunked upload is remembered, in seconds
    /// (overrides BUCKET_BROWSER_CHUNK_SESSION_TTL_SECS)
    #[arg(long)]
    pub chunk_session_ttl_secs: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_sources(Args::parse(), |name| env::var(name))
    }

    /// Merge CLI args over values looked up with `var`, over defaults.
    pub fn from_sources<F>(args: Args, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let env_or = |name: &str, default: &str| var(name).unwrap_or_else(|_| default.into());

        // --- Environment fallback ---
        let env_host = env_or("BUCKET_BROWSER_HOST", "0.0.0.0");
        let env_port = parse_var(&var, "BUCKET_BROWSER_PORT", 8080u16)?;
        let env_base_url = env_or("BUCKET_BROWSER_BASE_URL", "/gcp/v1");
        let env_backend = match var("BUCKET_BROWSER_BACKEND") {
            Ok(value) => BackendKind::from_str(&value, true)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("parsing BUCKET_BROWSER_BACKEND value `{}`", value))?,
            Err(VarError::NotPresent) => BackendKind::Gcs,
            Err(err) => return Err(err).context("reading BUCKET_BROWSER_BACKEND"),
        };
        let env_endpoint = env_or(
            "BUCKET_BROWSER_GCS_ENDPOINT",
            crate::store::gcs::DEFAULT_ENDPOINT,
        );
        let env_project = var("BUCKET_BROWSER_PROJECT").ok();
        let access_token = var("BUCKET_BROWSER_ACCESS_TOKEN").ok();
        let env_timeout = parse_var(&var, "BUCKET_BROWSER_REQUEST_TIMEOUT_SECS", 30u64)?;
        let env_buckets = var("BUCKET_BROWSER_MEMORY_BUCKETS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let env_strict = parse_var(&var, "BUCKET_BROWSER_STRICT_CHUNK_ORDER", false)?;
        let env_ttl = parse_var(&var, "BUCKET_BROWSER_CHUNK_SESSION_TTL_SECS", 3600u64)?;

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            base_url: normalize_base_url(&args.base_url.unwrap_or(env_base_url)),
            backend: args.backend.unwrap_or(env_backend),
            gcs_endpoint: args
                .gcs_endpoint
                .unwrap_or(env_endpoint)
                .trim_end_matches('/')
                .to_string(),
            project: args.project.or(env_project),
            access_token,
            request_timeout_secs: args.request_timeout_secs.unwrap_or(env_timeout),
            memory_buckets: if args.memory_buckets.is_empty() {
                env_buckets
            } else {
                args.memory_buckets
            },
            strict_chunk_order: args.strict_chunk_order || env_strict,
            chunk_session_ttl_secs: args.chunk_session_ttl_secs.unwrap_or(env_ttl),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse an optional environment value, falling back to `default` when unset.
fn parse_var<F, T>(var: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

/// Route prefixes start with `/` and never end with one; `/` itself becomes empty.
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
