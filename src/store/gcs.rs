//! Google Cloud Storage JSON API client.
//!
//! Speaks the v1 JSON API directly over `reqwest`. Credential acquisition is
//! left to the deployment: an access token, when configured, is sent as a
//! bearer token on every request.

use super::{BlobRecord, MAX_COMPOSE_SOURCES, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Connection settings for [`GcsStore`].
#[derive(Clone, Debug)]
pub struct GcsOptions {
    /// API root, without trailing slash.
    pub endpoint: String,
    /// Project whose buckets are listed at the browser root.
    pub project: Option<String>,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

pub struct GcsStore {
    http_client: Client,
    options: GcsOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    name: String,
    bucket: String,
    /// GCS reports sizes as decimal strings.
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    md5_hash: Option<String>,
}

impl From<ObjectResource> for BlobRecord {
    fn from(obj: ObjectResource) -> Self {
        BlobRecord {
            size: obj.size.and_then(|s| s.parse().ok()).unwrap_or(0),
            name: obj.name,
            content_type: obj.content_type,
            bucket: obj.bucket,
            md5_hash: obj.md5_hash,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BucketResource {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketList {
    #[serde(default)]
    items: Vec<BucketResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct SourceObject<'a> {
    name: &'a str,
}

/// What a 404 on a given request means.
enum Missing<'a> {
    Bucket(&'a str),
    Object(&'a str, &'a str),
    /// Reported as a plain API error.
    Unmapped,
}

impl GcsStore {
    pub fn new(options: GcsOptions) -> StoreResult<Self> {
        let http_client = Client::builder().timeout(options.timeout).build()?;
        Ok(Self {
            http_client,
            options,
        })
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!(
            "{}/storage/v1/b/{}",
            self.options.endpoint,
            urlencoding::encode(bucket)
        )
    }

    /// Object names are encoded as one path segment, so `/` becomes `%2F`.
    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/o/{}", self.bucket_url(bucket), urlencoding::encode(key))
    }

    fn upload_url(&self, bucket: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.options.endpoint,
            urlencoding::encode(bucket)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.options.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, missing: Missing<'_>) -> StoreResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            match missing {
                Missing::Bucket(bucket) => {
                    return Err(StoreError::BucketNotFound(bucket.to_string()));
                }
                Missing::Object(bucket, key) => {
                    return Err(StoreError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    });
                }
                Missing::Unmapped => {}
            }
        }

        let message = match response.text().await {
            Ok(body) => body,
            Err(err) => format!("failed to read error body: {}", err),
        };
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn map_transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Http(err)
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn list_containers(&self) -> StoreResult<Vec<String>> {
        let project = self.options.project.as_deref().ok_or_else(|| {
            StoreError::Unsupported("listing buckets requires a configured project".into())
        })?;

        let url = format!("{}/storage/v1/b", self.options.endpoint);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http_client.get(&url).query(&[("project", project)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: BucketList = self
                .send(request, Missing::Unmapped)
                .await?
                .json()
                .await
                .map_err(map_transport_error)?;
            names.extend(page.items.into_iter().map(|b| b.name));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        debug!(count = names.len(), "listed buckets");
        Ok(names)
    }

    async fn get_container(&self, bucket: &str) -> StoreResult<()> {
        let request = self.http_client.get(self.bucket_url(bucket));
        self.send(request, Missing::Bucket(bucket)).await?;
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<BlobRecord>> {
        let url = format!("{}/o", self.bucket_url(bucket));
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http_client.get(&url);
            if !prefix.is_empty() {
                request = request.query(&[("prefix", prefix)]);
            }
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: ObjectList = self
                .send(request, Missing::Bucket(bucket))
                .await?
                .json()
                .await
                .map_err(map_transport_error)?;
            records.extend(page.items.into_iter().map(BlobRecord::from));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        debug!(bucket, prefix, count = records.len(), "listed objects");
        Ok(records)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        let request = self
            .http_client
            .get(self.object_url(bucket, key))
            .query(&[("alt", "media")]);
        self.send(request, Missing::Object(bucket, key))
            .await?
            .bytes()
            .await
            .map_err(map_transport_error)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StoreResult<BlobRecord> {
        let request = self
            .http_client
            .post(self.upload_url(bucket))
            .query(&[("uploadType", "media"), ("name", key)])
            .header(
                reqwest::header::CONTENT_TYPE,
                content_type.unwrap_or("application/octet-stream"),
            )
            .body(data);
        let resource: ObjectResource = self
            .send(request, Missing::Bucket(bucket))
            .await?
            .json()
            .await
            .map_err(map_transport_error)?;
        Ok(resource.into())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let request = self.http_client.delete(self.object_url(bucket, key));
        self.send(request, Missing::Object(bucket, key)).await?;
        Ok(())
    }

    async fn compose_objects(
        &self,
        bucket: &str,
        dest: &str,
        sources: &[String],
    ) -> StoreResult<BlobRecord> {
        if sources.is_empty() || sources.len() > MAX_COMPOSE_SOURCES {
            return Err(StoreError::Unsupported(format!(
                "compose takes 1 to {} sources, got {}",
                MAX_COMPOSE_SOURCES,
                sources.len()
            )));
        }

        let source_objects = sources
            .iter()
            .map(|name| SourceObject { name })
            .collect::<Vec<_>>();
        let body = json!({
            "sourceObjects": source_objects,
            "destination": { "bucket": bucket, "name": dest },
        });
        let request = self
            .http_client
            .post(format!("{}/compose", self.object_url(bucket, dest)))
            .json(&body);
        let resource: ObjectResource = self
            .send(request, Missing::Object(bucket, dest))
            .await?
            .json()
            .await
            .map_err(map_transport_error)?;
        Ok(resource.into())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> StoreResult<BlobRecord> {
        let url = format!(
            "{}/copyTo/b/{}/o/{}",
            self.object_url(src_bucket, src_key),
            urlencoding::encode(dest_bucket),
            urlencoding::encode(dest_key)
        );
        let request = self.http_client.post(url).json(&json!({}));
        let resource: ObjectResource = self
            .send(request, Missing::Object(src_bucket, src_key))
            .await?
            .json()
            .await
            .map_err(map_transport_error)?;
        Ok(resource.into())
    }

    async fn rename_object(
        &self,
        bucket: &str,
        src_key: &str,
        dest_key: &str,
    ) -> StoreResult<BlobRecord> {
        if src_key == dest_key {
            let request = self.http_client.get(self.object_url(bucket, src_key));
            let resource: ObjectResource = self
                .send(request, Missing::Object(bucket, src_key))
                .await?
                .json()
                .await
                .map_err(map_transport_error)?;
            return Ok(resource.into());
        }
        let record = self.copy_object(bucket, src_key, bucket, dest_key).await?;
        self.delete_object(bucket, src_key).await?;
        Ok(record)
    }
}
