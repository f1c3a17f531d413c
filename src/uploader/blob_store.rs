//! Durable object storage contract and its HTTP client.

use crate::config::StorageSettings;
use crate::pipeline::PipelineError;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, StatusCode};
use std::time::Duration;
use tracing::warn;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fails fast when the store cannot work at all, before any attempt.
    fn ensure_configured(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Publicly reachable URL of an object. Pure, no network.
    fn public_url(&self, key: &str) -> String;
}

#[derive(Debug)]
struct BucketLocation {
    write_base: String,
    public_base: String,
}

/// Talks to an S3/COS-style bucket with plain PUT and DELETE requests.
///
/// A missing bucket or region does not stop the server: every upload then
/// fails with a configuration error, like a missing parse API key does.
pub struct HttpBlobStore {
    client: reqwest::Client,
    location: Result<BucketLocation, String>,
    token: Option<String>,
}

impl HttpBlobStore {
    pub fn new(settings: &StorageSettings) -> Result<Self, PipelineError> {
        let location = bucket_location(settings);
        if let Err(reason) = &location {
            warn!("Uploads are disabled: {}", reason);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Configuration(format!("storage client: {}", e)))?;

        Ok(Self {
            client,
            location,
            token: non_empty(&settings.token).map(str::to_string),
        })
    }

    fn location(&self) -> Result<&BucketLocation> {
        match &self.location {
            Ok(location) => Ok(location),
            Err(reason) => bail!("{}", reason),
        }
    }

    fn object_url(&self, key: &str) -> Result<String> {
        Ok(format!("{}/{}", self.location()?.write_base, key))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let request = self
            .client
            .put(self.object_url(key)?)
            .header(header::CONTENT_TYPE, content_type)
            .body(body);

        let response = self
            .authorize(request)
            .send()
            .await
            .with_context(|| format!("Failed to send object {}", key))?;

        if !response.status().is_success() {
            bail!("Storage rejected {} with status {}", key, response.status());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let response = self
            .authorize(self.client.delete(self.object_url(key)?))
            .send()
            .await
            .with_context(|| format!("Failed to delete object {}", key))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        bail!("Storage refused to delete {} with status {}", key, status)
    }

    fn ensure_configured(&self) -> Result<(), PipelineError> {
        self.location
            .as_ref()
            .map(|_| ())
            .map_err(|reason| PipelineError::Configuration(reason.clone()))
    }

    fn public_url(&self, key: &str) -> String {
        match &self.location {
            Ok(location) => format!("{}/{}", location.public_base, key),
            Err(_) => key.to_string(),
        }
    }
}

fn bucket_location(settings: &StorageSettings) -> Result<BucketLocation, String> {
    let bucket = non_empty(&settings.bucket)
        .ok_or_else(|| "storage bucket is not configured".to_string())?;
    let region = non_empty(&settings.region)
        .ok_or_else(|| "storage region is not configured".to_string())?;

    let public_base = match non_empty(&settings.base_url) {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => format!("https://{}.cos.{}.myqcloud.com", bucket, region),
    };
    let write_base = match non_empty(&settings.endpoint) {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        None => public_base.clone(),
    };
    Ok(BucketLocation {
        write_base,
        public_base,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
