//! Durable upload of transcoded artifacts.

mod blob_store;
mod retry_policy;

pub use blob_store::{BlobStore, HttpBlobStore};
pub use retry_policy::{RetryExhausted, RetryPolicy};

use crate::pipeline::PipelineError;
use crate::server::metrics;
use anyhow::{anyhow, Context};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// `audio/{YYYY}/{MM}/{DD}/{external_id}_{uuid}{extension}`.
///
/// A fresh uuid every call, so re-uploading the same song never overwrites
/// an earlier object.
pub fn durable_key(external_id: &str, extension: &str, now: DateTime<Utc>) -> String {
    let id: String = external_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!(
        "audio/{}/{}_{}{}",
        now.format("%Y/%m/%d"),
        id,
        uuid::Uuid::new_v4(),
        extension
    )
}

pub struct Uploader {
    store: Arc<dyn BlobStore>,
    policy: RetryPolicy,
}

impl Uploader {
    pub fn new(store: Arc<dyn BlobStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Uploads the file at `path` under `key` and returns its public URL.
    /// The file is read again on every attempt.
    pub async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<String, PipelineError> {
        self.store.ensure_configured()?;
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(PipelineError::upload(
                0,
                anyhow!("artifact {:?} does not exist", path),
            ));
        }

        let store = &self.store;
        let result = self
            .policy
            .run("upload", |attempt| async move {
                let body = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read artifact {:?}", path))?;
                debug!("Upload attempt {} for {} ({} bytes)", attempt, key, body.len());
                let outcome = store.put(key, Bytes::from(body), content_type).await;
                metrics::record_upload_attempt(outcome.is_ok());
                outcome
            })
            .await;

        match result {
            Ok(()) => {
                let url = self.store.public_url(key);
                info!("Uploaded {}", key);
                Ok(url)
            }
            Err(exhausted) => Err(PipelineError::upload(
                exhausted.attempts,
                exhausted.last_error,
            )),
        }
    }

    /// Best effort removal. Failures are logged, never returned.
    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(()) => {
                info!("Deleted {}", key);
                true
            }
            Err(e) => {
                warn!("Failed to delete {}: {:#}", key, e);
                false
            }
        }
    }
}
