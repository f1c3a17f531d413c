//! Downloads source audio into a scratch file.

use crate::config::PipelineSettings;
use crate::pipeline::PipelineError;
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::header;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const ACCEPT_AUDIO: &str = "audio/*,*/*;q=0.8";

pub struct SourceFetcher {
    client: reqwest::Client,
    referer: Option<String>,
}

impl SourceFetcher {
    pub fn new(settings: &PipelineSettings, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.download_timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("Failed to create download HTTP client")?;

        Ok(Self {
            client,
            referer: settings.referer.clone(),
        })
    }

    /// Streams `url` into `dest`, returning the number of bytes written.
    ///
    /// A partially written `dest` is left behind on failure; the caller owns
    /// the path and removes it.
    pub async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, PipelineError> {
        let mut request = self.client.get(url).header(header::ACCEPT, ACCEPT_AUDIO);
        if let Some(referer) = &self.referer {
            request = request.header(header::REFERER, referer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Download(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PipelineError::Download(format!(
                "source responded with status {}",
                response.status()
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::Download(format!("scratch dir: {}", e)))?;
        }

        let mut file = File::create(dest)
            .await
            .map_err(|e| PipelineError::Download(format!("create {:?}: {}", dest, e)))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| PipelineError::Download(format!("body read failed: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| PipelineError::Download(format!("write {:?}: {}", dest, e)))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| PipelineError::Download(format!("flush {:?}: {}", dest, e)))?;

        debug!("Downloaded {} bytes into {:?}", written, dest);
        Ok(written)
    }
}
