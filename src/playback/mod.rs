//! Range aware streaming proxy in front of the blob store.
//!
//! Players only ever see `/api/music/{id}/stream`. The proxy looks up the
//! durable audio URL, forwards the inbound `Range` header and pipes the
//! upstream body back without buffering it.

use crate::config::PlaybackSettings;
use crate::music_store::MusicStore;
use crate::server::metrics;
use anyhow::Context;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

const DEFAULT_RANGE: &str = "bytes=0-";
const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio not found")]
    NotFound,

    /// Upstream detail is logged, never sent to the player.
    #[error("audio unavailable")]
    Unavailable,

    #[error("catalog store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

pub struct ProxiedAudio {
    pub status: StatusCode,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub body: BoxStream<'static, Result<Bytes, std::io::Error>>,
    cache_max_age_secs: u64,
}

impl std::fmt::Debug for ProxiedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxiedAudio")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .finish_non_exhaustive()
    }
}

impl IntoResponse for ProxiedAudio {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from_stream(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or(HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        headers.insert(header::CONTENT_TYPE, content_type);
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        if let Ok(value) =
            HeaderValue::from_str(&format!("public, max-age={}", self.cache_max_age_secs))
        {
            headers.insert(header::CACHE_CONTROL, value);
        }
        if let Some(length) = self.content_length {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        }
        if let Some(range) = self.content_range.and_then(|r| HeaderValue::from_str(&r).ok()) {
            headers.insert(header::CONTENT_RANGE, range);
        }

        metrics::record_stream_request(self.status.as_u16());
        response
    }
}

pub struct StreamProxy {
    store: Arc<dyn MusicStore>,
    client: reqwest::Client,
    cache_max_age_secs: u64,
}

impl StreamProxy {
    pub fn new(store: Arc<dyn MusicStore>, settings: &PlaybackSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build playback HTTP client")?;

        Ok(Self {
            store,
            client,
            cache_max_age_secs: settings.cache_max_age_secs,
        })
    }

    /// Opens the upstream object of asset `id`, forwarding `range` or
    /// `bytes=0-` when the player sent none.
    pub async fn open(&self, id: i64, range: Option<&str>) -> Result<ProxiedAudio, PlaybackError> {
        let asset = self
            .store
            .get_by_id(id)?
            .filter(|asset| asset.is_active())
            .ok_or(PlaybackError::NotFound)?;
        let audio_url = match asset.audio_url.as_deref() {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => {
                debug!("Asset {} has no audio yet", id);
                return Err(PlaybackError::NotFound);
            }
        };

        let range = range.filter(|r| !r.trim().is_empty()).unwrap_or(DEFAULT_RANGE);
        debug!("Proxying asset {} with range {}", id, range);

        let upstream = match self
            .client
            .get(&audio_url)
            .header(header::RANGE, range)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Upstream request for asset {} failed: {}", id, e);
                metrics::record_stream_request(StatusCode::BAD_GATEWAY.as_u16());
                return Err(PlaybackError::Unavailable);
            }
        };

        let upstream_status = upstream.status();
        if !upstream_status.is_success() {
            warn!("Upstream answered {} for asset {}", upstream_status, id);
            metrics::record_stream_request(StatusCode::BAD_GATEWAY.as_u16());
            return Err(PlaybackError::Unavailable);
        }

        let headers = upstream.headers();
        let content_type = header_string(headers, header::CONTENT_TYPE)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let content_length =
            header_string(headers, header::CONTENT_LENGTH).and_then(|v| v.parse::<u64>().ok());
        let content_range = header_string(headers, header::CONTENT_RANGE);
        let status = if content_range.is_some() {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        };

        let body = upstream
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();

        Ok(ProxiedAudio {
            status,
            content_type,
            content_length,
            content_range,
            body,
            cache_max_age_secs: self.cache_max_age_secs,
        })
    }
}

fn header_string(headers: &reqwest::header::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
