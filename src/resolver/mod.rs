//! Turns an external song id into a downloadable source URL.

mod format;
mod parse_api;

pub use format::{build_lyric_url, detect_source_format, SourceFormat};
pub use parse_api::ParseApiProvider;

use crate::pipeline::PipelineError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Candidate source URLs for one song, as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioSources {
    pub compressed_url: Option<String>,
    pub lossless_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub external_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_secs: Option<i64>,
    pub cover_url: Option<String>,
    pub play_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchPage {
    pub total: u64,
    pub rows: Vec<SearchHit>,
}

/// External catalog that indexes songs by id.
#[async_trait]
pub trait CatalogSearchProvider: Send + Sync {
    async fn resolve_audio_sources(&self, external_id: &str)
        -> Result<AudioSources, PipelineError>;

    /// `page` is 1-based.
    async fn search(
        &self,
        keyword: &str,
        page: u32,
        page_size: u32,
    ) -> Result<SearchPage, PipelineError>;

    fn lyric_url(&self, external_id: &str) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub url: String,
    pub format: SourceFormat,
}

pub struct Resolver {
    provider: Arc<dyn CatalogSearchProvider>,
}

impl Resolver {
    pub fn new(provider: Arc<dyn CatalogSearchProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn CatalogSearchProvider> {
        &self.provider
    }

    /// Asks the provider once and picks the compressed source over the
    /// lossless one.
    pub async fn resolve(&self, external_id: &str) -> Result<ResolvedSource, PipelineError> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(PipelineError::Resolution("empty external id".to_string()));
        }

        let sources = self.provider.resolve_audio_sources(external_id).await?;
        let url = sources
            .compressed_url
            .filter(|u| !u.is_empty())
            .or_else(|| sources.lossless_url.filter(|u| !u.is_empty()))
            .ok_or_else(|| {
                PipelineError::Resolution(format!("no audio source for {}", external_id))
            })?;

        let format = detect_source_format(&url);
        info!("Resolved {} to a {} source", external_id, format);
        debug!("Source URL for {}: {}", external_id, url);

        Ok(ResolvedSource { url, format })
    }

    pub fn lyric_url(&self, external_id: &str) -> String {
        self.provider.lyric_url(external_id)
    }
}
