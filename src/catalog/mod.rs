//! Idempotent catalog persistence on top of the ingestion pipeline.

mod in_flight;

pub use in_flight::{InFlightGuard, InFlightLocks};

use crate::music_store::{Backfill, MusicAsset, MusicMetadata, MusicStore};
use crate::pipeline::{ParseRequest, Pipeline, PipelineError};
use crate::resolver::SearchPage;
use crate::server::metrics;
use anyhow::anyhow;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("catalog store error: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// What a player needs to start playback. `audio_url` points at this
/// server's stream proxy, never at the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayInfo {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_secs: Option<i64>,
    pub cover_url: Option<String>,
    pub audio_url: String,
    pub lyric_url: Option<String>,
}

pub struct CatalogService {
    store: Arc<dyn MusicStore>,
    pipeline: Arc<Pipeline>,
    public_base_url: String,
    in_flight: Option<InFlightLocks>,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn MusicStore>,
        pipeline: Arc<Pipeline>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            pipeline,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            in_flight: None,
        }
    }

    /// Makes concurrent parses of one external id wait for each other, so
    /// only the first one runs the pipeline.
    pub fn with_coalesced_parses(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(InFlightLocks::new);
        self
    }

    pub fn store(&self) -> &Arc<dyn MusicStore> {
        &self.store
    }

    /// Inserts a new asset, or fills the gaps of the existing one. Populated
    /// fields are never overwritten.
    pub fn save_music(&self, metadata: MusicMetadata) -> Result<MusicAsset, CatalogError> {
        let metadata = validate(metadata)?;

        if let Some(existing) = self.store.get_by_external_id(&metadata.external_id)? {
            return self.backfill_existing(existing, &metadata);
        }

        match self.store.insert(&metadata)? {
            Some(id) => {
                info!("Saved {} as asset {}", metadata.external_id, id);
                self.store
                    .get_by_id(id)?
                    .ok_or_else(|| CatalogError::Store(anyhow!("asset {} vanished after insert", id)))
            }
            None => {
                // Someone else inserted this external id between our read and
                // our insert.
                debug!("Lost insert race for {}", metadata.external_id);
                let existing = self
                    .store
                    .get_by_external_id(&metadata.external_id)?
                    .ok_or_else(|| {
                        CatalogError::Store(anyhow!(
                            "asset {} missing after conflicting insert",
                            metadata.external_id
                        ))
                    })?;
                self.backfill_existing(existing, &metadata)
            }
        }
    }

    fn backfill_existing(
        &self,
        existing: MusicAsset,
        metadata: &MusicMetadata,
    ) -> Result<MusicAsset, CatalogError> {
        let fields = Backfill::between(&existing, metadata);
        if fields.is_empty() {
            debug!("Asset {} already complete", existing.id);
            return Ok(existing);
        }

        info!("Backfilling asset {}: {:?}", existing.id, fields);
        self.store.backfill(existing.id, &fields)?;
        self.store
            .get_by_id(existing.id)?
            .ok_or_else(|| CatalogError::Store(anyhow!("asset {} vanished", existing.id)))
    }

    /// Returns the stored asset when it already has audio, otherwise runs the
    /// pipeline and saves the result.
    pub async fn parse_and_save(&self, metadata: MusicMetadata) -> Result<MusicAsset, CatalogError> {
        let metadata = validate(metadata)?;

        if let Some(asset) = self.resolved_asset(&metadata.external_id)? {
            return Ok(asset);
        }

        let _guard = match &self.in_flight {
            Some(locks) => {
                let guard = locks.acquire(&metadata.external_id).await;
                // Whoever held the lock before us may have finished the job.
                if let Some(asset) = self.resolved_asset(&metadata.external_id)? {
                    return Ok(asset);
                }
                Some(guard)
            }
            None => None,
        };

        let parsed = self
            .pipeline
            .parse_and_upload(&ParseRequest {
                external_id: metadata.external_id.clone(),
                display_name: Some(metadata.title.clone()),
                artist_hint: metadata.artist.clone(),
                duration_secs: metadata.duration_secs,
            })
            .await?;

        self.save_music(MusicMetadata {
            audio_url: Some(parsed.audio_url),
            lyric_url: Some(parsed.lyric_url),
            ..metadata
        })
    }

    fn resolved_asset(&self, external_id: &str) -> Result<Option<MusicAsset>, CatalogError> {
        match self.store.get_by_external_id(external_id)? {
            Some(asset) if asset.is_resolved() => {
                debug!("{} already parsed as asset {}", external_id, asset.id);
                metrics::record_parse_short_circuit();
                Ok(Some(asset))
            }
            _ => Ok(None),
        }
    }

    /// Counts a play and returns the proxy based play info. `None` when the
    /// asset does not exist or was deleted.
    pub fn get_play_info(&self, id: i64) -> Result<Option<PlayInfo>, CatalogError> {
        metrics::record_play_info_request();
        if self.store.increment_play_count(id)?.is_none() {
            return Ok(None);
        }

        let Some(asset) = self.store.get_by_id(id)? else {
            return Ok(None);
        };
        Ok(Some(PlayInfo {
            id: asset.id,
            external_id: asset.external_id,
            title: asset.title,
            artist: asset.artist,
            album: asset.album,
            duration_secs: asset.duration_secs,
            cover_url: asset.cover_url,
            audio_url: format!("{}/api/music/{}/stream", self.public_base_url, asset.id),
            lyric_url: asset.lyric_url,
        }))
    }

    pub async fn search(
        &self,
        keyword: &str,
        page: u32,
        page_size: u32,
    ) -> Result<SearchPage, CatalogError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(CatalogError::InvalidInput("keyword is required".to_string()));
        }
        Ok(self
            .pipeline
            .resolver()
            .provider()
            .search(keyword, page.max(1), page_size.clamp(1, 100))
            .await?)
    }

    /// Parses the first search hit for `keyword`. `None` when nothing matches.
    pub async fn search_and_parse(&self, keyword: &str) -> Result<Option<MusicAsset>, CatalogError> {
        let page = self.search(keyword, 1, 1).await?;
        let Some(hit) = page.rows.into_iter().next() else {
            info!("No search hit for '{}'", keyword.trim());
            return Ok(None);
        };

        info!("Quick parse picked {} for '{}'", hit.external_id, keyword.trim());
        let asset = self
            .parse_and_save(MusicMetadata {
                external_id: hit.external_id,
                title: hit.title,
                artist: hit.artist,
                album: hit.album,
                duration_secs: hit.duration_secs,
                cover_url: hit.cover_url,
                ..Default::default()
            })
            .await?;
        Ok(Some(asset))
    }
}

fn validate(mut metadata: MusicMetadata) -> Result<MusicMetadata, CatalogError> {
    metadata.external_id = metadata.external_id.trim().to_string();
    if metadata.external_id.is_empty() {
        return Err(CatalogError::InvalidInput("external id is required".to_string()));
    }
    if metadata.title.trim().is_empty() {
        return Err(CatalogError::InvalidInput("title is required".to_string()));
    }
    Ok(metadata)
}
