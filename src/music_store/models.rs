use serde::{Deserialize, Serialize};

pub const DEFAULT_SOURCE: &str = "kuwo";

/// Soft-delete flag of a stored asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Deleted,
    Active,
}

impl AssetStatus {
    pub fn as_i64(&self) -> i64 {
        match self {
            AssetStatus::Deleted => 0,
            AssetStatus::Active => 1,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value == 0 {
            AssetStatus::Deleted
        } else {
            AssetStatus::Active
        }
    }
}

/// A song that went through (or is waiting for) the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicAsset {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Duration in seconds, as reported by the catalog provider.
    pub duration_secs: Option<i64>,
    pub cover_url: Option<String>,
    /// Durable storage URL. Play info hands out the proxy URL instead.
    pub audio_url: Option<String>,
    pub lyric_url: Option<String>,
    pub source: String,
    pub play_count: i64,
    pub status: AssetStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MusicAsset {
    /// True once the pipeline produced a durable audio URL for this asset.
    pub fn is_resolved(&self) -> bool {
        is_present(&self.audio_url)
    }

    pub fn is_active(&self) -> bool {
        self.status == AssetStatus::Active
    }
}

/// Incoming description of a song, as handed to `save_music`/`parse_and_save`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicMetadata {
    pub external_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_secs: Option<i64>,
    pub cover_url: Option<String>,
    pub audio_url: Option<String>,
    pub lyric_url: Option<String>,
    pub source: Option<String>,
}

impl MusicMetadata {
    pub fn new(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn source_or_default(&self) -> &str {
        self.source
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SOURCE)
    }
}

/// Fields that may be populated on an existing asset without overwriting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Backfill {
    pub cover_url: Option<String>,
    pub audio_url: Option<String>,
    pub lyric_url: Option<String>,
}

impl Backfill {
    /// Collects the values of `incoming` that would fill a gap in `existing`.
    pub fn between(existing: &MusicAsset, incoming: &MusicMetadata) -> Self {
        fn fill(current: &Option<String>, new: &Option<String>) -> Option<String> {
            if is_present(current) {
                None
            } else {
                new.clone().filter(|v| !v.is_empty())
            }
        }

        Self {
            cover_url: fill(&existing.cover_url, &incoming.cover_url),
            audio_url: fill(&existing.audio_url, &incoming.audio_url),
            lyric_url: fill(&existing.lyric_url, &incoming.lyric_url),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cover_url.is_none() && self.audio_url.is_none() && self.lyric_url.is_none()
    }
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.is_empty()).unwrap_or(false)
}
