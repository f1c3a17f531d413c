use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub scratch_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub public_base_url: Option<String>,

    // Sections
    pub provider: Option<ProviderConfig>,
    pub storage: Option<StorageConfig>,
    pub pipeline: Option<PipelineConfig>,
    pub playback: Option<PlaybackConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub parse_api_url: Option<String>,
    pub api_key: Option<String>,
    pub detail_page_url: Option<String>,
    pub search_url: Option<String>,
    pub lyric_url: Option<String>,
    pub cover_base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub download_timeout_secs: Option<u64>,
    pub referer: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub upload_max_attempts: Option<u32>,
    pub upload_backoff_ms: Option<u64>,
    pub coalesce_concurrent_parses: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PlaybackConfig {
    pub timeout_secs: Option<u64>,
    pub cache_max_age_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
