mod file_config;

pub use file_config::{FileConfig, PipelineConfig, PlaybackConfig, ProviderConfig, StorageConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PARSE_API_URL: &str = "https://www.52api.cn/api/kuwo";
pub const DEFAULT_DETAIL_PAGE_URL: &str = "http://www.kuwo.cn/play_detail";
pub const DEFAULT_SEARCH_URL: &str = "http://search.kuwo.cn/r.s";
pub const DEFAULT_LYRIC_URL: &str = "https://api.xiaodaokg.com/kw/kwlyric.php";
pub const DEFAULT_COVER_BASE_URL: &str = "https://img1.kuwo.cn/star/albumcover/";
pub const DEFAULT_REFERER: &str = "http://www.kuwo.cn/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub public_base_url: Option<String>,
    pub parse_api_key: Option<String>,
    pub storage_endpoint: Option<String>,
    pub storage_bucket: Option<String>,
    pub storage_region: Option<String>,
    pub storage_base_url: Option<String>,
    pub storage_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    /// Prefix of the proxy URLs handed to playback clients.
    pub public_base_url: String,

    pub provider: ProviderSettings,
    pub storage: StorageSettings,
    pub pipeline: PipelineSettings,
    pub playback: PlaybackSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let scratch_dir = file
            .scratch_dir
            .map(PathBuf::from)
            .or_else(|| cli.scratch_dir.clone())
            .unwrap_or_else(|| db_dir.join("scratch"));

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let public_base_url = file
            .public_base_url
            .or_else(|| cli.public_base_url.clone())
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let provider_file = file.provider.unwrap_or_default();
        let provider = ProviderSettings {
            parse_api_url: provider_file
                .parse_api_url
                .unwrap_or_else(|| DEFAULT_PARSE_API_URL.to_string()),
            api_key: provider_file
                .api_key
                .or_else(|| cli.parse_api_key.clone())
                .filter(|k| !k.is_empty()),
            detail_page_url: provider_file
                .detail_page_url
                .unwrap_or_else(|| DEFAULT_DETAIL_PAGE_URL.to_string()),
            search_url: provider_file
                .search_url
                .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            lyric_url: provider_file
                .lyric_url
                .unwrap_or_else(|| DEFAULT_LYRIC_URL.to_string()),
            cover_base_url: provider_file
                .cover_base_url
                .unwrap_or_else(|| DEFAULT_COVER_BASE_URL.to_string()),
            timeout_secs: provider_file.timeout_secs.unwrap_or(30),
            user_agent: provider_file
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        };

        let storage_file = file.storage.unwrap_or_default();
        let storage = StorageSettings {
            endpoint: storage_file
                .endpoint
                .or_else(|| cli.storage_endpoint.clone()),
            bucket: storage_file.bucket.or_else(|| cli.storage_bucket.clone()),
            region: storage_file.region.or_else(|| cli.storage_region.clone()),
            base_url: storage_file
                .base_url
                .or_else(|| cli.storage_base_url.clone()),
            token: storage_file.token.or_else(|| cli.storage_token.clone()),
            timeout_secs: storage_file.timeout_secs.unwrap_or(60),
        };

        let pipeline_file = file.pipeline.unwrap_or_default();
        let upload_max_attempts = pipeline_file.upload_max_attempts.unwrap_or(3);
        if upload_max_attempts == 0 {
            bail!("pipeline.upload_max_attempts must be at least 1");
        }
        let pipeline = PipelineSettings {
            download_timeout_secs: pipeline_file.download_timeout_secs.unwrap_or(120),
            referer: pipeline_file
                .referer
                .or_else(|| Some(DEFAULT_REFERER.to_string()))
                .filter(|r| !r.is_empty()),
            ffmpeg_path: pipeline_file
                .ffmpeg_path
                .unwrap_or_else(|| "ffmpeg".to_string()),
            upload_max_attempts,
            upload_backoff_ms: pipeline_file.upload_backoff_ms.unwrap_or(1000),
            coalesce_concurrent_parses: pipeline_file.coalesce_concurrent_parses.unwrap_or(false),
        };

        let playback_file = file.playback.unwrap_or_default();
        let playback = PlaybackSettings {
            timeout_secs: playback_file.timeout_secs.unwrap_or(300),
            cache_max_age_secs: playback_file.cache_max_age_secs.unwrap_or(31_536_000),
        };

        Ok(Self {
            db_dir,
            scratch_dir,
            port,
            metrics_port,
            public_base_url,
            provider,
            storage,
            pipeline,
            playback,
        })
    }

    pub fn music_db_path(&self) -> PathBuf {
        self.db_dir.join("music.db")
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub parse_api_url: String,
    pub api_key: Option<String>,
    pub detail_page_url: String,
    pub search_url: String,
    pub lyric_url: String,
    pub cover_base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            parse_api_url: DEFAULT_PARSE_API_URL.to_string(),
            api_key: None,
            detail_page_url: DEFAULT_DETAIL_PAGE_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            lyric_url: DEFAULT_LYRIC_URL.to_string(),
            cover_base_url: DEFAULT_COVER_BASE_URL.to_string(),
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Write endpoint. When unset, objects are written to their public URL.
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: None,
            region: None,
            base_url: None,
            token: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub download_timeout_secs: u64,
    pub referer: Option<String>,
    pub ffmpeg_path: String,
    pub upload_max_attempts: u32,
    pub upload_backoff_ms: u64,
    pub coalesce_concurrent_parses: bool,
}

impl PipelineSettings {
    pub fn upload_backoff(&self) -> Duration {
        Duration::from_millis(self.upload_backoff_ms)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            download_timeout_secs: 120,
            referer: Some(DEFAULT_REFERER.to_string()),
            ffmpeg_path: "ffmpeg".to_string(),
            upload_max_attempts: 3,
            upload_backoff_ms: 1000,
            coalesce_concurrent_parses: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    pub timeout_secs: u64,
    pub cache_max_age_secs: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            cache_max_age_secs: 31_536_000,
        }
    }
}
