use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use songvault_server::config;
use songvault_server::music_store::MusicStore;
use songvault_server::server::{build_server_state, metrics, run_server};
use songvault_server::transcoder::FfmpegEngine;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
#[clap(version = env!("SONGVAULT_VERSION"))]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding music.db. Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// Directory for transient download and transcode files.
    /// Defaults to a `scratch` directory inside db_dir.
    #[clap(long, value_parser = parse_path)]
    pub scratch_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// Base URL players use to reach this server, used to build stream URLs.
    #[clap(long)]
    pub public_base_url: Option<String>,

    /// Key of the third-party parse API.
    #[clap(long, env = "SONGVAULT_PARSE_API_KEY", hide_env_values = true)]
    pub parse_api_key: Option<String>,

    /// Write endpoint of the object storage. Defaults to the public bucket URL.
    #[clap(long)]
    pub storage_endpoint: Option<String>,

    #[clap(long, env = "SONGVAULT_STORAGE_BUCKET")]
    pub storage_bucket: Option<String>,

    #[clap(long, env = "SONGVAULT_STORAGE_REGION")]
    pub storage_region: Option<String>,

    /// Public base URL of stored objects.
    #[clap(long)]
    pub storage_base_url: Option<String>,

    /// Bearer token sent with storage writes.
    #[clap(long, env = "SONGVAULT_STORAGE_TOKEN", hide_env_values = true)]
    pub storage_token: Option<String>,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            scratch_dir: args.scratch_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            public_base_url: args.public_base_url.clone(),
            parse_api_key: args.parse_api_key.clone(),
            storage_endpoint: args.storage_endpoint.clone(),
            storage_bucket: args.storage_bucket.clone(),
            storage_region: args.storage_region.clone(),
            storage_base_url: args.storage_base_url.clone(),
            storage_token: args.storage_token.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Starting songvault-server {}", env!("SONGVAULT_VERSION"));
    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  scratch_dir: {:?}", app_config.scratch_dir);
    info!("  port: {}", app_config.port);
    info!("  public_base_url: {}", app_config.public_base_url);
    if app_config.provider.api_key.is_none() {
        warn!("No parse API key configured, every parse will fail until one is set");
    }

    let engine = FfmpegEngine::new(app_config.pipeline.ffmpeg_path.clone());
    if let Err(e) = engine.check_available().await {
        warn!("Transcoding is unavailable: {}", e);
    }

    info!("Initializing metrics...");
    metrics::init_metrics();

    let state = build_server_state(&app_config, Arc::new(engine))?;
    metrics::set_catalog_assets(state.catalog.store().count()?);

    run_server(state).await
}
