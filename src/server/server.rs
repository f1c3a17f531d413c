use anyhow::{Context, Result};
use std::time::{Duration, Instant};

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tracing::info;

use super::music_routes::make_music_routes;
use super::{metrics, state::*, ServerConfig};
use crate::catalog::CatalogService;
use crate::config::AppConfig;
use crate::music_store::{MusicStore, SqliteMusicStore};
use crate::pipeline::Pipeline;
use crate::playback::StreamProxy;
use crate::resolver::{ParseApiProvider, Resolver};
use crate::retrieval::SourceFetcher;
use crate::scratch::ScratchSpace;
use crate::transcoder::{TranscodeEngine, TranscoderAdapter};
use crate::uploader::{HttpBlobStore, RetryPolicy, Uploader};
use std::sync::Arc;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub assets: Option<usize>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let assets = state.catalog.store().count().ok();
    if let Some(count) = assets {
        metrics::set_catalog_assets(count);
    }
    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        assets,
    })
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        catalog: GuardedCatalogService,
        stream_proxy: GuardedStreamProxy,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            catalog,
            stream_proxy,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

/// Wires the production collaborators from `config`. Only the transcode
/// engine is injected.
pub fn build_server_state(
    config: &AppConfig,
    engine: Arc<dyn TranscodeEngine>,
) -> Result<ServerState> {
    info!("Opening music database at {:?}...", config.music_db_path());
    let store: Arc<dyn MusicStore> = Arc::new(SqliteMusicStore::new(config.music_db_path())?);

    let provider = ParseApiProvider::new(config.provider.clone())?;
    let blob_store = HttpBlobStore::new(&config.storage)?;
    let pipeline = Pipeline::new(
        Resolver::new(Arc::new(provider)),
        SourceFetcher::new(&config.pipeline, &config.provider.user_agent)?,
        TranscoderAdapter::new(engine),
        Uploader::new(Arc::new(blob_store), RetryPolicy::new(&config.pipeline)),
        ScratchSpace::new(&config.scratch_dir)?,
    );

    let catalog = CatalogService::new(store.clone(), Arc::new(pipeline), &config.public_base_url)
        .with_coalesced_parses(config.pipeline.coalesce_concurrent_parses);
    let stream_proxy = StreamProxy::new(store, &config.playback)?;

    let server_config = ServerConfig {
        port: config.port,
        metrics_port: config.metrics_port,
    };
    Ok(ServerState::new(
        server_config,
        Arc::new(catalog),
        Arc::new(stream_proxy),
    ))
}

pub fn make_app(state: ServerState) -> Router {
    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    home_router.nest("/api", make_music_routes(state))
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;

    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, make_metrics_app()).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });
    info!("Metrics available at port {}!", metrics_port);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Ready to serve at port {}!", port);

    Ok(axum::serve(listener, make_app(state)).await?)
}
