//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own database, scratch
//! directory and fake upstream.

use super::constants::*;
use super::engine::CopyEngine;
use super::upstream::FakeUpstream;
use songvault_server::config::{
    AppConfig, PipelineSettings, PlaybackSettings, ProviderSettings, StorageSettings,
};
use songvault_server::music_store::MusicStore;
use songvault_server::server::{build_server_state, make_app};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// When dropped, the server shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    pub upstream: FakeUpstream,
    pub engine: Arc<CopyEngine>,
    pub store: Arc<dyn MusicStore>,
    pub scratch_dir: PathBuf,

    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Like `spawn`, letting the test adjust the configuration first.
    pub async fn spawn_with(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let upstream = FakeUpstream::spawn().await;
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig {
            db_dir: temp_dir.path().to_path_buf(),
            scratch_dir: temp_dir.path().join("scratch"),
            port,
            metrics_port: 0,
            public_base_url: base_url.clone(),
            provider: ProviderSettings {
                parse_api_url: format!("{}/parse", upstream.base_url),
                api_key: Some(TEST_API_KEY.to_string()),
                search_url: format!("{}/search", upstream.base_url),
                lyric_url: format!("{}/lyric", upstream.base_url),
                cover_base_url: "https://img.test/".to_string(),
                timeout_secs: 5,
                ..Default::default()
            },
            storage: StorageSettings {
                endpoint: Some(upstream.base_url.clone()),
                bucket: Some(TEST_BUCKET.to_string()),
                region: Some("ap-test".to_string()),
                base_url: Some(upstream.bucket_url()),
                token: Some("secret".to_string()),
                timeout_secs: 5,
            },
            pipeline: PipelineSettings {
                download_timeout_secs: 5,
                upload_backoff_ms: 1,
                ..Default::default()
            },
            playback: PlaybackSettings {
                timeout_secs: 5,
                ..Default::default()
            },
        };
        customize(&mut config);

        let engine = Arc::new(CopyEngine::default());
        let state = build_server_state(&config, engine.clone())
            .expect("Failed to build server state");
        let store = state.catalog.store().clone();
        let app = make_app(state);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            upstream,
            engine,
            store,
            scratch_dir: config.scratch_dir.clone(),
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Files currently left in the scratch directory.
    pub fn scratch_files(&self) -> Vec<String> {
        std::fs::read_dir(&self.scratch_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
