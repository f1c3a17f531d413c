//! In-process fakes for the pipeline collaborators.

use super::{Pipeline, PipelineError};
use crate::config::PipelineSettings;
use crate::resolver::{
    build_lyric_url, AudioSources, CatalogSearchProvider, Resolver, SearchHit, SearchPage,
};
use crate::retrieval::SourceFetcher;
use crate::scratch::ScratchSpace;
use crate::transcoder::{
    ProgressSender, TranscodeEngine, TranscodeProgress, TranscodeSpec, TranscoderAdapter,
};
use crate::uploader::{BlobStore, RetryPolicy, Uploader};
use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub(crate) struct FakeProvider {
    sources: Mutex<HashMap<String, AudioSources>>,
    hits: Mutex<Vec<SearchHit>>,
    call_counts: Mutex<HashMap<String, usize>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            sources: Mutex::new(HashMap::new()),
            hits: Mutex::new(Vec::new()),
            call_counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_mp3(&self, external_id: &str, url: &str) {
        self.sources.lock().unwrap().insert(
            external_id.to_string(),
            AudioSources {
                compressed_url: Some(url.to_string()),
                lossless_url: None,
            },
        );
    }

    pub fn set_hits(&self, hits: Vec<SearchHit>) {
        *self.hits.lock().unwrap() = hits;
    }

    pub fn get_call_count(&self, method: &str) -> usize {
        *self.call_counts.lock().unwrap().get(method).unwrap_or(&0)
    }

    fn increment_call(&self, method: &str) {
        let mut counts = self.call_counts.lock().unwrap();
        *counts.entry(method.to_string()).or_insert(0) += 1;
    }
}

#[async_trait]
impl CatalogSearchProvider for FakeProvider {
    async fn resolve_audio_sources(
        &self,
        external_id: &str,
    ) -> Result<AudioSources, PipelineError> {
        self.increment_call("resolve_audio_sources");
        self.sources
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| PipelineError::Resolution(format!("unknown id {}", external_id)))
    }

    async fn search(
        &self,
        _keyword: &str,
        _page: u32,
        page_size: u32,
    ) -> Result<SearchPage, PipelineError> {
        self.increment_call("search");
        let hits = self.hits.lock().unwrap();
        Ok(SearchPage {
            total: hits.len() as u64,
            rows: hits.iter().take(page_size as usize).cloned().collect(),
        })
    }

    fn lyric_url(&self, external_id: &str) -> String {
        build_lyric_url("https://lyrics.test/kw", external_id)
    }
}

/// Writes a small fake mp3 next to the input instead of running ffmpeg.
pub(crate) struct FakeEngine {
    calls: AtomicUsize,
    fail_next: AtomicBool,
    delay: Mutex<Duration>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscodeEngine for FakeEngine {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        _spec: &TranscodeSpec,
        progress: Option<ProgressSender>,
    ) -> Result<(), PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let source = tokio::fs::read(input)
            .await
            .map_err(|e| PipelineError::Transcode(e.to_string()))?;

        if self.fail_next.swap(false, Ordering::SeqCst) {
            let _ = tokio::fs::write(output, b"partial").await;
            return Err(PipelineError::Transcode("exit status 1".to_string()));
        }

        if let Some(progress) = progress {
            let _ = progress.send(TranscodeProgress {
                processed: Duration::from_secs(1),
            });
        }
        let mut encoded = b"ID3".to_vec();
        encoded.extend_from_slice(&source[..source.len().min(64)]);
        tokio::fs::write(output, encoded)
            .await
            .map_err(|e| PipelineError::Transcode(e.to_string()))
    }
}

pub(crate) struct FakeBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
    puts: AtomicUsize,
    failures_left: AtomicUsize,
}

impl FakeBlobStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            puts: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
        }
    }

    pub fn fail_puts(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            anyhow::bail!("503 Service Unavailable");
        }
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://cdn.test/{}", key)
    }
}

/// A pipeline wired to fakes plus a local HTTP server serving source audio.
pub(crate) struct TestHarness {
    pub pipeline: Arc<Pipeline>,
    pub provider: Arc<FakeProvider>,
    pub engine: Arc<FakeEngine>,
    pub store: Arc<FakeBlobStore>,
    pub scratch_dir: TempDir,
    source_base: String,
}

impl TestHarness {
    pub async fn start() -> Self {
        let router = Router::new().route("/song.flac", get(|| async { vec![0x66u8; 8192] }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let provider = Arc::new(FakeProvider::new());
        let engine = Arc::new(FakeEngine::new());
        let store = Arc::new(FakeBlobStore::new());
        let scratch_dir = TempDir::new().unwrap();

        let settings = PipelineSettings {
            referer: None,
            ..Default::default()
        };
        let pipeline = Pipeline::new(
            Resolver::new(provider.clone()),
            SourceFetcher::new(&settings, "songvault-test").unwrap(),
            TranscoderAdapter::new(engine.clone()),
            Uploader::new(
                store.clone(),
                RetryPolicy {
                    max_attempts: 3,
                    backoff_unit: Duration::from_millis(1),
                },
            ),
            ScratchSpace::new(scratch_dir.path()).unwrap(),
        );

        Self {
            pipeline: Arc::new(pipeline),
            provider,
            engine,
            store,
            scratch_dir,
            source_base: format!("http://{}", addr),
        }
    }

    pub fn source_url(&self, name: &str) -> String {
        format!("{}/{}", self.source_base, name)
    }
}

pub(crate) fn assert_scratch_empty(harness: &TestHarness) {
    let leftovers: Vec<_> = std::fs::read_dir(harness.scratch_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert!(leftovers.is_empty(), "scratch files left: {:?}", leftovers);
}
