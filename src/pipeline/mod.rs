//! One ingestion run: resolve, download, transcode, upload.

mod error;
#[cfg(test)]
pub(crate) mod testing;

pub use error::PipelineError;

use crate::resolver::Resolver;
use crate::retrieval::SourceFetcher;
use crate::scratch::{ScratchRun, ScratchSpace};
use crate::server::metrics;
use crate::transcoder::TranscoderAdapter;
use crate::uploader::{durable_key, Uploader};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseRequest {
    pub external_id: String,
    pub display_name: Option<String>,
    pub artist_hint: Option<String>,
    /// Known track length, only used to report transcode progress.
    pub duration_secs: Option<i64>,
}

impl ParseRequest {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAudio {
    pub audio_url: String,
    pub lyric_url: String,
    pub storage_key: String,
}

/// Stateless orchestrator. Holds no per-run data, so one instance serves
/// any number of concurrent runs.
pub struct Pipeline {
    resolver: Resolver,
    fetcher: SourceFetcher,
    transcoder: TranscoderAdapter,
    uploader: Uploader,
    scratch: ScratchSpace,
}

impl Pipeline {
    pub fn new(
        resolver: Resolver,
        fetcher: SourceFetcher,
        transcoder: TranscoderAdapter,
        uploader: Uploader,
        scratch: ScratchSpace,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            transcoder,
            uploader,
            scratch,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Runs every stage for one song. Scratch files of this run are gone when
    /// this returns, whatever the outcome.
    pub async fn parse_and_upload(
        &self,
        request: &ParseRequest,
    ) -> Result<ParsedAudio, PipelineError> {
        let started = Instant::now();
        let mut run = self.scratch.start_run(&request.external_id);

        let result = self.run_stages(request, &mut run).await;
        run.cleanup().await;

        let elapsed = started.elapsed();
        match &result {
            Ok(parsed) => {
                info!(
                    "Parsed {} into {} in {:.1}s",
                    request.external_id,
                    parsed.storage_key,
                    elapsed.as_secs_f64()
                );
                metrics::record_pipeline_run("success", elapsed);
            }
            Err(e) => {
                warn!("Parse of {} failed: {}", request.external_id, e);
                metrics::record_pipeline_run(e.stage(), elapsed);
            }
        }
        result
    }

    async fn run_stages(
        &self,
        request: &ParseRequest,
        run: &mut ScratchRun,
    ) -> Result<ParsedAudio, PipelineError> {
        let source = self.resolver.resolve(&request.external_id).await?;
        info!(
            "Parsing {} ({} / {}) from a {} source",
            request.external_id,
            request.display_name.as_deref().unwrap_or("?"),
            request.artist_hint.as_deref().unwrap_or("?"),
            source.format
        );

        let original = run.register("original", source.format.extension());
        let downloaded = self.fetcher.fetch_to(&source.url, &original).await?;
        info!("Downloaded {} bytes for {}", downloaded, request.external_id);

        let spec = *self.transcoder.spec();
        let compressed = run.register("compressed", spec.extension);
        let expected = request
            .duration_secs
            .filter(|d| *d > 0)
            .map(|d| Duration::from_secs(d as u64));
        self.transcoder
            .transcode(&original, &compressed, expected)
            .await?;

        let storage_key = durable_key(&request.external_id, spec.extension, chrono::Utc::now());
        let audio_url = self
            .uploader
            .upload_file(&compressed, &storage_key, spec.mime_type)
            .await?;

        Ok(ParsedAudio {
            audio_url,
            lyric_url: self.resolver.lyric_url(&request.external_id),
            storage_key,
        })
    }
}
