//! Normalises source audio into the fixed delivery format.

mod ffmpeg;

pub use ffmpeg::FfmpegEngine;

use crate::pipeline::PipelineError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Output format policy. Every ingested song is stored this way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeSpec {
    pub format: &'static str,
    pub codec: &'static str,
    pub bitrate_kbps: u32,
    pub channels: u32,
    pub sample_rate_hz: u32,
    pub extension: &'static str,
    pub mime_type: &'static str,
}

impl TranscodeSpec {
    /// mp3, 96 kbps, stereo, 44.1 kHz. Keeps a typical song around 3 MB.
    pub const STANDARD: TranscodeSpec = TranscodeSpec {
        format: "mp3",
        codec: "libmp3lame",
        bitrate_kbps: 96,
        channels: 2,
        sample_rate_hz: 44_100,
        extension: ".mp3",
        mime_type: "audio/mpeg",
    };

    /// Output options for ffmpeg, placed after the input.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-vn".to_string(),
            "-c:a".to_string(),
            self.codec.to_string(),
            "-b:a".to_string(),
            format!("{}k", self.bitrate_kbps),
            "-ac".to_string(),
            self.channels.to_string(),
            "-ar".to_string(),
            self.sample_rate_hz.to_string(),
            "-f".to_string(),
            self.format.to_string(),
        ]
    }
}

/// How much of the input has been encoded so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeProgress {
    pub processed: Duration,
}

impl TranscodeProgress {
    pub fn percent_of(&self, total: Duration) -> Option<u32> {
        if total.is_zero() {
            return None;
        }
        let pct = self.processed.as_secs_f64() / total.as_secs_f64() * 100.0;
        Some(pct.clamp(0.0, 100.0) as u32)
    }
}

pub type ProgressSender = mpsc::UnboundedSender<TranscodeProgress>;

#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Encodes `input` into `output`. Progress events are informational and
    /// may be dropped by the receiver.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        spec: &TranscodeSpec,
        progress: Option<ProgressSender>,
    ) -> Result<(), PipelineError>;
}

pub struct TranscoderAdapter {
    engine: Arc<dyn TranscodeEngine>,
    spec: TranscodeSpec,
}

impl TranscoderAdapter {
    pub fn new(engine: Arc<dyn TranscodeEngine>) -> Self {
        Self {
            engine,
            spec: TranscodeSpec::STANDARD,
        }
    }

    pub fn spec(&self) -> &TranscodeSpec {
        &self.spec
    }

    /// Always transcodes, even when the source already looks like mp3, so the
    /// stored bitrate and layout are uniform.
    pub async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        expected_duration: Option<Duration>,
    ) -> Result<u64, PipelineError> {
        info!("Transcoding {:?} -> {:?}", input, output);
        let started = Instant::now();

        let (tx, mut rx) = mpsc::unbounded_channel::<TranscodeProgress>();
        let log_progress = async move {
            let mut last_step = 0;
            while let Some(progress) = rx.recv().await {
                let Some(pct) = expected_duration.and_then(|d| progress.percent_of(d)) else {
                    continue;
                };
                let step = pct / 10;
                if step > last_step {
                    last_step = step;
                    debug!("Transcode progress {:?}: {}%", output, step * 10);
                }
            }
        };

        let (result, ()) = tokio::join!(
            self.engine.transcode(input, output, &self.spec, Some(tx)),
            log_progress
        );
        result?;

        let size = tokio::fs::metadata(output)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if size == 0 {
            return Err(PipelineError::Transcode(format!(
                "engine produced no output at {:?}",
                output
            )));
        }

        info!(
            "Transcoded {:?} ({} bytes) in {:.1}s",
            output,
            size,
            started.elapsed().as_secs_f64()
        );
        Ok(size)
    }
}
