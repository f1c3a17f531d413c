//! ffmpeg as an external process.

use super::{ProgressSender, TranscodeEngine, TranscodeProgress, TranscodeSpec};
use crate::pipeline::PipelineError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Bytes of stderr kept for error messages.
const STDERR_TAIL: usize = 2048;

pub struct FfmpegEngine {
    program: String,
}

impl FfmpegEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Checks that the configured binary runs at all.
    pub async fn check_available(&self) -> Result<(), PipelineError> {
        let status = Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| PipelineError::Transcode(format!("{} not found: {}", self.program, e)))?;

        if !status.success() {
            return Err(PipelineError::Transcode(format!(
                "{} -version exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        spec: &TranscodeSpec,
        progress: Option<ProgressSender>,
    ) -> Result<(), PipelineError> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::Transcode(format!("output dir: {}", e)))?;
        }

        let mut child = Command::new(&self.program)
            .args(["-hide_banner", "-nostdin", "-y", "-i"])
            .arg(input)
            .args(spec.ffmpeg_args())
            .args(["-progress", "pipe:1", "-nostats"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PipelineError::Transcode(format!("failed to start {}: {}", self.program, e))
            })?;

        // stderr is drained concurrently so a chatty ffmpeg never blocks on a
        // full pipe.
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                buf
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let (Some(progress), Some(processed)) = (&progress, parse_out_time(&line)) {
                    let _ = progress.send(TranscodeProgress { processed });
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| PipelineError::Transcode(format!("waiting for ffmpeg: {}", e)))?;

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if !status.success() {
            return Err(PipelineError::Transcode(format!(
                "ffmpeg exited with {}: {}",
                status,
                stderr_tail(&stderr)
            )));
        }
        Ok(())
    }
}

/// Parses an `out_time_ms=` progress line. Despite the name ffmpeg reports
/// microseconds here.
fn parse_out_time(line: &str) -> Option<Duration> {
    let value = line.trim().strip_prefix("out_time_ms=")?;
    let micros: i64 = value.parse().ok()?;
    if micros < 0 {
        return None;
    }
    Some(Duration::from_micros(micros as u64))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
