use thiserror::Error;

/// Failure of one ingestion stage. Each variant names the stage that failed;
/// scratch files have already been removed by the time callers see it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("could not resolve audio source: {0}")]
    Resolution(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("transcode failed: {0}")]
    Transcode(String),

    #[error("upload failed after {attempts} attempt(s): {source}")]
    Upload {
        attempts: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PipelineError {
    /// Short stage label, used for metrics and logs.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Resolution(_) => "resolution",
            PipelineError::Download(_) => "download",
            PipelineError::Transcode(_) => "transcode",
            PipelineError::Upload { .. } => "upload",
        }
    }

    pub(crate) fn upload(attempts: u32, source: anyhow::Error) -> Self {
        PipelineError::Upload {
            attempts,
            source: source.into(),
        }
    }
}
