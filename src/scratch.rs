//! Per-run ownership of transient files in the shared scratch directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ScratchSpace {
    dir: PathBuf,
}

impl ScratchSpace {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create scratch directory {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Starts a run whose file names cannot collide with any other run, even
    /// for the same external id.
    pub fn start_run(&self, external_id: &str) -> ScratchRun {
        let millis = chrono::Utc::now().timestamp_millis();
        let random = uuid::Uuid::new_v4().simple().to_string();
        ScratchRun {
            dir: self.dir.clone(),
            prefix: format!("{}_{}_{}", sanitize(external_id), millis, &random[..8]),
            files: Vec::new(),
        }
    }
}

/// Files created by one pipeline run. Every path handed out by `register`
/// is removed by `cleanup`, or by `Drop` if the run is abandoned.
#[derive(Debug)]
pub struct ScratchRun {
    dir: PathBuf,
    prefix: String,
    files: Vec<PathBuf>,
}

impl ScratchRun {
    /// Reserves and records a path before anything is written to it.
    pub fn register(&mut self, role: &str, extension: &str) -> PathBuf {
        let path = self
            .dir
            .join(format!("{}_{}{}", self.prefix, role, extension));
        self.files.push(path.clone());
        path
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Removes every registered file. Missing files are fine, other removal
    /// failures are logged and never returned.
    pub async fn cleanup(&mut self) {
        for path in self.files.drain(..) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed scratch file {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove scratch file {:?}: {}", path, e),
            }
        }
    }
}

impl Drop for ScratchRun {
    fn drop(&mut self) {
        for path in self.files.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed abandoned scratch file {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove scratch file {:?}: {}", path, e),
            }
        }
    }
}

fn sanitize(external_id: &str) -> String {
    external_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
