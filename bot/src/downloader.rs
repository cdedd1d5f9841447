/// External downloader invocation.
///
/// yt-dlp runs as a subprocess with stdout and stderr captured in full;
/// afterwards the workspace is scanned for the produced file. Nothing is
/// streamed and nothing is retried.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info};

use leech_shared::errors::DownloadError;

/// Bound on the title component of the yt-dlp output template.
const TITLE_MAX_CHARS: usize = 200;

/// How much of the tool's stderr ends up in the log on failure.
const STDERR_LOG_CHARS: usize = 1000;

/// Seam over the external download tool so tests can substitute fakes.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` into `dest`, producing one or more files there.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// Invokes the real yt-dlp executable.
pub struct YtDlpDownloader {
    bin: String,
}

impl YtDlpDownloader {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let template = dest.join(format!("%(title).{}s.%(ext)s", TITLE_MAX_CHARS));

        info!("Running {}: {} -> {}", self.bin, url, dest.display());
        let output = Command::new(&self.bin)
            .arg("-f")
            .arg("best")
            .arg("-o")
            .arg(&template)
            .arg(url)
            .arg("--no-playlist")
            .arg("--merge-output-format")
            .arg("mp4")
            .output()
            .await
            .map_err(|e| DownloadError::Spawn(format!("{}: {}", self.bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let prefix: String = stderr.chars().take(STDERR_LOG_CHARS).collect();
            error!("{} failed: {}", self.bin, prefix);
            return Err(DownloadError::ToolFailed {
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(())
    }
}

/// Pick the largest file in the workspace. Ties keep the first encountered;
/// an empty directory means the tool produced nothing.
pub fn select_largest(dir: &Path) -> Result<(PathBuf, u64), DownloadError> {
    let mut best: Option<(PathBuf, u64)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let size = meta.len();
        if best.as_ref().map_or(true, |(_, s)| size > *s) {
            best = Some((entry.path(), size));
        }
    }
    best.ok_or(DownloadError::NoOutput)
}
