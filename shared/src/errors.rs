/// Unified error types for the leech bot.
use thiserror::Error;

/// Top-level error type for the job pipeline.
#[derive(Debug, Error)]
pub enum LeechError {
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    #[error("file too large: {actual} bytes (limit {limit})")]
    SizeExceeded { actual: u64, limit: u64 },

    #[error("telegram error: {0}")]
    Telegram(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the external downloader subprocess.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to spawn downloader: {0}")]
    Spawn(String),

    #[error("downloader exited with status {status}")]
    ToolFailed { status: i32, stderr: String },

    #[error("no file produced")]
    NoOutput,

    #[error("workspace read failed: {0}")]
    Workspace(#[from] std::io::Error),
}

/// Result type alias for leech operations.
pub type LeechResult<T> = Result<T, LeechError>;
