/// The per-job download/upload pipeline.
///
/// Each accepted /leech request runs here inside its own spawned task:
/// admission slot, status message, scoped workspace, downloader, size
/// gate, upload. Failures are caught at the job boundary and reported to
/// the user; nothing escapes into the dispatcher.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};
use tracing::{error, info, warn};
use uuid::Uuid;

use leech_shared::errors::{DownloadError, LeechError};
use leech_shared::gate::JobState;

use crate::commands::AppState;
use crate::downloader::{select_largest, Downloader};

/// One accepted /leech request.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub chat_id: ChatId,
    pub user_id: Option<u64>,
    pub url: String,
}

/// Run one job end to end. Never returns an error: every failure is
/// handled here, because nothing awaits the spawned task.
pub async fn run_job(bot: Bot, job: Job, state: Arc<AppState>) {
    // Slot held for the rest of the job; dropping it releases the slot on
    // every exit path.
    let _permit = match state.gate.admit(job.id).await {
        Some(p) => p,
        None => {
            warn!("Job {}: gate closed, dropping request", job.id);
            let _ = bot
                .send_message(job.chat_id, "The bot is shutting down, try again later.")
                .await;
            state.gate.finish(job.id, JobState::Failed).await;
            return;
        }
    };

    // Status message whose handle is reused for every later edit.
    let status = match bot.send_message(job.chat_id, "Starting download...").await {
        Ok(m) => m,
        Err(e) => {
            error!("Job {}: failed to send status message: {}", job.id, e);
            state.gate.finish(job.id, JobState::Failed).await;
            return;
        }
    };

    match run_pipeline(&bot, status.id, &job, &state).await {
        Ok((file_name, size)) => {
            info!("Job {}: uploaded {} ({} bytes)", job.id, file_name, size);
            state.gate.finish(job.id, JobState::Completed).await;
        }
        Err(LeechError::SizeExceeded { actual, limit }) => {
            // Reported on the status message with exact figures; not an
            // error path beyond marking the job failed.
            info!("Job {}: artifact too large ({} > {})", job.id, actual, limit);
            let _ = bot
                .edit_message_text(job.chat_id, status.id, size_exceeded_text(actual, limit))
                .await;
            state.gate.finish(job.id, JobState::Failed).await;
        }
        Err(e) => {
            error!("Job {}: pipeline failed: {:?}", job.id, e);
            let _ = bot.send_message(job.chat_id, user_error_text(&e)).await;
            state.gate.finish(job.id, JobState::Failed).await;
        }
    }
}

/// Workspace, download, artifact selection, size gate, upload.
async fn run_pipeline(
    bot: &Bot,
    status_id: MessageId,
    job: &Job,
    state: &AppState,
) -> Result<(String, u64), LeechError> {
    // Scoped workspace; the guard deletes the directory and everything in
    // it on every exit path.
    let workdir = tempfile::tempdir()?;

    state.gate.transition(job.id, JobState::Downloading).await;
    let (artifact, size) =
        download_stage(state.downloader.as_ref(), &job.url, workdir.path()).await?;
    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    info!("Job {}: downloaded {} ({} bytes)", job.id, file_name, size);

    state.gate.transition(job.id, JobState::ValidatingSize).await;
    check_size(size, state.config.max_file_size_bytes)?;

    state.gate.transition(job.id, JobState::Uploading).await;
    edit_status(
        bot,
        job.chat_id,
        status_id,
        &format!("Uploading {} ({} KB)...", file_name, size / 1024),
    )
    .await?;

    bot.send_document(job.chat_id, InputFile::file(&artifact))
        .caption(format!("Leech: {}", file_name))
        .await
        .map_err(|e| LeechError::Telegram(e.to_string()))?;

    edit_status(bot, job.chat_id, status_id, "Upload complete.").await?;
    Ok((file_name, size))
}

/// Download into the workspace and pick the artifact. Telegram-free so
/// the stage can be exercised with fake downloaders.
pub async fn download_stage(
    downloader: &dyn Downloader,
    url: &str,
    workdir: &Path,
) -> Result<(PathBuf, u64), DownloadError> {
    downloader.fetch(url, workdir).await?;
    select_largest(workdir)
}

/// The post-download size gate.
pub fn check_size(size: u64, limit: u64) -> Result<(), LeechError> {
    if size > limit {
        return Err(LeechError::SizeExceeded { actual: size, limit });
    }
    Ok(())
}

/// Status text for an artifact over the size limit, with both figures.
pub fn size_exceeded_text(actual: u64, limit: u64) -> String {
    format!("File too large: {} bytes (> {}). Aborting.", actual, limit)
}

/// One-line description sent to the user when a job fails. Download
/// failures stay generic; the diagnostic already went to the log.
pub fn user_error_text(err: &LeechError) -> String {
    match err {
        LeechError::Download(DownloadError::ToolFailed { .. })
        | LeechError::Download(DownloadError::NoOutput) => {
            "Download failed. The source may be unsupported or unavailable.".to_string()
        }
        other => format!("Error: {}", other),
    }
}

async fn edit_status(
    bot: &Bot,
    chat_id: ChatId,
    status_id: MessageId,
    text: &str,
) -> Result<(), LeechError> {
    bot.edit_message_text(chat_id, status_id, text)
        .await
        .map(|_| ())
        .map_err(|e| LeechError::Telegram(e.to_string()))
}
