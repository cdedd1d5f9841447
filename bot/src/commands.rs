/// Telegram bot command handlers.
///
/// Handles /start and /leech. Anything else is outside this bot's surface
/// and falls through to the dispatcher's default handler.
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::info;
use uuid::Uuid;

use leech_shared::gate::JobGate;

use crate::config::Config;
use crate::downloader::Downloader;
use crate::pipeline::{self, Job};
use crate::urls;

/// Bot command definitions.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Leech bot commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "Download a URL and upload the file here")]
    Leech(String),
}

/// Shared application state passed to handlers and job tasks.
pub struct AppState {
    pub config: Config,
    pub gate: JobGate,
    pub downloader: Arc<dyn Downloader>,
}

/// Why a /leech request was turned away before a job existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unauthorized,
    MissingUrl,
    InvalidUrl,
}

impl Rejection {
    pub fn user_reply(&self) -> &'static str {
        match self {
            Rejection::Unauthorized => "You are not authorized to use this bot.",
            Rejection::MissingUrl => "Usage: /leech <url>",
            Rejection::InvalidUrl => "Could not detect a valid URL. Check the link and try again.",
        }
    }
}

/// Screen a /leech request. Authorization comes first; a rejected request
/// allocates no job resources.
pub fn screen_request(
    config: &Config,
    sender: Option<u64>,
    arg: &str,
) -> Result<String, Rejection> {
    if !config.is_authorized(sender) {
        return Err(Rejection::Unauthorized);
    }

    let arg = arg.trim();
    if arg.is_empty() {
        return Err(Rejection::MissingUrl);
    }

    urls::detect_first_url(arg).ok_or(Rejection::InvalidUrl)
}

/// Handle incoming commands.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => cmd_start(bot, msg).await,
        Command::Leech(arg) => cmd_leech(bot, msg, arg, state).await,
    }
}

/// /start - static greeting
async fn cmd_start(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(
        msg.chat.id,
        "Hello! Send /leech <url> and I'll download the video and upload it here.",
    )
    .await?;
    Ok(())
}

/// /leech <url> - screen the request, acknowledge, hand the job off.
async fn cmd_leech(
    bot: Bot,
    msg: Message,
    arg: String,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let sender = msg.from().map(|u| u.id.0);

    let url = match screen_request(&state.config, sender, &arg) {
        Ok(url) => url,
        Err(rejection) => {
            info!("Rejected /leech from {:?}: {:?}", sender, rejection);
            bot.send_message(msg.chat.id, rejection.user_reply()).await?;
            return Ok(());
        }
    };

    let job = Job {
        id: Uuid::new_v4(),
        chat_id: msg.chat.id,
        user_id: sender,
        url,
    };
    state.gate.register(job.id, job.chat_id.0, &job.url).await;
    info!("Job {} queued by user {:?}: {}", job.id, job.user_id, job.url);

    // Exactly one synchronous acknowledgment before the job starts.
    bot.send_message(msg.chat.id, format!("Queued download: {}", job.url))
        .await?;

    // Fire and forget: the handler keeps no reference to the outcome, and
    // the spawned task catches every failure itself.
    tokio::spawn(pipeline::run_job(bot, job, state.clone()));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_MAX_CONCURRENT_DOWNLOADS, DEFAULT_MAX_FILE_SIZE_BYTES};

    fn config_with_users(users: &[u64]) -> Config {
        Config {
            bot_token: "test-token".to_string(),
            allowed_users: users.iter().copied().collect(),
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            ytdlp_bin: "yt-dlp".to_string(),
        }
    }

    #[test]
    fn test_unauthorized_sender() {
        let config = config_with_users(&[42]);
        assert_eq!(
            screen_request(&config, Some(7), "http://x"),
            Err(Rejection::Unauthorized)
        );
    }

    #[test]
    fn test_missing_sender_with_allow_list() {
        let config = config_with_users(&[42]);
        assert_eq!(
            screen_request(&config, None, "http://x"),
            Err(Rejection::Unauthorized)
        );
    }

    #[test]
    fn test_auth_checked_before_argument() {
        let config = config_with_users(&[42]);
        assert_eq!(
            screen_request(&config, Some(7), ""),
            Err(Rejection::Unauthorized)
        );
    }

    #[test]
    fn test_missing_argument() {
        let config = config_with_users(&[]);
        assert_eq!(screen_request(&config, Some(7), ""), Err(Rejection::MissingUrl));
        assert_eq!(
            screen_request(&config, Some(7), "   "),
            Err(Rejection::MissingUrl)
        );
    }

    #[test]
    fn test_non_url_argument() {
        let config = config_with_users(&[]);
        assert_eq!(
            screen_request(&config, Some(7), "definitely not a link"),
            Err(Rejection::InvalidUrl)
        );
    }

    #[test]
    fn test_valid_request() {
        let config = config_with_users(&[42]);
        assert_eq!(
            screen_request(&config, Some(42), "http://example.com/v"),
            Ok("http://example.com/v".to_string())
        );
    }
}
