/// Leech bot - main entry point.
///
/// Telegram bot built with teloxide: /leech <url> runs yt-dlp in a scoped
/// workspace and uploads the result back to the chat, with concurrent
/// downloads bounded by an admission gate.
mod commands;
mod config;
mod downloader;
mod pipeline;
mod urls;

use std::sync::Arc;

use anyhow::Context;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

use leech_shared::gate::JobGate;

use commands::{AppState, Command};
use config::Config;
use downloader::YtDlpDownloader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("leech_bot=info".parse().unwrap())
                .add_directive("leech_shared=info".parse().unwrap()),
        )
        .init();

    info!("=== Leech Bot Starting ===");

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        "Slots: {}, size limit: {} bytes, allow-list: {}",
        config.max_concurrent_downloads,
        config.max_file_size_bytes,
        if config.allowed_users.is_empty() {
            "open to everyone".to_string()
        } else {
            format!("{} users", config.allowed_users.len())
        },
    );

    let gate = JobGate::new(config.max_concurrent_downloads);
    let downloader = Arc::new(YtDlpDownloader::new(config.ytdlp_bin.clone()));
    let bot = Bot::new(config.bot_token.clone());

    let state = Arc::new(AppState {
        config,
        gate,
        downloader,
    });

    // Clear any existing webhook before polling
    // (prevents 409 Conflict if a webhook was previously set)
    match bot.delete_webhook().send().await {
        Ok(_) => info!("Webhook cleared (ready for polling)"),
        Err(e) => warn!("Failed to delete webhook: {} (continuing anyway)", e),
    }

    // Sync commands with Telegram (enables autocomplete menu)
    match bot.set_my_commands(Command::bot_commands()).await {
        Ok(_) => info!("Bot commands synced with Telegram"),
        Err(e) => error!("Failed to sync bot commands: {}", e),
    }

    info!("Bot initialized, starting dispatcher...");

    let handler = dptree::entry().branch(
        Update::filter_message()
            .filter_command::<Command>()
            .endpoint({
                let state = state.clone();
                move |bot: Bot, msg: Message, cmd: Command| {
                    let state = state.clone();
                    async move { commands::handle_command(bot, msg, cmd, state).await }
                }
            }),
    );

    Dispatcher::builder(bot, handler)
        .default_handler(|upd| async move {
            // Non-command traffic is outside this bot's surface.
            debug!("Ignoring update: {:?}", upd.kind);
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Leech bot stopped.");
    Ok(())
}
