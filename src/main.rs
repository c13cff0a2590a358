use std::sync::Arc;

use anyhow::Context;

use course_companion::bot::{Bot, MessageHandler, RuntimeConfig};
use course_companion::channels::{ChannelManager, CliChannel, TelegramChannel};
use course_companion::config::BotConfig;
use course_companion::conversation::ConversationEngine;
use course_companion::profile::ProfileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export {}=123456:ABC-DEF...", BotConfig::TOKEN_VAR);
        std::process::exit(1);
    });

    eprintln!("🎓 Course Companion v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Poll timeout: {}s", config.poll_timeout.as_secs());
    match config.session_idle_timeout {
        Some(timeout) => eprintln!("   Goal conversations expire after {}s", timeout.as_secs()),
        None => eprintln!("   Goal conversations never expire"),
    }

    // ── State ────────────────────────────────────────────────────────────
    let profiles = ProfileStore::new();
    let conversations = Arc::new(ConversationEngine::new(
        Arc::clone(&profiles),
        config.session_idle_timeout,
    ));
    let handler = MessageHandler::new(profiles, conversations);

    // ── Channels ─────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();
    channels.add(Box::new(TelegramChannel::new(
        config.bot_token.clone(),
        config.poll_timeout,
    )));
    if config.cli_enabled {
        channels.add(Box::new(CliChannel::new()));
    }
    eprintln!("   Channels: {}\n", channels.names().join(", "));

    let bot = Bot::new(RuntimeConfig::from(&config), handler, channels);
    bot.run().await.context("bot stopped with an error")?;

    Ok(())
}
