use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shophunter::bot::{self, DialogueManager};
use shophunter::catalog::HttpCatalog;
use shophunter::config::BotConfig;
use shophunter::db::SqliteSettingsStore;
use shophunter::geocoder::NominatimGeocoder;
use shophunter::localization::init_localization;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    init_tracing();

    info!("Starting ShopHunter Telegram Bot");

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    init_localization()?;

    info!(path = %config.settings_db_path, "Opening settings database");
    let settings = Arc::new(SqliteSettingsStore::connect(&config.settings_db_path).await?);

    let client = reqwest::Client::builder()
        .user_agent(config.services.user_agent.clone())
        .timeout(Duration::from_millis(config.services.recovery.operation_timeout_ms))
        .build()?;
    let catalog = Arc::new(HttpCatalog::new(client.clone(), &config.services));
    let geocoder = Arc::new(NominatimGeocoder::new(client, &config.services));

    // Initialize the bot
    let bot = Bot::new(config.bot_token.clone());

    let manager = Arc::new(
        DialogueManager::new(bot.clone(), settings.clone(), catalog, geocoder)
            .with_default_language(&config.default_language)
            .with_result_limit(config.services.result_limit),
    );

    info!(default_language = %config.default_language, "Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![manager])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    settings.close().await;
    info!("Bot stopped");
    Ok(())
}
