use dotenvy::dotenv;
use loot_buddy::{
    bot::{self, BotData},
    config::{self, database},
    core::{clock::SystemClock, random::ThreadRandom},
    errors::{Error, Result},
};
use std::{env, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the main application configuration
    let app_config = config::load_app_configuration()?;
    info!(backend = ?app_config.storage.backend, "Configuration loaded");

    // 4. Open the profile store
    let store = database::open_store(&app_config.storage)
        .await
        .inspect(|_| info!("Profile store ready."))
        .inspect_err(|e| error!("Failed to open profile store: {e}"))?;

    // 5. Wire services
    let (data, streams) = BotData::new(app_config, store, Arc::new(SystemClock), Arc::new(ThreadRandom))?;

    // 6. Run the bot
    // DISCORD_BOT_TOKEN is read directly before use, not stored in AppConfig
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {e}"))
        .map_err(Error::EnvVar)?;

    bot::run_bot(token, data, streams).await
}
