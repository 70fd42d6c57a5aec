//! Bot layer - Discord-specific interface, command handlers and event listeners.
//!
//! Commands and component handlers translate Discord input into calls on the
//! core services held by [`BotData`], then render the resulting views.

/// Discord command implementations (gathering, inventory, wallet, generator, giveaway, upgrades, market, pets, general)
pub mod commands;
/// Discord interaction handlers (autocomplete, components)
pub mod handlers;
/// Background tasks that turn timer events into message edits
pub mod listeners;
/// View to serenity builder conversion
pub mod render;

use crate::{
    config::AppConfig,
    core::{
        catalog::Catalog,
        clock::Clock,
        gathering::GatheringEngine,
        generator::{GeneratorEvent, GeneratorService},
        giveaway::{GiveawayEvent, GiveawayRegistry},
        item_upgrade::ItemUpgradeService,
        market::MarketService,
        pets::PetService,
        profiles::{Profiles, RecordDefaults},
        random::RandomSource,
        session::{SessionEvent, SessionRegistry},
        store::ProfileStore,
    },
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{error, info, instrument};

/// Reply used when an error must not be shown to the user.
pub const GENERIC_APOLOGY: &str = "Something went wrong while handling that. Please try again.";

/// Shared data available to all bot commands and handlers.
#[derive(Debug)]
pub struct BotData {
    /// Loaded configuration
    pub config: AppConfig,
    /// Typed profile access
    pub profiles: Arc<Profiles>,
    /// Dig and mine sessions
    pub gathering: Arc<GatheringEngine>,
    /// Bronze Coin Generator runs
    pub generators: GeneratorService,
    /// Running giveaways
    pub giveaways: GiveawayRegistry,
    /// Timed item upgrades
    pub item_upgrades: ItemUpgradeService,
    /// Collector's Market and Shop
    pub market: MarketService,
    /// Pet collections
    pub pets: PetService,
}

/// Receivers for timer-driven events, drained by [`listeners`].
#[derive(Debug)]
pub struct EventStreams {
    /// Gathering reveals and timeouts
    pub sessions: UnboundedReceiver<SessionEvent>,
    /// Generator completions
    pub generators: UnboundedReceiver<GeneratorEvent>,
    /// Giveaway draws and endings
    pub giveaways: UnboundedReceiver<GiveawayEvent>,
}

impl BotData {
    /// Wires every service over `store`.
    ///
    /// The returned streams carry the events the services raise from their
    /// own timers.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ProfileStore>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> Result<(Self, EventStreams)> {
        let (session_tx, sessions) = mpsc::unbounded_channel();
        let (generator_tx, generators) = mpsc::unbounded_channel();
        let (giveaway_tx, giveaways) = mpsc::unbounded_channel();

        let profiles = Arc::new(Profiles::new(
            store,
            Arc::new(Catalog::builtin()),
            RecordDefaults {
                inventory_capacity: config.inventory.capacity,
            },
        ));
        let registry = SessionRegistry::new(Arc::clone(&clock), config.gathering.into(), Some(session_tx));
        let gathering = Arc::new(GatheringEngine::new(
            registry,
            Arc::clone(&profiles),
            Arc::clone(&rng),
        )?);
        let generator_service = GeneratorService::new(
            Arc::clone(&profiles),
            Arc::clone(&clock),
            config.generator.into(),
            Some(generator_tx),
        );
        let item_upgrades = ItemUpgradeService::new(Arc::clone(&profiles), Arc::clone(&clock));
        let market = MarketService::new(Arc::clone(&profiles), Arc::clone(&clock), Arc::clone(&rng));
        let pets = PetService::new(Arc::clone(&profiles), Arc::clone(&clock), Arc::clone(&rng));
        let giveaway_registry = GiveawayRegistry::new(clock, rng, Some(giveaway_tx));

        Ok((
            Self {
                config,
                profiles,
                gathering,
                generators: generator_service,
                giveaways: giveaway_registry,
                item_upgrades,
                market,
                pets,
            },
            EventStreams {
                sessions,
                generators,
                giveaways,
            },
        ))
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {error}");
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            let reply = match &error {
                Error::InvalidInput { message } => message.clone(),
                _ => {
                    error!("Error in command `{}`: {error}", ctx.command().name);
                    GENERIC_APOLOGY.to_string()
                }
            };
            if let Err(e) = ctx
                .send(poise::CreateReply::default().content(reply).ephemeral(true))
                .await
            {
                error!("Failed to send error message: {e}");
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, Error>,
    data: &BotData,
) -> Result<()> {
    if let serenity::FullEvent::InteractionCreate {
        interaction: serenity::Interaction::Component(component),
    } = event
    {
        handlers::components::handle(ctx, component, data).await?;
    }
    Ok(())
}

/// Every slash command the bot registers.
#[must_use]
pub fn all_commands() -> Vec<poise::Command<BotData, Error>> {
    vec![
        commands::ping(),
        commands::help(),
        commands::dig(),
        commands::mine(),
        commands::inventory(),
        commands::item_info(),
        commands::wallet(),
        commands::add_currency(),
        commands::generator(),
        commands::giveaway_start(),
        commands::item_upgrade(),
        commands::market(),
        commands::shop(),
        commands::my_pet_army(),
    ]
}

/// Connects to Discord and runs until the gateway closes.
#[instrument(skip_all)]
pub async fn run_bot(token: String, data: BotData, streams: EventStreams) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: all_commands(),
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Registered {} commands globally", framework.options().commands.len());

                listeners::spawn(Arc::clone(&ctx.http), &data, streams);
                let resumed = data.generators.resume_all().await?;
                info!("{resumed} generators rescheduled");
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {e}"))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {e}"))?;
    Ok(())
}
