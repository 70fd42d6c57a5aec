//! Bronze Coin Generator commands.
//!
//! `/generator view` posts the generator screen; the other subcommands act
//! on the stored generator and reply with the refreshed screen. The buttons
//! on that screen are handled in `handlers::components`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, render},
        core::{
            generator::{GeneratorClaim, GeneratorSetup, GeneratorStart, GeneratorState},
            presenter,
            session::MessageRef,
            view::View,
            wallet::Currency,
        },
        errors::{Error, Result},
    };

    fn screen(ctx: poise::Context<'_, BotData, Error>, state: &GeneratorState) -> View {
        let generators = &ctx.data().generators;
        presenter::generator(
            &ctx.author().id.to_string(),
            &ctx.author().name,
            Some(ctx.channel_id().get()),
            state,
            &generators.settings(),
            generators.now_ms(),
        )
    }

    /// Bronze Coin Generator. Use one of the subcommands.
    #[poise::command(
        slash_command,
        subcommands(
            "generator_view",
            "generator_setup",
            "generator_start",
            "generator_stop",
            "generator_claim",
            "generator_notify"
        ),
        subcommand_required
    )]
    pub async fn generator(_ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        Ok(())
    }

    /// Shows your generator.
    #[poise::command(slash_command, rename = "view")]
    pub async fn generator_view(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let state = ctx.data().generators.state(&ctx.author().id.to_string()).await?;
        ctx.send(render::reply(&screen(ctx, &state))).await?;
        Ok(())
    }

    /// Picks how long the next run lasts.
    #[poise::command(slash_command, rename = "setup")]
    pub async fn generator_setup(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Duration, e.g. 90m, 1.5h or 45"] time: String,
    ) -> Result<()> {
        let user_id = ctx.author().id.to_string();
        match ctx.data().generators.set_duration(&user_id, &time).await? {
            GeneratorSetup::Set(state) => {
                ctx.send(render::reply(&screen(ctx, &state))).await?;
            }
            GeneratorSetup::Busy => {
                ctx.send(
                    poise::CreateReply::default()
                        .content("Your generator is busy. Claim or stop the current run first.")
                        .ephemeral(true),
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Starts a run with the duration picked in setup.
    ///
    /// The reply becomes the message refreshed when the run finishes.
    #[poise::command(slash_command, rename = "start")]
    pub async fn generator_start(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let generators = &ctx.data().generators;
        let user_id = ctx.author().id.to_string();

        let current = generators.state(&user_id).await?;
        let handle = ctx.send(render::reply(&screen(ctx, &current))).await?;
        let message = handle.message().await?;
        let target = MessageRef {
            channel_id: message.channel_id.get(),
            message_id: message.id.get(),
        };

        let state = match generators.start(&user_id, Some(target)).await? {
            GeneratorStart::Started(state) | GeneratorStart::AlreadyRunning(state) => state,
            GeneratorStart::NoDuration => {
                ctx.send(
                    poise::CreateReply::default()
                        .content("Pick a duration first with `/generator setup <time>`, e.g. `90m` or `2h`.")
                        .ephemeral(true),
                )
                .await?;
                return Ok(());
            }
            GeneratorStart::OnCooldown { ends_at } => {
                ctx.send(
                    poise::CreateReply::default()
                        .content(format!(
                            "Your generator is cooling down. It will be ready {}.",
                            presenter::relative_time(ends_at)
                        ))
                        .ephemeral(true),
                )
                .await?;
                return Ok(());
            }
        };
        handle.edit(ctx, render::reply(&screen(ctx, &state))).await?;
        Ok(())
    }

    /// Stops the current run early.
    ///
    /// Only whole minutes elapsed are paid at the base rate, and the cooldown
    /// starts right away.
    #[poise::command(slash_command, rename = "stop")]
    pub async fn generator_stop(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let generators = &ctx.data().generators;
        let user_id = ctx.author().id.to_string();
        let Some(state) = generators.stop(&user_id).await? else {
            ctx.send(
                poise::CreateReply::default()
                    .content("Your generator is not running.")
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        };
        ctx.send(render::reply(&screen(ctx, &state))).await?;
        Ok(())
    }

    /// Collects the coins of a finished or stopped run.
    #[poise::command(slash_command, rename = "claim")]
    pub async fn generator_claim(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let generators = &ctx.data().generators;
        let user_id = ctx.author().id.to_string();
        match generators.claim(&user_id).await? {
            GeneratorClaim::Claimed { amount, state } => {
                let reply = render::reply(&screen(ctx, &state)).content(format!(
                    "Claimed {amount} {}!",
                    Currency::Coins.emoji()
                ));
                ctx.send(reply).await?;
            }
            GeneratorClaim::NothingToClaim => {
                ctx.send(
                    poise::CreateReply::default()
                        .content("There is nothing to claim yet.")
                        .ephemeral(true),
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Turns the completion DM on or off.
    #[poise::command(slash_command, rename = "notify")]
    pub async fn generator_notify(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Send a DM when a run finishes"] enabled: bool,
    ) -> Result<()> {
        let user_id = ctx.author().id.to_string();
        ctx.data().generators.set_notify(&user_id, enabled).await?;
        let text = if enabled {
            "You will get a DM when your generator finishes."
        } else {
            "Generator DMs are off."
        };
        ctx.send(poise::CreateReply::default().content(text).ephemeral(true))
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
