//! Giveaway command - `/giveaway_start`.
//!
//! Validates the options, posts the entry card in the current channel and
//! leaves the rest to the registry timers and the component handlers.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, render},
        core::{
            giveaway::GiveawayRequest,
            presenter,
            session::MessageRef,
        },
        errors::{Error, Result},
    };
    use tracing::info;

    /// Starts a giveaway in this channel.
    #[allow(clippy::too_many_arguments)]
    #[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
    pub async fn giveaway_start(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Giveaway title"] title: String,
        #[description = "End time, e.g. 31/12/2025 18:00 UTC+2"] end_time: String,
        #[description = "Number of winners (1-5)"] winners: i64,
        #[description = "Time each winner has to claim, e.g. 5m (default: 5m)"] claim_time: Option<String>,
        #[description = "What is being given away"] description: Option<String>,
        #[description = "Who may enter"] requirements: Option<String>,
        #[description = "Thumbnail image URL"] thumbnail: Option<String>,
    ) -> Result<()> {
        let registry = &ctx.data().giveaways;
        let giveaway = registry.create(GiveawayRequest {
            title,
            description,
            thumbnail,
            end_time,
            claim_time,
            winners,
            requirements,
            channel_id: ctx.channel_id().get(),
            creator_id: ctx.author().id.to_string(),
        })?;

        let message = ctx
            .channel_id()
            .send_message(ctx.http(), render::message(&presenter::giveaway_entry(&giveaway)))
            .await?;
        registry.attach_entry_message(
            giveaway.id,
            MessageRef {
                channel_id: message.channel_id.get(),
                message_id: message.id.get(),
            },
        );
        info!(id = giveaway.id, creator = %ctx.author().id, "Giveaway posted");

        ctx.send(
            poise::CreateReply::default()
                .content(format!(
                    "✅ Giveaway `{}` started. It ends {}.",
                    giveaway.config.title,
                    presenter::relative_time(giveaway.config.ends_at)
                ))
                .ephemeral(true),
        )
        .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
