//! Gathering commands - `/dig` and `/mine`.
//!
//! Both post the home screen; everything after that happens through the
//! buttons handled in `handlers::components`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, render},
        core::{activity::Activity, presenter},
        errors::{Error, Result},
    };

    async fn open_home(ctx: poise::Context<'_, BotData, Error>, activity: Activity) -> Result<()> {
        let user_id = ctx.author().id.to_string();
        ctx.send(render::reply(&presenter::gathering_home(activity, &user_id)))
            .await?;
        Ok(())
    }

    /// Digs through layers of dirt for materials and chests.
    #[poise::command(slash_command, prefix_command)]
    pub async fn dig(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        open_home(ctx, Activity::Dig).await
    }

    /// Mines through rock for ores and gems.
    #[poise::command(slash_command, prefix_command)]
    pub async fn mine(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        open_home(ctx, Activity::Mine).await
    }
}

// Re-export all commands
pub use inner::*;
