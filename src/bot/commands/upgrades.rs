//! Item upgrade command - `/item_upgrade`.
//!
//! The slot picker, upgrade list, detail and confirm screens all edit the
//! same message through `handlers::components`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, render},
        core::presenter,
        errors::{Error, Result},
    };

    /// Upgrades your satchels and backpack.
    #[poise::command(slash_command, prefix_command)]
    pub async fn item_upgrade(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let upgrades = &ctx.data().item_upgrades;
        let user_id = ctx.author().id.to_string();
        let (player, _) = upgrades.overview(&user_id).await?;
        let view = presenter::item_upgrade_home(&user_id, &player, upgrades.now_ms());
        ctx.send(render::reply(&view)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
