//! Pet collection command - `/my_pet_army`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, render},
        core::presenter,
        errors::{Error, Result},
    };

    /// Checks your pet/army collection.
    #[poise::command(slash_command, prefix_command)]
    pub async fn my_pet_army(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let pets = &ctx.data().pets;
        let user_id = ctx.author().id.to_string();
        let owner_id = ctx.guild().map(|guild| guild.owner_id);
        if owner_id == Some(ctx.author().id) {
            pets.grant_owner_pet(&user_id).await?;
        }
        let profile = pets.collection(&user_id).await?;
        let view = presenter::pet_army(&user_id, &ctx.author().name, &profile, None, None);
        ctx.send(render::reply(&view)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
