//! Collector's Market and Collector's Shop commands.
//!
//! `/market add` takes `name - amount` lines separated by commas or new
//! lines; a negative amount takes items back off the sell list.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, render},
        core::presenter,
        errors::{Error, Result},
    };

    async fn show_market(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let market = &ctx.data().market;
        let user_id = ctx.author().id.to_string();
        let lines = market.sell_list(&user_id).await?.lines(market.catalog());
        ctx.send(render::reply(&presenter::market(&user_id, &lines))).await?;
        Ok(())
    }

    /// The Collector's Market. Use one of the subcommands.
    #[poise::command(
        slash_command,
        subcommands("market_view", "market_add", "market_clear"),
        subcommand_required
    )]
    pub async fn market(_ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        Ok(())
    }

    /// Shows your sell list.
    #[poise::command(slash_command, rename = "view")]
    pub async fn market_view(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        show_market(ctx).await
    }

    /// Adds items to your sell list.
    #[poise::command(slash_command, rename = "add")]
    pub async fn market_add(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Items as `name - amount`, separated by commas"] items: String,
    ) -> Result<()> {
        ctx.data()
            .market
            .add_to_sell_list(&ctx.author().id.to_string(), &items)
            .await?;
        show_market(ctx).await
    }

    /// Empties your sell list.
    #[poise::command(slash_command, rename = "clear")]
    pub async fn market_clear(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.data()
            .market
            .clear_sell_list(&ctx.author().id.to_string())
            .await?;
        show_market(ctx).await
    }

    /// Shows the Collector's Shop stock.
    #[poise::command(slash_command, prefix_command)]
    pub async fn shop(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let user_id = ctx.author().id.to_string();
        let listing = ctx.data().market.shop(&user_id).await?;
        ctx.send(render::reply(&presenter::shop(&user_id, &listing, 1))).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
