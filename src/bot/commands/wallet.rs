//! Wallet commands - `/wallet` and the administrator-only `/add_currency`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::autocomplete, render},
        core::{
            presenter,
            wallet::{Currency, CurrencyChange, WalletStats},
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use tracing::info;

    /// Shows the balances of you or another user.
    #[poise::command(slash_command, prefix_command)]
    pub async fn wallet(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "User to look up (default: you)"] user: Option<serenity::User>,
    ) -> Result<()> {
        let user = user.as_ref().unwrap_or_else(|| ctx.author());
        let stats: WalletStats = ctx.data().profiles.read(&user.id.to_string()).await?;
        ctx.send(render::reply(&presenter::wallet(&user.name, &stats)))
            .await?;
        Ok(())
    }

    /// Adds or removes currency from a user's wallet.
    ///
    /// A negative amount removes currency. Removing more than the balance is
    /// refused and leaves the wallet unchanged.
    #[poise::command(slash_command, prefix_command, required_permissions = "ADMINISTRATOR")]
    pub async fn add_currency(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Currency to change"]
        #[autocomplete = "autocomplete::autocomplete_currency"]
        currency: String,
        #[description = "Amount to add (negative to remove)"] amount: i64,
        #[description = "User whose wallet changes"] user: serenity::User,
    ) -> Result<()> {
        let currency: Currency = currency.parse()?;
        let user_id = user.id.to_string();
        let change = ctx
            .data()
            .profiles
            .update(&user_id, |stats: &mut WalletStats| stats.add_currency(currency, amount))
            .await?;

        let reply = match change {
            CurrencyChange::Applied(balance) => {
                info!(
                    admin = %ctx.author().id,
                    user_id = %user_id,
                    %currency,
                    amount,
                    "Currency adjusted"
                );
                format!("✅ {} now has {balance} {} {currency}.", user.name, currency.emoji())
            }
            CurrencyChange::Insufficient { balance } => format!(
                "❌ Insufficient {currency}: {} only has {balance} {}.",
                user.name,
                currency.emoji()
            ),
        };
        ctx.say(reply).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
