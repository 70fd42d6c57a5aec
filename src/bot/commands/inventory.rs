//! Inventory commands - `/inventory` and `/item_info`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::autocomplete, render},
        core::{catalog::ItemKind, inventory::PlayerProfile, presenter},
        errors::{Error, Result},
    };

    /// Shows your items, optionally filtered by type.
    #[poise::command(slash_command, prefix_command)]
    pub async fn inventory(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Item type (gear, material, container, consumable)"] kind: Option<String>,
        #[description = "Page number (default: 1)"]
        #[min = 1]
        page: Option<u32>,
    ) -> Result<()> {
        let kinds = match kind.as_deref() {
            None => Vec::new(),
            Some(raw) => {
                let key = raw.trim().to_lowercase();
                let Some(parsed) = ItemKind::from_key(&key).or_else(|| ItemKind::from_label(raw.trim())) else {
                    return Err(Error::InvalidInput {
                        message: format!("Unknown item type `{raw}`. Try gear, material, container or consumable."),
                    });
                };
                vec![parsed]
            }
        };

        let profiles = &ctx.data().profiles;
        let user_id = ctx.author().id.to_string();
        let player: PlayerProfile = profiles.read(&user_id).await?;
        let view = presenter::inventory(
            &user_id,
            &ctx.author().name,
            &player,
            profiles.catalog(),
            &kinds,
            usize::try_from(page.unwrap_or(1)).unwrap_or(1),
        );
        ctx.send(render::reply(&view)).await?;
        Ok(())
    }

    /// Shows the details of a catalog item.
    #[poise::command(slash_command, prefix_command)]
    pub async fn item_info(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Item name"]
        #[autocomplete = "autocomplete::autocomplete_item_name"]
        item: String,
    ) -> Result<()> {
        let catalog = ctx.data().profiles.catalog();
        let found = catalog.find_by_name(&item).or_else(|| catalog.get(item.trim()));
        let Some(found) = found else {
            return Err(Error::InvalidInput {
                message: format!("No item called `{item}` exists."),
            });
        };
        ctx.send(render::reply(&presenter::item_info(found))).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
