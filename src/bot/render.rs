//! Turns [`View`]s into serenity builders.

use crate::core::view::{Block, Button, ButtonStyle, Select, View};
use poise::serenity_prelude as serenity;

fn button(button: &Button) -> serenity::CreateButton {
    let style = match button.style {
        ButtonStyle::Primary => serenity::ButtonStyle::Primary,
        ButtonStyle::Secondary => serenity::ButtonStyle::Secondary,
        ButtonStyle::Success => serenity::ButtonStyle::Success,
        ButtonStyle::Danger => serenity::ButtonStyle::Danger,
    };
    serenity::CreateButton::new(button.custom_id.clone())
        .label(button.label.clone())
        .style(style)
        .disabled(button.disabled)
}

fn select(select: &Select) -> serenity::CreateSelectMenu {
    let options = select
        .options
        .iter()
        .map(|option| {
            serenity::CreateSelectMenuOption::new(option.label.clone(), option.value.clone())
                .default_selection(option.default)
        })
        .collect();
    serenity::CreateSelectMenu::new(
        select.custom_id.clone(),
        serenity::CreateSelectMenuKind::String { options },
    )
    .placeholder(select.placeholder.clone())
    .min_values(select.min_values)
    .max_values(select.max_values)
    .disabled(select.disabled)
}

/// Embed carrying the view's text, colour and thumbnail.
#[must_use]
pub fn embed(view: &View) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .description(view.body())
        .colour(view.accent_color);
    if let Some(url) = &view.thumbnail {
        embed = embed.thumbnail(url.clone());
    }
    embed
}

/// Component rows in view order.
#[must_use]
pub fn components(view: &View) -> Vec<serenity::CreateActionRow> {
    view.blocks
        .iter()
        .filter_map(|block| match block {
            Block::Buttons(buttons) if !buttons.is_empty() => Some(serenity::CreateActionRow::Buttons(
                buttons.iter().map(button).collect(),
            )),
            Block::Select(menu) => Some(serenity::CreateActionRow::SelectMenu(select(menu))),
            _ => None,
        })
        .collect()
}

/// Slash command reply.
#[must_use]
pub fn reply(view: &View) -> poise::CreateReply {
    poise::CreateReply::default()
        .embed(embed(view))
        .components(components(view))
}

/// New channel or DM message.
#[must_use]
pub fn message(view: &View) -> serenity::CreateMessage {
    serenity::CreateMessage::new()
        .embed(embed(view))
        .components(components(view))
}

/// Edit replacing a message's embed and components.
#[must_use]
pub fn edit(view: &View) -> serenity::EditMessage {
    serenity::EditMessage::new()
        .embed(embed(view))
        .components(components(view))
}

/// Interaction response replacing the clicked message.
#[must_use]
pub fn update(view: &View) -> serenity::CreateInteractionResponse {
    serenity::CreateInteractionResponse::UpdateMessage(
        serenity::CreateInteractionResponseMessage::new()
            .embed(embed(view))
            .components(components(view)),
    )
}

/// Interaction response posting a new public message.
#[must_use]
pub fn fresh(view: &View) -> serenity::CreateInteractionResponse {
    serenity::CreateInteractionResponse::Message(
        serenity::CreateInteractionResponseMessage::new()
            .embed(embed(view))
            .components(components(view)),
    )
}

/// Private text reply.
#[must_use]
pub fn notice(text: &str) -> serenity::CreateInteractionResponse {
    serenity::CreateInteractionResponse::Message(
        serenity::CreateInteractionResponseMessage::new()
            .content(text)
            .ephemeral(true),
    )
}
