//! Autocomplete handlers for Discord slash command parameters.
//!
//! Suggestions come from the static item catalog and the currency list, so
//! none of these touch storage.

use crate::{bot::BotData, core::wallet::Currency, errors::Error};

/// Suggests item names containing what the user typed so far.
///
/// Returns up to 25 names, sorted alphabetically.
pub async fn autocomplete_item_name(ctx: poise::Context<'_, BotData, Error>, partial: &str) -> Vec<String> {
    ctx.data()
        .profiles
        .catalog()
        .search(partial)
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Suggests currency names.
pub async fn autocomplete_currency(_ctx: poise::Context<'_, BotData, Error>, partial: &str) -> Vec<String> {
    currency_names(partial)
}

fn currency_names(partial: &str) -> Vec<String> {
    let partial_lower = partial.to_lowercase();
    Currency::ALL
        .iter()
        .map(|currency| currency.key())
        .filter(|name| name.contains(&partial_lower))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_names_filter_by_partial() {
        assert_eq!(currency_names(""), vec!["coins", "diamonds", "prismatic"]);
        assert_eq!(currency_names("DIA"), vec!["diamonds"]);
        assert!(currency_names("gold").is_empty());
    }
}
