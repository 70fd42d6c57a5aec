//! Component routing tokens.
//!
//! Every button and select menu carries a `prefix:arg:arg` custom id. The
//! prefix picks the handler, the remaining arguments carry state. Handlers that
//! belong to one user put that user's id last, except the item upgrade family,
//! which leads with it.

use std::fmt;

/// Discord's limit on custom id length.
pub const MAX_LEN: usize = 100;

/// Prefix of the inventory select menus.
pub const INVENTORY: &str = "inventory";
/// Prefix of the generator start/setup button.
pub const GENERATOR_START: &str = "generator-start";
/// Prefix of the generator stop button.
pub const GENERATOR_STOP: &str = "generator-stop";
/// Prefix of the confirmed stop button.
pub const GENERATOR_STOP_YES: &str = "generator-stop-yes";
/// Prefix of the cancelled stop button.
pub const GENERATOR_STOP_NO: &str = "generator-stop-no";
/// Prefix of the generator claim button.
pub const GENERATOR_CLAIM: &str = "generator-claim";
/// Prefix of the giveaway enter button.
pub const GIVEAWAY_ENTER: &str = "giveaway-enter";
/// Prefix of the giveaway claim button.
pub const GIVEAWAY_CLAIM: &str = "giveaway-claim";
/// Common prefix of every item upgrade component.
pub const ITEM_UPGRADE: &str = "item-upgrade";
/// Prefix of the item upgrade slot select.
pub const ITEM_UPGRADE_SLOT: &str = "item-upgrade-slot";
/// Prefix of the item upgrade page buttons.
pub const ITEM_UPGRADE_PAGE: &str = "item-upgrade-page";
/// Prefix of the button opening one upgrade.
pub const ITEM_UPGRADE_SELECT: &str = "item-upgrade-select";
/// Prefix of the button paying for an upgrade.
pub const ITEM_UPGRADE_CONFIRM: &str = "item-upgrade-confirm";
/// Prefix of the claim button of a finished upgrade.
pub const ITEM_UPGRADE_CLAIM: &str = "item-upgrade-claim";
/// Prefix of the Collector's Market buttons.
pub const MARKET: &str = "market";
/// Prefix of the Collector's Shop buy buttons.
pub const SHOP_BUY: &str = "shop-buy";
/// Prefix of the Collector's Shop page select.
pub const SHOP_PAGE: &str = "shop-page";
/// Prefix of the pet collection components.
pub const PET_ARMY: &str = "pet-army";

/// A parsed custom id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentId {
    /// Handler selector
    pub prefix: String,
    /// Positional arguments
    pub args: Vec<String>,
}

impl ComponentId {
    /// Builds an id from a prefix and arguments.
    pub fn new<I, S>(prefix: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefix: prefix.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a raw custom id. Returns `None` for empty or oversized input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.len() > MAX_LEN {
            return None;
        }
        let mut parts = raw.split(':');
        let prefix = parts.next().filter(|p| !p.is_empty())?;
        Some(Self {
            prefix: prefix.to_string(),
            args: parts.map(str::to_string).collect(),
        })
    }

    /// Argument at `index`.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// The owning user id, by convention the last argument.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        if self.prefix.starts_with(ITEM_UPGRADE) {
            return self.arg(0);
        }
        self.args.last().map(String::as_str)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)?;
        for arg in &self.args {
            write!(f, ":{arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_splits_prefix_and_args() {
        let id = ComponentId::parse("dig-select:gear:1234").unwrap();
        assert_eq!(id.prefix, "dig-select");
        assert_eq!(id.arg(0), Some("gear"));
        assert_eq!(id.owner(), Some("1234"));
        assert_eq!(id.to_string(), "dig-select:gear:1234");
    }

    #[test]
    fn test_parse_keeps_empty_args() {
        let id = ComponentId::parse("inventory:page::42").unwrap();
        assert_eq!(id.args, vec!["page", "", "42"]);
    }

    #[test]
    fn test_parse_rejects_empty_and_oversized() {
        assert!(ComponentId::parse("").is_none());
        assert!(ComponentId::parse(":x").is_none());
        assert!(ComponentId::parse(&"a".repeat(MAX_LEN + 1)).is_none());
    }

    #[test]
    fn test_item_upgrade_confirm_round_trip() {
        let id = ComponentId::new(ITEM_UPGRADE_CONFIRM, ["1234", "1", "backpack_inventory_2"]);
        let raw = id.to_string();
        assert_eq!(raw, "item-upgrade-confirm:1234:1:backpack_inventory_2");

        let parsed = ComponentId::parse(&raw).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.owner(), Some("1234"));
        assert_eq!(parsed.arg(1), Some("1"));
        assert_eq!(parsed.arg(2), Some("backpack_inventory_2"));
    }

    #[test]
    fn test_display_without_args() {
        assert_eq!(ComponentId::new(GENERATOR_CLAIM, Vec::<String>::new()).to_string(), "generator-claim");
        assert_eq!(ComponentId::parse("generator-claim").unwrap().owner(), None);
    }
}
