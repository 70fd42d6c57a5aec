//! Static item catalog.
//!
//! Every item that can appear in an inventory, a loot table or an equipment
//! slot is declared here. Loot tables reference items by identifier and must
//! tolerate identifiers that do not resolve.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Item rarity, ordered from most to least common.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rarity {
    /// Everyday drops
    Common,
    /// Uncommon drops
    Rare,
    /// Scarce drops
    Epic,
    /// Very scarce drops
    Legendary,
    /// Almost never seen
    Mythical,
    /// Hidden tier
    Secret,
}

impl Rarity {
    /// Every rarity, most common first.
    pub const ALL: [Self; 6] = [
        Self::Common,
        Self::Rare,
        Self::Epic,
        Self::Legendary,
        Self::Mythical,
        Self::Secret,
    ];

    /// Parses the [`Display`](fmt::Display) label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rarity| rarity.to_string() == label)
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Common => "Common",
            Self::Rare => "Rare",
            Self::Epic => "Epic",
            Self::Legendary => "Legendary",
            Self::Mythical => "Mythical",
            Self::Secret => "Secret",
        };
        f.write_str(label)
    }
}

/// Broad item category. Gear lives in the gear list, everything else in misc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Equippable tools and weapons
    Gear,
    /// Stackable crafting materials
    Material,
    /// Openable containers such as chests
    Container,
    /// Single-use items
    Consumable,
}

impl ItemKind {
    /// Every kind, in display order.
    pub const ALL: [Self; 4] = [Self::Gear, Self::Consumable, Self::Container, Self::Material];

    /// Label used in inventory views and filters.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Gear => "Tool/Gear",
            Self::Material => "Material",
            Self::Container => "Container",
            Self::Consumable => "Consumable",
        }
    }

    /// Parses a label produced by [`ItemKind::label`].
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }

    /// Short lowercase key used in component ids.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Gear => "gear",
            Self::Material => "material",
            Self::Container => "container",
            Self::Consumable => "consumable",
        }
    }

    /// Parses [`ItemKind::key`].
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

/// Damage parameters for gear usable in gathering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearPower {
    /// Flat damage per swing
    pub power: f64,
    /// Extra damage per activity level
    pub power_per_level: f64,
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Stable identifier, e.g. `ITDirt`
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Discord emoji markup
    pub emoji: &'static str,
    /// Rarity tier
    pub rarity: Rarity,
    /// Category
    pub kind: ItemKind,
    /// Coins paid when sold
    pub sell_value: u64,
    /// Activities (`dig`, `mine`, `hunt`) this item can be used in
    pub activity_tags: &'static [&'static str],
    /// Gathering damage, for tools
    pub gear: Option<GearPower>,
}

impl Item {
    /// Whether the item is tagged for `activity` (case-insensitive).
    #[must_use]
    pub fn supports(&self, activity: &str) -> bool {
        self.activity_tags
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(activity))
    }

    /// `emoji name`, trimmed.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.emoji, self.name).trim().to_string()
    }
}

const fn material(
    id: &'static str,
    name: &'static str,
    emoji: &'static str,
    rarity: Rarity,
    sell_value: u64,
) -> Item {
    Item {
        id,
        name,
        emoji,
        rarity,
        kind: ItemKind::Material,
        sell_value,
        activity_tags: &[],
        gear: None,
    }
}

const fn chest(
    id: &'static str,
    name: &'static str,
    emoji: &'static str,
    rarity: Rarity,
    sell_value: u64,
) -> Item {
    Item {
        id,
        name,
        emoji,
        rarity,
        kind: ItemKind::Container,
        sell_value,
        activity_tags: &[],
        gear: None,
    }
}

const fn tool(
    id: &'static str,
    name: &'static str,
    emoji: &'static str,
    sell_value: u64,
    activity_tags: &'static [&'static str],
    gear: Option<GearPower>,
) -> Item {
    Item {
        id,
        name,
        emoji,
        rarity: Rarity::Common,
        kind: ItemKind::Gear,
        sell_value,
        activity_tags,
        gear,
    }
}

/// Identifier of the bare-hands gear.
pub const FIST_ID: &str = "ITFist";

const BUILTIN_ITEMS: &[Item] = &[
    // Gear
    tool(FIST_ID, "Fist", "<:ITFist:1449009707355476069>", 0, &["hunt", "dig"], None),
    tool("ITWoodenSword", "Wooden Sword", "<:ITWoodenSword:1448987035363704955>", 100, &["hunt"], None),
    tool("ITWoodenShovel", "Wooden Shovel", "🪏", 120, &["dig"], None),
    tool(
        "ITWoodenPickaxe",
        "Wooden Pickaxe",
        "⛏️",
        150,
        &["mine"],
        Some(GearPower { power: 3.0, power_per_level: 0.1 }),
    ),
    tool(
        "ITStonePickaxe",
        "Stone Pickaxe",
        "⛏️",
        400,
        &["mine"],
        Some(GearPower { power: 5.0, power_per_level: 0.15 }),
    ),
    tool(
        "ITIronPickaxe",
        "Iron Pickaxe",
        "⛏️",
        1_200,
        &["mine"],
        Some(GearPower { power: 8.0, power_per_level: 0.2 }),
    ),
    // Dig materials
    material("ITDirt", "Dirt", "🟫", Rarity::Common, 1),
    material("ITBone", "Bone", "🦴", Rarity::Rare, 12),
    material("ITLeaf", "Leaf", "🍃", Rarity::Common, 2),
    material("ITFeather", "Feather", "🪶", Rarity::Common, 3),
    material("ITClay", "Clay", "🧱", Rarity::Rare, 15),
    material("ITPebbles", "Pebbles", "🪨", Rarity::Common, 4),
    material("ITTwigs", "Twigs", "🌿", Rarity::Common, 4),
    material("ITStone", "Stone", "🪨", Rarity::Common, 3),
    material("ITTreeBark", "Tree Bark", "🪵", Rarity::Common, 3),
    material("ITAcorn", "Acorn", "🌰", Rarity::Common, 4),
    // Treasure chests
    chest("ITCommonChest", "Common Treasure Chest", "<:Layer2n1:1453261380667969557>", Rarity::Common, 50),
    chest("ITRareChest", "Rare Treasure Chest", "<:Layer2n2:1453261383734132889>", Rarity::Rare, 150),
    chest("ITEpicChest", "Epic Treasure Chest", "<:Layer2n3:1453261387278061609>", Rarity::Epic, 500),
    chest(
        "ITLegendaryChest",
        "Legendary Treasure Chest",
        "<:Layer2n4:1453261390272790580>",
        Rarity::Legendary,
        1_500,
    ),
    chest(
        "ITMythicalChest",
        "Mythical Treasure Chest",
        "<:Layer2n5:1453261392852287499>",
        Rarity::Mythical,
        5_000,
    ),
    chest("ITSecretChest", "Secret Treasure Chest", "<:Layer2n6:1453261404990865420>", Rarity::Secret, 15_000),
    // Mine ores and gems
    material("ITCoal", "Coal", "⚫", Rarity::Common, 5),
    material("ITFossil", "Fossil", "🐚", Rarity::Common, 6),
    material("ITCopperOre", "Copper Ore", "🟠", Rarity::Common, 10),
    material("ITIronOre", "Iron Ore", "⚪", Rarity::Rare, 20),
    material("ITGoldOre", "Gold Ore", "🟡", Rarity::Rare, 40),
    material("ITAmethyst", "Amethyst", "🟣", Rarity::Epic, 120),
    material("ITSapphire", "Sapphire", "🔷", Rarity::Epic, 250),
    material("ITRuby", "Ruby", "🔴", Rarity::Epic, 300),
    material("ITEmerald", "Emerald", "🟢", Rarity::Legendary, 700),
    material("ITDiamond", "Diamond", "💎", Rarity::Legendary, 1_500),
    // Progression tokens
    material("ITUpgradeToken", "Upgrade Token", "<:ITUpgradeToken:1447502158059540481>", Rarity::Rare, 0),
    material("ITDigUpgradeToken", "Dig Upgrade Token", "🎟️", Rarity::Rare, 0),
    material("ITMineUpgradeToken", "Mine Upgrade Token", "🎫", Rarity::Rare, 0),
];

/// Lookup table from identifier to item.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<Item>,
    by_id: HashMap<&'static str, usize>,
}

impl Catalog {
    /// Builds a catalog from an explicit item list. Later duplicates win.
    #[must_use]
    pub fn new(items: Vec<Item>) -> Self {
        let by_id = items
            .iter()
            .enumerate()
            .map(|(index, item)| (item.id, index))
            .collect();
        Self { items, by_id }
    }

    /// The catalog shipped with the bot.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(BUILTIN_ITEMS.to_vec())
    }

    /// Resolves an identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.by_id.get(id).map(|&index| &self.items[index])
    }

    /// Finds an item by exact display name (case-insensitive).
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Item> {
        self.items
            .iter()
            .find(|item| item.name.eq_ignore_ascii_case(name))
    }

    /// Item names containing `partial`, sorted, capped at 25 for autocomplete.
    #[must_use]
    pub fn search(&self, partial: &str) -> Vec<&'static str> {
        let partial_lower = partial.to_lowercase();
        let mut names: Vec<&'static str> = self
            .items
            .iter()
            .filter(|item| item.name.to_lowercase().contains(&partial_lower))
            .map(|item| item.name)
            .collect();
        names.sort_unstable();
        names.truncate(25);
        names
    }

    /// All items in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
