//! Loot tables and the layer loot roll.
//!
//! A roll first picks a mutually exclusive treasure tier from the table for
//! the current layer. Chest tiers award one chest and their own XP. The normal
//! tier awards the activity's base material plus every secondary drop that
//! succeeds its own independent trial.

use crate::{
    core::{
        activity::Activity,
        catalog::{Catalog, Rarity},
        random::{RandomSource, uniform_int},
    },
    errors::{Error, Result},
};
use tracing::warn;

/// Name of the non-treasure tier.
pub const NORMAL_TIER: &str = "Normal Layout";

/// Tolerance when checking that tier chances sum to at most 1.
const CHANCE_EPSILON: f64 = 1e-9;

/// A chest awarded by a treasure tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChestReward {
    /// Chest item identifier
    pub item: &'static str,
    /// Inclusive XP range
    pub xp: (f64, f64),
}

/// One mutually exclusive outcome of the treasure roll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreasureTier {
    /// Tier name, [`NORMAL_TIER`] for the base outcome
    pub name: &'static str,
    /// Probability in `[0, 1]`
    pub chance: f64,
    /// Chest awarded, `None` for the base outcome
    pub chest: Option<ChestReward>,
}

/// Treasure tiers used from `min_layer` upwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TreasureTable {
    /// First layer this table applies to
    pub min_layer: i64,
    /// Tiers in cumulative order
    pub tiers: Vec<TreasureTier>,
}

/// How a drop chance is compared against the draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanceScale {
    /// Chance in `[0, 1]`, succeeds when `r <= chance`
    Unit,
    /// Chance in `[0, 100]`, succeeds when `r * 100 <= chance`
    Percent,
}

/// XP paid for a secondary drop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropXp {
    /// Fixed inclusive range
    Range(f64, f64),
    /// Range looked up from the item's rarity
    ByRarity,
}

/// One independent secondary drop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropEntry {
    /// Item identifier
    pub item: &'static str,
    /// Chance, interpreted through the table's [`ChanceScale`]
    pub chance: f64,
    /// XP on success
    pub xp: DropXp,
}

/// Secondary drops used up to and including `max_layer`.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    /// Last layer this table applies to, `None` for unbounded
    pub max_layer: Option<i64>,
    /// How chances are expressed
    pub scale: ChanceScale,
    /// Independent entries
    pub entries: Vec<DropEntry>,
}

/// Everything needed to roll loot for one activity.
#[derive(Debug, Clone, PartialEq)]
pub struct LootTables {
    /// Base material identifier
    pub base_item: &'static str,
    /// Base XP range for a normal layer
    pub base_xp: (f64, f64),
    /// Treasure tables, highest `min_layer` first
    pub treasure: Vec<TreasureTable>,
    /// Drop tables, lowest `max_layer` first
    pub drops: Vec<DropTable>,
}

/// One awarded item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootItem {
    /// Catalog identifier
    pub item_id: &'static str,
    /// Units awarded
    pub amount: u32,
}

/// Result of a loot roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootOutcome {
    /// Selected treasure tier
    pub tier: &'static str,
    /// Items awarded
    pub items: Vec<LootItem>,
    /// XP awarded
    pub xp: u64,
}

const fn normal(chance: f64) -> TreasureTier {
    TreasureTier {
        name: NORMAL_TIER,
        chance,
        chest: None,
    }
}

const fn chest_tier(name: &'static str, chance: f64, item: &'static str, xp: (f64, f64)) -> TreasureTier {
    TreasureTier {
        name,
        chance,
        chest: Some(ChestReward { item, xp }),
    }
}

const fn common(chance: f64) -> TreasureTier {
    chest_tier("Common Treasure", chance, "ITCommonChest", (50.0, 80.0))
}

const fn rare(chance: f64) -> TreasureTier {
    chest_tier("Rare Treasure", chance, "ITRareChest", (80.0, 150.0))
}

const fn epic(chance: f64) -> TreasureTier {
    chest_tier("Epic Treasure", chance, "ITEpicChest", (200.0, 450.0))
}

const fn legendary(chance: f64) -> TreasureTier {
    chest_tier("Legendary Treasure", chance, "ITLegendaryChest", (500.0, 800.0))
}

const fn mythical(chance: f64) -> TreasureTier {
    chest_tier("Mythical Treasure", chance, "ITMythicalChest", (1_000.0, 2_500.0))
}

const fn secret(chance: f64) -> TreasureTier {
    chest_tier("Secret Treasure", chance, "ITSecretChest", (3_000.0, 5_000.0))
}

const fn dig_drop(item: &'static str, chance: f64, min: f64, max: f64) -> DropEntry {
    DropEntry {
        item,
        chance,
        xp: DropXp::Range(min, max),
    }
}

const fn ore(item: &'static str, chance: f64) -> DropEntry {
    DropEntry {
        item,
        chance,
        xp: DropXp::ByRarity,
    }
}

/// XP range paid for an ore of `rarity`.
#[must_use]
pub const fn ore_xp(rarity: Option<Rarity>) -> (f64, f64) {
    match rarity {
        Some(Rarity::Common) => (6.0, 12.0),
        Some(Rarity::Rare) => (14.0, 20.0),
        Some(Rarity::Epic) => (20.0, 28.0),
        Some(Rarity::Legendary) => (30.0, 45.0),
        _ => (10.0, 20.0),
    }
}

impl LootTables {
    /// Built-in tables for `activity`.
    #[must_use]
    pub fn for_activity(activity: Activity) -> Self {
        match activity {
            Activity::Dig => Self::dig(),
            Activity::Mine => Self::mine(),
        }
    }

    fn dig() -> Self {
        let treasure = vec![
            TreasureTable {
                min_layer: 200,
                tiers: vec![
                    normal(0.8),
                    common(0.12),
                    rare(0.06),
                    epic(0.015),
                    legendary(0.0045),
                    mythical(0.000_49),
                    secret(0.000_01),
                ],
            },
            TreasureTable {
                min_layer: 136,
                tiers: vec![
                    normal(0.85),
                    common(0.1),
                    rare(0.04),
                    epic(0.0075),
                    legendary(0.0024),
                    mythical(0.0001),
                ],
            },
            TreasureTable {
                min_layer: 71,
                tiers: vec![normal(0.86), common(0.1), rare(0.035), epic(0.005)],
            },
            TreasureTable {
                min_layer: 26,
                tiers: vec![normal(0.9), common(0.075), rare(0.025)],
            },
            TreasureTable {
                min_layer: i64::MIN,
                tiers: vec![normal(0.95), common(0.05)],
            },
        ];
        let drops = vec![DropTable {
            max_layer: None,
            scale: ChanceScale::Unit,
            entries: vec![
                dig_drop("ITBone", 0.1, 10.0, 20.0),
                dig_drop("ITLeaf", 0.55, 5.0, 10.0),
                dig_drop("ITFeather", 0.35, 6.0, 13.0),
                dig_drop("ITClay", 0.08, 12.0, 24.0),
                dig_drop("ITPebbles", 0.25, 8.0, 15.0),
                dig_drop("ITTwigs", 0.25, 8.0, 15.0),
                dig_drop("ITStone", 0.35, 7.0, 14.0),
                dig_drop("ITTreeBark", 0.3, 7.0, 14.0),
                dig_drop("ITAcorn", 0.28, 8.0, 14.0),
            ],
        }];
        Self {
            base_item: Activity::Dig.base_item(),
            base_xp: Activity::Dig.base_xp(),
            treasure,
            drops,
        }
    }

    fn mine() -> Self {
        let treasure = vec![TreasureTable {
            min_layer: i64::MIN,
            tiers: vec![normal(1.0)],
        }];
        let drops = vec![
            DropTable {
                max_layer: Some(50),
                scale: ChanceScale::Percent,
                entries: vec![
                    ore("ITCoal", 15.0),
                    ore("ITFossil", 20.0),
                    ore("ITCopperOre", 9.0),
                    ore("ITIronOre", 6.0),
                    ore("ITGoldOre", 2.5),
                ],
            },
            DropTable {
                max_layer: None,
                scale: ChanceScale::Percent,
                entries: vec![
                    ore("ITCoal", 25.0),
                    ore("ITFossil", 35.0),
                    ore("ITCopperOre", 15.0),
                    ore("ITIronOre", 10.0),
                    ore("ITGoldOre", 5.0),
                    ore("ITDiamond", 0.005_25),
                    ore("ITEmerald", 0.015),
                    ore("ITSapphire", 0.1),
                    ore("ITRuby", 0.065),
                    ore("ITAmethyst", 0.5),
                ],
            },
        ];
        Self {
            base_item: Activity::Mine.base_item(),
            base_xp: Activity::Mine.base_xp(),
            treasure,
            drops,
        }
    }

    /// Checks every table invariant: tier chances in `[0, 1]` summing to at
    /// most 1, each treasure table starting with the normal tier, and drop
    /// chances inside their scale.
    pub fn validate(&self) -> Result<()> {
        if self.treasure.is_empty() {
            return Err(Error::Config {
                message: "Loot tables need at least one treasure table".to_string(),
            });
        }
        for table in &self.treasure {
            if table.tiers.first().is_none_or(|tier| tier.chest.is_some()) {
                return Err(Error::Config {
                    message: format!(
                        "Treasure table for layer {} must start with the normal tier",
                        table.min_layer
                    ),
                });
            }
            let mut total = 0.0;
            for tier in &table.tiers {
                if !(0.0..=1.0).contains(&tier.chance) {
                    return Err(Error::Config {
                        message: format!("Tier {} has chance {} outside [0, 1]", tier.name, tier.chance),
                    });
                }
                total += tier.chance;
            }
            if total > 1.0 + CHANCE_EPSILON {
                return Err(Error::Config {
                    message: format!(
                        "Treasure table for layer {} sums to {total}, above 1",
                        table.min_layer
                    ),
                });
            }
        }
        for table in &self.drops {
            let max = match table.scale {
                ChanceScale::Unit => 1.0,
                ChanceScale::Percent => 100.0,
            };
            if let Some(entry) = table.entries.iter().find(|e| !(0.0..=max).contains(&e.chance)) {
                return Err(Error::Config {
                    message: format!("Drop {} has chance {} outside [0, {max}]", entry.item, entry.chance),
                });
            }
        }
        Ok(())
    }

    fn treasure_for(&self, layer: i64) -> Option<&TreasureTable> {
        self.treasure.iter().find(|table| layer >= table.min_layer)
    }

    fn drops_for(&self, layer: i64) -> Option<&DropTable> {
        self.drops
            .iter()
            .find(|table| table.max_layer.is_none_or(|max| layer <= max))
    }
}

/// Cumulative-band tier selection; falls back to the first (normal) tier.
fn pick_tier<'t>(table: &'t TreasureTable, r: f64) -> Option<&'t TreasureTier> {
    let mut cumulative = 0.0;
    for tier in &table.tiers {
        cumulative += tier.chance;
        if cumulative >= r {
            return Some(tier);
        }
    }
    table.tiers.first()
}

#[allow(clippy::cast_sign_loss)]
fn xp_draw(rng: &dyn RandomSource, range: (f64, f64)) -> u64 {
    uniform_int(rng, range.0, range.1).max(0) as u64
}

/// Rolls the loot for one completed `layer`.
///
/// Identifiers missing from `catalog` are skipped with a warning: an
/// unresolved chest falls through to the normal tier, an unresolved drop
/// awards neither item nor XP.
pub fn roll_loot(
    tables: &LootTables,
    catalog: &Catalog,
    rng: &dyn RandomSource,
    layer: i64,
) -> LootOutcome {
    let tier = tables
        .treasure_for(layer)
        .and_then(|table| pick_tier(table, rng.next_f64()));

    if let Some(chest) = tier.and_then(|tier| tier.chest) {
        if let Some(item) = catalog.get(chest.item) {
            return LootOutcome {
                tier: tier.map_or(NORMAL_TIER, |tier| tier.name),
                items: vec![LootItem {
                    item_id: item.id,
                    amount: 1,
                }],
                xp: xp_draw(rng, chest.xp),
            };
        }
        warn!("Treasure chest {} is not in the catalog, rolling a normal layer", chest.item);
    }

    let mut items = Vec::new();
    match catalog.get(tables.base_item) {
        Some(item) => items.push(LootItem {
            item_id: item.id,
            amount: 1,
        }),
        None => warn!("Base item {} is not in the catalog", tables.base_item),
    }
    let mut xp = xp_draw(rng, tables.base_xp);

    if let Some(table) = tables.drops_for(layer) {
        for entry in &table.entries {
            let draw = rng.next_f64();
            let hit = match table.scale {
                ChanceScale::Unit => draw <= entry.chance,
                ChanceScale::Percent => draw * 100.0 <= entry.chance,
            };
            if !hit {
                continue;
            }
            let Some(item) = catalog.get(entry.item) else {
                warn!("Loot entry {} is not in the catalog, skipping", entry.item);
                continue;
            };
            let range = match entry.xp {
                DropXp::Range(min, max) => (min, max),
                DropXp::ByRarity => ore_xp(Some(item.rarity)),
            };
            items.push(LootItem {
                item_id: item.id,
                amount: 1,
            });
            xp += xp_draw(rng, range);
        }
    }

    LootOutcome {
        tier: NORMAL_TIER,
        items,
        xp,
    }
}
