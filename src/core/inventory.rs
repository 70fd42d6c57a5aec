//! Player inventory and equipment.
//!
//! A [`PlayerProfile`] holds two stack lists: gear (tools and weapons) and misc
//! (everything else). Capacity counts stacks, not units.

use crate::core::{
    catalog::{Catalog, FIST_ID, Item, ItemKind, Rarity},
    item_upgrade::UpgradeSlot,
};
use serde::{Deserialize, Serialize};

/// Default number of inventory slots.
pub const DEFAULT_CAPACITY: u32 = 50;

/// Items shown per inventory page.
pub const ITEMS_PER_PAGE: usize = 5;

/// One `(item, amount)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Catalog identifier
    pub id: String,
    /// Units held
    pub amount: u32,
}

/// Persistent inventory and equipment record for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerProfile {
    /// Equippable items
    pub gear_inventory: Vec<ItemStack>,
    /// Stackable items
    pub misc_inventory: Vec<ItemStack>,
    /// Identifier of the equipped gear, `None` means bare hands
    pub gear_equipped: Option<String>,
    /// Identifier of the equipped misc item
    pub misc_equipped: Option<String>,
    /// Maximum number of stacks
    pub inventory_capacity: u32,
    /// Keys of finished item upgrades
    pub item_upgrades: Vec<String>,
    /// Item upgrades in progress
    pub upgrade_slots: Vec<UpgradeSlot>,
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            gear_inventory: Vec::new(),
            misc_inventory: Vec::new(),
            gear_equipped: None,
            misc_equipped: None,
            inventory_capacity: DEFAULT_CAPACITY,
            item_upgrades: Vec::new(),
            upgrade_slots: Vec::new(),
        }
    }
}

/// Aggregated inventory line used by the inventory view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    /// Display name
    pub name: String,
    /// Emoji markup
    pub emoji: String,
    /// Rarity tier
    pub rarity: Rarity,
    /// Category
    pub kind: ItemKind,
    /// Total units across both lists
    pub amount: u32,
    /// Sell value per unit
    pub sell_value: u64,
}

/// One page of a filtered inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryPage {
    /// Entries on this page
    pub entries: Vec<InventoryEntry>,
    /// 1-based page number after clamping
    pub page: usize,
    /// Total number of pages, at least 1
    pub total_pages: usize,
    /// Distinct items in the unfiltered inventory
    pub distinct_items: usize,
    /// Sell value of the unfiltered inventory
    pub total_value: u64,
}

impl PlayerProfile {
    /// Creates an empty profile with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            inventory_capacity: capacity,
            ..Self::default()
        }
    }

    /// Repairs a profile loaded from storage.
    ///
    /// Merges duplicate stacks, drops empty ones, clears equipment that is no
    /// longer held and restores a zero capacity to `default_capacity`.
    pub fn normalize(&mut self, default_capacity: u32) {
        merge_stacks(&mut self.gear_inventory);
        merge_stacks(&mut self.misc_inventory);

        if self
            .gear_equipped
            .as_deref()
            .is_some_and(|id| id == FIST_ID || !contains(&self.gear_inventory, id))
        {
            self.gear_equipped = None;
        }
        if self
            .misc_equipped
            .as_deref()
            .is_some_and(|id| !contains(&self.misc_inventory, id))
        {
            self.misc_equipped = None;
        }
        if self.inventory_capacity == 0 {
            self.inventory_capacity = default_capacity;
        }
        self.item_upgrades.sort_unstable();
        self.item_upgrades.dedup();
        self.upgrade_slots
            .retain(|slot| slot.slot >= 1 && !slot.upgrade_key.is_empty());
    }

    /// Whether the item upgrade `key` has been claimed.
    #[must_use]
    pub fn has_upgrade(&self, key: &str) -> bool {
        self.item_upgrades.iter().any(|owned| owned == key)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn used_slots(&self) -> usize {
        self.gear_inventory.len() + self.misc_inventory.len()
    }

    /// Units of `id` held across both lists.
    #[must_use]
    pub fn amount_of(&self, id: &str) -> u32 {
        self.gear_inventory
            .iter()
            .chain(&self.misc_inventory)
            .filter(|stack| stack.id == id)
            .map(|stack| stack.amount)
            .sum()
    }

    /// Adds `amount` units of `item` and returns how many were added.
    ///
    /// An existing stack always grows. A new stack needs a free slot, otherwise
    /// nothing is added and 0 is returned.
    pub fn add_item(&mut self, item: &Item, amount: u32) -> u32 {
        if amount == 0 {
            return 0;
        }
        let has_room = self.used_slots() < self.inventory_capacity as usize;
        let list = self.list_for_mut(item.kind);
        if let Some(stack) = list.iter_mut().find(|stack| stack.id == item.id) {
            stack.amount = stack.amount.saturating_add(amount);
            return amount;
        }
        if !has_room {
            return 0;
        }
        list.push(ItemStack {
            id: item.id.to_string(),
            amount,
        });
        amount
    }

    /// Forces the stack of `item` to exactly `amount`, removing it at 0.
    ///
    /// Used for derived items such as upgrade tokens, so capacity is not checked.
    pub fn set_item_amount(&mut self, item: &Item, amount: u32) {
        let list = self.list_for_mut(item.kind);
        if amount == 0 {
            list.retain(|stack| stack.id != item.id);
            return;
        }
        match list.iter_mut().find(|stack| stack.id == item.id) {
            Some(stack) => stack.amount = amount,
            None => list.push(ItemStack {
                id: item.id.to_string(),
                amount,
            }),
        }
    }

    /// Removes up to `amount` units of `id` and returns how many were removed.
    pub fn remove_item(&mut self, id: &str, amount: u32) -> u32 {
        let mut removed = 0;
        for list in [&mut self.gear_inventory, &mut self.misc_inventory] {
            for stack in list.iter_mut().filter(|stack| stack.id == id) {
                let take = stack.amount.min(amount - removed);
                stack.amount -= take;
                removed += take;
            }
            list.retain(|stack| stack.amount > 0);
        }
        if removed > 0 {
            self.normalize(self.inventory_capacity);
        }
        removed
    }

    /// Equipped gear if it can be used for `activity`.
    #[must_use]
    pub fn gear_for<'c>(&self, catalog: &'c Catalog, activity: &str) -> Option<&'c Item> {
        self.gear_equipped
            .as_deref()
            .and_then(|id| catalog.get(id))
            .filter(|item| item.supports(activity))
    }

    /// Equips the gear with identifier `id`. Selecting the fist unequips.
    ///
    /// Returns `false` when the gear is not held.
    pub fn equip_gear(&mut self, id: &str) -> bool {
        if id == FIST_ID {
            self.gear_equipped = None;
            return true;
        }
        if !contains(&self.gear_inventory, id) {
            return false;
        }
        self.gear_equipped = Some(id.to_string());
        true
    }

    /// Equips the misc item with identifier `id`.
    pub fn equip_misc(&mut self, id: &str) -> bool {
        if !contains(&self.misc_inventory, id) {
            return false;
        }
        self.misc_equipped = Some(id.to_string());
        true
    }

    /// Both lists merged by display name, in first-seen order.
    ///
    /// Stacks whose identifier is not in the catalog are listed as unknown.
    #[must_use]
    pub fn aggregated(&self, catalog: &Catalog) -> Vec<InventoryEntry> {
        let mut entries: Vec<InventoryEntry> = Vec::new();
        for stack in self.gear_inventory.iter().chain(&self.misc_inventory) {
            let (name, emoji, rarity, kind, sell_value) = match catalog.get(&stack.id) {
                Some(item) => (item.name, item.emoji, item.rarity, item.kind, item.sell_value),
                None => ("Unknown Item", "", Rarity::Common, ItemKind::Material, 0),
            };
            if let Some(entry) = entries.iter_mut().find(|entry| entry.name == name) {
                entry.amount = entry.amount.saturating_add(stack.amount);
                continue;
            }
            entries.push(InventoryEntry {
                name: name.to_string(),
                emoji: emoji.to_string(),
                rarity,
                kind,
                amount: stack.amount,
                sell_value,
            });
        }
        entries
    }

    /// Filters the aggregated view by `kinds` (empty means all) and returns a
    /// clamped 1-based `page`.
    #[must_use]
    pub fn page(&self, catalog: &Catalog, kinds: &[ItemKind], page: usize) -> InventoryPage {
        let all = self.aggregated(catalog);
        let total_value = all
            .iter()
            .map(|entry| entry.sell_value.saturating_mul(u64::from(entry.amount)))
            .sum();
        let distinct_items = all.len();
        let filtered: Vec<InventoryEntry> = all
            .into_iter()
            .filter(|entry| kinds.is_empty() || kinds.contains(&entry.kind))
            .collect();

        let total_pages = filtered.len().div_ceil(ITEMS_PER_PAGE).max(1);
        let page = page.clamp(1, total_pages);
        let entries = filtered
            .into_iter()
            .skip((page - 1) * ITEMS_PER_PAGE)
            .take(ITEMS_PER_PAGE)
            .collect();

        InventoryPage {
            entries,
            page,
            total_pages,
            distinct_items,
            total_value,
        }
    }

    fn list_for_mut(&mut self, kind: ItemKind) -> &mut Vec<ItemStack> {
        if kind == ItemKind::Gear {
            &mut self.gear_inventory
        } else {
            &mut self.misc_inventory
        }
    }
}

fn contains(list: &[ItemStack], id: &str) -> bool {
    list.iter().any(|stack| stack.id == id && stack.amount > 0)
}

fn merge_stacks(list: &mut Vec<ItemStack>) {
    let mut merged: Vec<ItemStack> = Vec::with_capacity(list.len());
    for stack in list.drain(..) {
        if stack.amount == 0 {
            continue;
        }
        match merged.iter_mut().find(|existing| existing.id == stack.id) {
            Some(existing) => existing.amount = existing.amount.saturating_add(stack.amount),
            None => merged.push(stack),
        }
    }
    *list = merged;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn item<'c>(catalog: &'c Catalog, id: &str) -> &'c Item {
        catalog.get(id).unwrap()
    }

    #[test]
    fn test_add_item_routes_by_kind() {
        let catalog = Catalog::builtin();
        let mut profile = PlayerProfile::default();

        assert_eq!(profile.add_item(item(&catalog, "ITDirt"), 3), 3);
        assert_eq!(profile.add_item(item(&catalog, "ITWoodenPickaxe"), 1), 1);
        assert_eq!(profile.add_item(item(&catalog, "ITDirt"), 2), 2);

        assert_eq!(profile.misc_inventory.len(), 1);
        assert_eq!(profile.gear_inventory.len(), 1);
        assert_eq!(profile.amount_of("ITDirt"), 5);
    }

    #[test]
    fn test_full_inventory_rejects_new_stacks_only() {
        let catalog = Catalog::builtin();
        let mut profile = PlayerProfile::with_capacity(1);

        assert_eq!(profile.add_item(item(&catalog, "ITDirt"), 1), 1);
        assert_eq!(profile.add_item(item(&catalog, "ITBone"), 1), 0);
        assert_eq!(profile.add_item(item(&catalog, "ITDirt"), 4), 4);
        assert_eq!(profile.amount_of("ITBone"), 0);
        assert_eq!(profile.amount_of("ITDirt"), 5);
    }

    #[test]
    fn test_set_item_amount_ignores_capacity_and_removes_at_zero() {
        let catalog = Catalog::builtin();
        let mut profile = PlayerProfile::with_capacity(0);
        let token = item(&catalog, "ITDigUpgradeToken");

        profile.set_item_amount(token, 3);
        assert_eq!(profile.amount_of(token.id), 3);
        profile.set_item_amount(token, 0);
        assert!(profile.misc_inventory.is_empty());
    }

    #[test]
    fn test_normalize_repairs_stored_profile() {
        let mut profile = PlayerProfile {
            gear_inventory: vec![],
            misc_inventory: vec![
                ItemStack { id: "ITDirt".into(), amount: 2 },
                ItemStack { id: "ITLeaf".into(), amount: 0 },
                ItemStack { id: "ITDirt".into(), amount: 3 },
            ],
            gear_equipped: Some("ITIronPickaxe".into()),
            misc_equipped: None,
            inventory_capacity: 0,
            item_upgrades: vec!["backpack_inventory_1".into(), "backpack_inventory_1".into()],
            upgrade_slots: vec![UpgradeSlot {
                slot: 0,
                upgrade_key: "backpack_inventory_2".into(),
                started_at: 0,
                ends_at: 0,
            }],
        };
        profile.normalize(DEFAULT_CAPACITY);

        assert_eq!(profile.misc_inventory, vec![ItemStack { id: "ITDirt".into(), amount: 5 }]);
        assert_eq!(profile.gear_equipped, None);
        assert_eq!(profile.inventory_capacity, DEFAULT_CAPACITY);
        assert_eq!(profile.item_upgrades, vec!["backpack_inventory_1".to_string()]);
        assert!(profile.upgrade_slots.is_empty());
    }

    #[test]
    fn test_equipment_respects_activity_tags() {
        let catalog = Catalog::builtin();
        let mut profile = PlayerProfile::default();
        profile.add_item(item(&catalog, "ITWoodenPickaxe"), 1);

        assert!(!profile.equip_gear("ITStonePickaxe"));
        assert!(profile.equip_gear("ITWoodenPickaxe"));
        assert_eq!(profile.gear_for(&catalog, "mine").unwrap().id, "ITWoodenPickaxe");
        assert!(profile.gear_for(&catalog, "dig").is_none());

        assert!(profile.equip_gear(FIST_ID));
        assert!(profile.gear_equipped.is_none());
    }

    #[test]
    fn test_remove_item_clears_equipment() {
        let catalog = Catalog::builtin();
        let mut profile = PlayerProfile::default();
        profile.add_item(item(&catalog, "ITWoodenPickaxe"), 1);
        profile.equip_gear("ITWoodenPickaxe");

        assert_eq!(profile.remove_item("ITWoodenPickaxe", 5), 1);
        assert!(profile.gear_inventory.is_empty());
        assert!(profile.gear_equipped.is_none());
    }

    #[test]
    fn test_pagination_filters_and_clamps() {
        let catalog = Catalog::builtin();
        let mut profile = PlayerProfile::default();
        for id in [
            "ITDirt", "ITBone", "ITLeaf", "ITFeather", "ITClay", "ITPebbles", "ITCommonChest",
        ] {
            profile.add_item(item(&catalog, id), 2);
        }

        let first = profile.page(&catalog, &[], 1);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.entries.len(), 5);
        assert_eq!(first.distinct_items, 7);

        let clamped = profile.page(&catalog, &[], 9);
        assert_eq!(clamped.page, 2);
        assert_eq!(clamped.entries.len(), 2);

        let chests = profile.page(&catalog, &[ItemKind::Container], 1);
        assert_eq!(chests.entries.len(), 1);
        assert_eq!(chests.entries[0].name, "Common Treasure Chest");

        let empty = profile.page(&catalog, &[ItemKind::Consumable], 3);
        assert_eq!((empty.page, empty.total_pages), (1, 1));
        assert!(empty.entries.is_empty());
    }

    #[test]
    fn test_profile_round_trips_through_json() {
        let catalog = Catalog::builtin();
        let mut profile = PlayerProfile::default();
        profile.add_item(item(&catalog, "ITStone"), 4);
        let value = serde_json::to_value(&profile).unwrap();
        let back: PlayerProfile = serde_json::from_value(value).unwrap();
        assert_eq!(back, profile);

        let partial: PlayerProfile = serde_json::from_str("{}").unwrap();
        assert_eq!(partial.inventory_capacity, DEFAULT_CAPACITY);
    }
}
