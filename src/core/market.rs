//! The Collector's Market and the Collector's Shop.
//!
//! The market buys items from players. Each user collects a sell list from
//! `name - amount` lines, then sells the whole list for coins in one step.
//! The shop sells a stock that is rolled again every hour; each user may buy
//! up to the listed stock once per restock.

use crate::{
    core::{
        catalog::{Catalog, Item},
        clock::Clock,
        inventory::PlayerProfile,
        profiles::{Profiles, Record, RecordDefaults},
        random::{RandomSource, uniform_int},
        store::Domain,
        wallet::{Currency, CurrencyChange, WalletStats},
    },
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument, warn};

/// Shop price as a multiple of an item's sell value.
pub const SHOP_PRICE_MULTIPLIER: u64 = 10;

/// Time between restocks.
pub const SHOP_RESTOCK_INTERVAL_MS: i64 = 60 * 60 * 1000;

/// Storage key of the shared shop record.
const SHOP_RECORD_KEY: &str = "collector";

/// Lowercase ASCII letters and digits only, for fuzzy name matching.
#[must_use]
pub fn normalize_key(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn score_match(query: &str, candidate: &str) -> usize {
    if query.is_empty() || candidate.is_empty() {
        0
    } else if query == candidate {
        1000
    } else if candidate.contains(query) {
        500 + query.len()
    } else if query.contains(candidate) {
        200 + candidate.len()
    } else {
        0
    }
}

/// Coins the market pays per unit, `None` when the item cannot be sold.
#[must_use]
pub const fn sell_price(item: &Item) -> Option<u64> {
    if item.sell_value == 0 {
        None
    } else {
        Some(item.sell_value)
    }
}

/// Coins the shop asks per unit.
#[must_use]
pub const fn shop_price(item: &Item) -> u64 {
    item.sell_value.saturating_mul(SHOP_PRICE_MULTIPLIER)
}

/// Per-user list of items waiting to be sold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SellList {
    /// Item id to units
    pub items: BTreeMap<String, u32>,
}

impl Record for SellList {
    fn domain() -> Domain {
        Domain::Market
    }

    fn normalize(&mut self, _defaults: &RecordDefaults) {
        self.items.retain(|_, amount| *amount > 0);
    }
}

/// One resolved line of a sell list or receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketLine {
    /// The item
    pub item: Item,
    /// Units
    pub amount: u32,
}

impl SellList {
    /// Lines whose item still exists, sorted by name.
    #[must_use]
    pub fn lines(&self, catalog: &Catalog) -> Vec<MarketLine> {
        let mut lines: Vec<MarketLine> = self
            .items
            .iter()
            .filter_map(|(id, &amount)| {
                catalog.get(id).map(|item| MarketLine {
                    item: item.clone(),
                    amount,
                })
            })
            .collect();
        lines.sort_by(|a, b| a.item.name.cmp(b.item.name));
        lines
    }
}

/// Units and coins of a set of lines.
#[must_use]
pub fn totals(lines: &[MarketLine]) -> (u64, u64) {
    lines.iter().fold((0, 0), |(units, coins), line| {
        let price = sell_price(&line.item).unwrap_or(0);
        (
            units + u64::from(line.amount),
            coins + price.saturating_mul(u64::from(line.amount)),
        )
    })
}

/// Splits `name - amount`. A sign may precede the amount, so `Dirt - -3`
/// removes three.
fn split_line(line: &str) -> Option<(&str, i64)> {
    let head = line.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &line[head.len()..];
    if digits.is_empty() {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    for (index, c) in head.char_indices().skip(1) {
        if c != '-' {
            continue;
        }
        let sign = match head[index + 1..].trim_start() {
            "" | "+" => 1,
            "-" => -1,
            _ => continue,
        };
        return Some((head[..index].trim(), sign * value));
    }
    None
}

fn invalid(message: &str) -> Error {
    Error::InvalidInput {
        message: message.to_string(),
    }
}

/// Applies `name - amount` lines (newline or comma separated) to `list`.
///
/// Names are matched against the held items; the first problem rejects the
/// whole input and leaves `list` untouched.
pub fn apply_sell_input(input: &str, player: &PlayerProfile, catalog: &Catalog, list: &mut SellList) -> Result<()> {
    let mut held: Vec<(&Item, u32)> = Vec::new();
    for stack in player.gear_inventory.iter().chain(&player.misc_inventory) {
        let Some(item) = catalog.get(&stack.id) else {
            continue;
        };
        match held.iter_mut().find(|(known, _)| known.id == item.id) {
            Some((_, amount)) => *amount = amount.saturating_add(stack.amount),
            None => held.push((item, stack.amount)),
        }
    }

    let mut next = list.items.clone();
    for line in input.split(['\n', ',']).map(str::trim).filter(|line| !line.is_empty()) {
        let (query, amount) = split_line(line).ok_or_else(|| invalid("Invalid format detected."))?;
        if amount == 0 {
            continue;
        }

        let query = normalize_key(query);
        let best = held
            .iter()
            .map(|&(item, units)| {
                let score = score_match(&query, &normalize_key(item.name)).max(score_match(&query, &normalize_key(item.id)));
                (score, item, units)
            })
            .filter(|(score, ..)| *score > 0)
            .fold(None, |best: Option<(usize, &Item, u32)>, candidate| match best {
                Some(current) if current.0 >= candidate.0 => Some(current),
                _ => Some(candidate),
            });
        let Some((_, item, units)) = best else {
            return Err(invalid("You do not have that item in your inventory."));
        };
        if sell_price(item).is_none() {
            return Err(invalid("That item cannot be sold."));
        }

        let existing = i64::from(next.get(item.id).copied().unwrap_or(0));
        if amount > 0 && existing + amount > i64::from(units) {
            return Err(invalid("You do not have enough of that item."));
        }
        let updated = existing + amount;
        if updated <= 0 {
            next.remove(item.id);
        } else {
            next.insert(item.id.to_string(), u32::try_from(updated).unwrap_or(u32::MAX));
        }
    }
    list.items = next;
    Ok(())
}

/// Result of selling a sell list.
#[derive(Debug, Clone, PartialEq)]
pub enum SaleOutcome {
    /// Items removed and coins paid
    Sold {
        /// What was sold
        lines: Vec<MarketLine>,
        /// Units sold
        units: u64,
        /// Coins paid
        coins: u64,
    },
    /// Nothing on the list
    Empty,
    /// The inventory no longer holds everything on the list
    NotEnough,
}

/// One item for sale in the shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopEntry {
    /// Catalog id
    pub item_id: String,
    /// Units per user this restock
    pub stock: u32,
}

/// Shared shop record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopState {
    /// Restocks so far
    pub restock_count: u64,
    /// Last restock, ms since epoch
    pub restocked_at: i64,
    /// Next restock, ms since epoch
    pub next_restock_at: i64,
    /// Current stock
    pub items: Vec<ShopEntry>,
    /// User id to item id to units bought this restock
    pub purchases: BTreeMap<String, BTreeMap<String, u32>>,
}

impl Record for ShopState {
    fn domain() -> Domain {
        Domain::Shop
    }

    fn normalize(&mut self, _defaults: &RecordDefaults) {
        self.items.retain(|entry| entry.stock > 0);
        self.purchases.retain(|_, bought| !bought.is_empty());
    }
}

impl ShopState {
    fn needs_restock(&self, now_ms: i64) -> bool {
        self.items.is_empty() || now_ms >= self.next_restock_at
    }

    fn bought(&self, user_id: &str, item_id: &str) -> u32 {
        self.purchases
            .get(user_id)
            .and_then(|bought| bought.get(item_id))
            .copied()
            .unwrap_or(0)
    }
}

/// Restock chance in percent and stock range of one shop item.
struct StockRule {
    item_id: &'static str,
    chance: f64,
    min: u32,
    max: u32,
}

const fn rule(item_id: &'static str, chance: f64, min: u32, max: u32) -> StockRule {
    StockRule {
        item_id,
        chance,
        min,
        max,
    }
}

const STOCK_RULES: &[StockRule] = &[
    rule("ITWoodenSword", 3.0, 1, 2),
    rule("ITDirt", 19.8, 1, 10),
    rule("ITBone", 19.0, 1, 10),
    rule("ITLeaf", 19.68, 1, 10),
    rule("ITFeather", 19.6, 1, 10),
    rule("ITClay", 16.8, 1, 10),
    rule("ITPebbles", 18.0, 1, 10),
    rule("ITTwigs", 18.6, 1, 10),
    rule("ITStone", 18.2, 1, 10),
    rule("ITCoal", 18.6, 1, 10),
    rule("ITFossil", 18.0, 1, 10),
    rule("ITCopperOre", 16.8, 1, 8),
    rule("ITIronOre", 15.2, 1, 8),
    rule("ITGoldOre", 10.0, 1, 8),
    rule("ITAmethyst", 7.0, 1, 4),
    rule("ITSapphire", 6.75, 1, 4),
    rule("ITEmerald", 3.05, 1, 4),
    rule("ITRuby", 2.75, 1, 4),
    rule("ITDiamond", 0.86, 1, 4),
    rule("ITTreeBark", 19.4, 1, 10),
    rule("ITAcorn", 17.6, 1, 10),
    rule("ITCommonChest", 5.0, 1, 2),
    rule("ITRareChest", 1.0, 1, 2),
    rule("ITEpicChest", 0.5, 1, 2),
    rule("ITLegendaryChest", 0.15, 1, 2),
    rule("ITMythicalChest", 0.05, 1, 2),
];

fn roll_stock(rule: &StockRule, rng: &dyn RandomSource) -> ShopEntry {
    let stock = uniform_int(rng, f64::from(rule.min), f64::from(rule.max));
    ShopEntry {
        item_id: rule.item_id.to_string(),
        stock: u32::try_from(stock).unwrap_or(rule.min),
    }
}

/// Rolls a fresh stock. Never empty while any rule resolves: the first
/// resolvable rule is the fallback.
fn roll_restock(catalog: &Catalog, rng: &dyn RandomSource) -> Vec<ShopEntry> {
    let rules: Vec<&StockRule> = STOCK_RULES
        .iter()
        .filter(|rule| catalog.get(rule.item_id).is_some())
        .collect();
    let mut items: Vec<ShopEntry> = rules
        .iter()
        .filter(|rule| rng.next_f64() * 100.0 <= rule.chance)
        .map(|rule| roll_stock(rule, rng))
        .collect();
    if items.is_empty() {
        if let Some(fallback) = rules.first() {
            items.push(roll_stock(fallback, rng));
        }
    }
    items
}

/// First full hour strictly after `now_ms`.
#[must_use]
pub const fn next_restock_at(now_ms: i64) -> i64 {
    (now_ms.div_euclid(SHOP_RESTOCK_INTERVAL_MS) + 1) * SHOP_RESTOCK_INTERVAL_MS
}

/// An offer as seen by one user.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopOffer {
    /// The item
    pub item: Item,
    /// Coins per unit
    pub price: u64,
    /// Units this user can still buy
    pub remaining: u32,
}

/// The shop as seen by one user.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopListing {
    /// Restocks so far
    pub restock_count: u64,
    /// Next restock, ms since epoch
    pub next_restock_at: i64,
    /// Offers with stock left, by rarity then name
    pub offers: Vec<ShopOffer>,
}

/// Result of a purchase.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    /// One unit bought
    Bought {
        /// The item
        item: Item,
        /// Coins paid
        price: u64,
        /// Coin balance afterwards
        balance: u64,
    },
    /// Not part of the current stock
    NotListed,
    /// This user bought all units already
    OutOfStock,
    /// Wallet too low
    Insufficient {
        /// Coin balance
        balance: u64,
        /// Price
        cost: u64,
    },
    /// No free inventory slot for a new stack
    NoRoom,
}

/// Sell lists and the shop.
pub struct MarketService {
    profiles: Arc<Profiles>,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    shop_lock: AsyncMutex<()>,
}

impl std::fmt::Debug for MarketService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketService").finish_non_exhaustive()
    }
}

impl MarketService {
    /// Creates the service.
    #[must_use]
    pub fn new(profiles: Arc<Profiles>, clock: Arc<dyn Clock>, rng: Arc<dyn RandomSource>) -> Self {
        Self {
            profiles,
            clock,
            rng,
            shop_lock: AsyncMutex::new(()),
        }
    }

    /// Item catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        self.profiles.catalog()
    }

    /// The user's sell list.
    pub async fn sell_list(&self, user_id: &str) -> Result<SellList> {
        self.profiles.read(user_id).await
    }

    /// Adds or removes `name - amount` lines on the sell list.
    #[instrument(skip(self))]
    pub async fn add_to_sell_list(&self, user_id: &str, input: &str) -> Result<SellList> {
        let scope = self.profiles.scope(user_id).await;
        let player: PlayerProfile = scope.read().await?;
        let mut list: SellList = scope.read().await?;
        apply_sell_input(input, &player, self.catalog(), &mut list)?;
        scope.write(&list).await?;
        Ok(list)
    }

    /// Empties the sell list.
    pub async fn clear_sell_list(&self, user_id: &str) -> Result<()> {
        self.profiles.write(user_id, &SellList::default()).await
    }

    /// Sells everything on the list. All or nothing.
    #[instrument(skip(self))]
    pub async fn sell(&self, user_id: &str) -> Result<SaleOutcome> {
        let scope = self.profiles.scope(user_id).await;
        let list: SellList = scope.read().await?;
        let lines = list.lines(self.catalog());
        if lines.is_empty() {
            return Ok(SaleOutcome::Empty);
        }

        let mut player: PlayerProfile = scope.read().await?;
        if lines.iter().any(|line| player.amount_of(line.item.id) < line.amount) {
            return Ok(SaleOutcome::NotEnough);
        }
        for line in &lines {
            player.remove_item(line.item.id, line.amount);
        }
        let (units, coins) = totals(&lines);
        let delta = i64::try_from(coins).map_err(|_| invalid("That sale is too large."))?;
        let mut wallet: WalletStats = scope.read().await?;
        if let CurrencyChange::Insufficient { .. } = wallet.add_currency(Currency::Coins, delta) {
            warn!("Market payout of {coins} for {user_id} was rejected by the wallet");
            return Ok(SaleOutcome::NotEnough);
        }

        scope.write(&player).await?;
        scope.write(&wallet).await?;
        scope.write(&SellList::default()).await?;
        info!(user_id, units, coins, "Market sale");
        Ok(SaleOutcome::Sold { lines, units, coins })
    }

    async fn current_stock(&self) -> Result<ShopState> {
        let now = self.clock.now_ms();
        let mut state: ShopState = self.profiles.read(SHOP_RECORD_KEY).await?;
        if state.needs_restock(now) {
            state = ShopState {
                restock_count: state.restock_count + 1,
                restocked_at: now,
                next_restock_at: next_restock_at(now),
                items: roll_restock(self.catalog(), self.rng.as_ref()),
                purchases: BTreeMap::new(),
            };
            self.profiles.write(SHOP_RECORD_KEY, &state).await?;
            info!(
                restock = state.restock_count,
                items = state.items.len(),
                "Collector's Shop restocked"
            );
        }
        Ok(state)
    }

    /// Current offers for `user_id`, restocking first when due.
    pub async fn shop(&self, user_id: &str) -> Result<ShopListing> {
        let _guard = self.shop_lock.lock().await;
        let state = self.current_stock().await?;
        let mut offers: Vec<ShopOffer> = state
            .items
            .iter()
            .filter_map(|entry| {
                let item = self.catalog().get(&entry.item_id)?;
                let remaining = entry.stock.saturating_sub(state.bought(user_id, item.id));
                (remaining > 0).then(|| ShopOffer {
                    item: item.clone(),
                    price: shop_price(item),
                    remaining,
                })
            })
            .collect();
        offers.sort_by(|a, b| a.item.rarity.cmp(&b.item.rarity).then(a.item.name.cmp(b.item.name)));
        Ok(ShopListing {
            restock_count: state.restock_count,
            next_restock_at: state.next_restock_at,
            offers,
        })
    }

    /// Buys one unit of `item_id`.
    #[instrument(skip(self))]
    pub async fn buy(&self, user_id: &str, item_id: &str) -> Result<PurchaseOutcome> {
        let _guard = self.shop_lock.lock().await;
        let mut state = self.current_stock().await?;
        let Some(entry) = state.items.iter().find(|entry| entry.item_id == item_id) else {
            return Ok(PurchaseOutcome::NotListed);
        };
        let Some(item) = self.catalog().get(item_id) else {
            return Ok(PurchaseOutcome::NotListed);
        };
        let bought = state.bought(user_id, item_id);
        if bought >= entry.stock {
            return Ok(PurchaseOutcome::OutOfStock);
        }

        let price = shop_price(item);
        let delta = i64::try_from(price).map_err(|_| invalid("That item is too expensive."))?;
        let scope = self.profiles.scope(user_id).await;
        let mut wallet: WalletStats = scope.read().await?;
        let balance = match wallet.add_currency(Currency::Coins, -delta) {
            CurrencyChange::Applied(balance) => balance,
            CurrencyChange::Insufficient { balance } => {
                return Ok(PurchaseOutcome::Insufficient { balance, cost: price });
            }
        };
        let mut player: PlayerProfile = scope.read().await?;
        if player.add_item(item, 1) == 0 {
            return Ok(PurchaseOutcome::NoRoom);
        }
        scope.write(&wallet).await?;
        scope.write(&player).await?;
        drop(scope);

        state
            .purchases
            .entry(user_id.to_string())
            .or_default()
            .insert(item_id.to_string(), bought + 1);
        self.profiles.write(SHOP_RECORD_KEY, &state).await?;
        info!(user_id, item_id, price, "Collector's Shop purchase");
        Ok(PurchaseOutcome::Bought {
            item: item.clone(),
            price,
            balance,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::random::{FixedRandom, SequenceRandom};
    use crate::test_utils::memory_profiles;

    async fn market(rng: Arc<dyn RandomSource>) -> Result<(MarketService, Arc<Profiles>, Arc<ManualClock>)> {
        let profiles = Arc::new(memory_profiles().await?);
        let clock = Arc::new(ManualClock::new(1_000));
        let service = MarketService::new(Arc::clone(&profiles), Arc::clone(&clock) as Arc<dyn Clock>, rng);
        Ok((service, profiles, clock))
    }

    async fn give(profiles: &Profiles, user_id: &str, item_id: &str, amount: u32) -> Result<()> {
        let item = profiles.catalog().get(item_id).unwrap().clone();
        profiles
            .update(user_id, |player: &mut PlayerProfile| player.add_item(&item, amount))
            .await?;
        Ok(())
    }

    #[test]
    fn test_split_line_reads_sign_and_separator() {
        assert_eq!(split_line("Dirt - 3"), Some(("Dirt", 3)));
        assert_eq!(split_line("Dirt -3"), Some(("Dirt", 3)));
        assert_eq!(split_line("Dirt - -3"), Some(("Dirt", -3)));
        assert_eq!(split_line("Copper-Ore - 2"), Some(("Copper-Ore", 2)));
        assert_eq!(split_line("Dirt 3"), None);
        assert_eq!(split_line("Dirt -"), None);
    }

    #[test]
    fn test_sell_input_matches_and_validates() {
        let catalog = Catalog::builtin();
        let mut player = PlayerProfile::default();
        player.add_item(catalog.get("ITCopperOre").unwrap(), 4);
        player.add_item(catalog.get("ITDigUpgradeToken").unwrap(), 2);
        let mut list = SellList::default();

        apply_sell_input("copper - 3", &player, &catalog, &mut list).unwrap();
        assert_eq!(list.items.get("ITCopperOre"), Some(&3));

        let err = apply_sell_input("Copper Ore - 2", &player, &catalog, &mut list).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: You do not have enough of that item.");
        let err = apply_sell_input("dig upgrade token - 1", &player, &catalog, &mut list).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: That item cannot be sold.");
        let err = apply_sell_input("diamond - 1", &player, &catalog, &mut list).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: You do not have that item in your inventory.");
        assert_eq!(list.items.get("ITCopperOre"), Some(&3));

        apply_sell_input("ITCopperOre - -5", &player, &catalog, &mut list).unwrap();
        assert!(list.items.is_empty());
    }

    #[tokio::test]
    async fn test_sell_removes_items_and_pays_coins() -> Result<()> {
        let (market, profiles, _clock) = market(Arc::new(FixedRandom(0.5))).await?;
        give(&profiles, "1", "ITCopperOre", 4).await?;
        give(&profiles, "1", "ITBone", 1).await?;

        market.add_to_sell_list("1", "copper ore - 3, bone - 1").await?;
        let outcome = market.sell("1").await?;
        let SaleOutcome::Sold { units, coins, lines } = outcome else {
            panic!("expected a sale, got {outcome:?}");
        };
        assert_eq!((units, coins), (4, 3 * 10 + 12));
        assert_eq!(lines[0].item.id, "ITBone");

        let player: PlayerProfile = profiles.read("1").await?;
        assert_eq!(player.amount_of("ITCopperOre"), 1);
        assert_eq!(player.amount_of("ITBone"), 0);
        let wallet: WalletStats = profiles.read("1").await?;
        assert_eq!(wallet.coins, 42);
        assert!(market.sell_list("1").await?.items.is_empty());
        assert_eq!(market.sell("1").await?, SaleOutcome::Empty);
        Ok(())
    }

    #[tokio::test]
    async fn test_sell_refuses_when_items_are_gone() -> Result<()> {
        let (market, profiles, _clock) = market(Arc::new(FixedRandom(0.5))).await?;
        give(&profiles, "1", "ITCoal", 2).await?;
        market.add_to_sell_list("1", "coal - 2").await?;
        profiles
            .update("1", |player: &mut PlayerProfile| player.remove_item("ITCoal", 1))
            .await?;

        assert_eq!(market.sell("1").await?, SaleOutcome::NotEnough);
        let wallet: WalletStats = profiles.read("1").await?;
        assert_eq!(wallet.coins, 0);
        assert_eq!(market.sell_list("1").await?.items.get("ITCoal"), Some(&2));
        Ok(())
    }

    #[tokio::test]
    async fn test_restock_falls_back_and_rolls_hourly() -> Result<()> {
        // 0.999 misses every chance, so only the fallback is stocked.
        let (market, _profiles, clock) = market(Arc::new(FixedRandom(0.999))).await?;
        let listing = market.shop("1").await?;
        assert_eq!(listing.restock_count, 1);
        assert_eq!(listing.next_restock_at, SHOP_RESTOCK_INTERVAL_MS);
        assert_eq!(listing.offers.len(), 1);
        assert_eq!(listing.offers[0].item.id, "ITWoodenSword");
        assert_eq!(listing.offers[0].remaining, 2);
        assert_eq!(listing.offers[0].price, 1_000);

        assert_eq!(market.shop("1").await?.restock_count, 1);
        clock.set(SHOP_RESTOCK_INTERVAL_MS);
        assert_eq!(market.shop("1").await?.restock_count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_buy_charges_coins_and_limits_stock_per_user() -> Result<()> {
        let (market, profiles, _clock) = market(Arc::new(FixedRandom(0.999))).await?;
        profiles
            .update("1", |wallet: &mut WalletStats| wallet.coins = 2_500)
            .await?;

        assert_eq!(market.buy("1", "ITDirt").await?, PurchaseOutcome::NotListed);
        for expected_balance in [1_500, 500] {
            let outcome = market.buy("1", "ITWoodenSword").await?;
            assert!(
                matches!(outcome, PurchaseOutcome::Bought { price: 1_000, balance, .. } if balance == expected_balance),
                "{outcome:?}"
            );
        }
        assert_eq!(market.buy("1", "ITWoodenSword").await?, PurchaseOutcome::OutOfStock);
        assert!(market.shop("1").await?.offers.is_empty());

        let player: PlayerProfile = profiles.read("1").await?;
        assert_eq!(player.amount_of("ITWoodenSword"), 2);
        assert_eq!(market.shop("2").await?.offers[0].remaining, 2);
        assert_eq!(
            market.buy("2", "ITWoodenSword").await?,
            PurchaseOutcome::Insufficient { balance: 0, cost: 1_000 }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_buy_without_room_keeps_coins() -> Result<()> {
        let rng = Arc::new(SequenceRandom::new(vec![0.999]));
        let (market, profiles, _clock) = market(rng).await?;
        profiles
            .update("1", |player: &mut PlayerProfile| player.inventory_capacity = 1)
            .await?;
        give(&profiles, "1", "ITDirt", 1).await?;
        profiles
            .update("1", |wallet: &mut WalletStats| wallet.coins = 5_000)
            .await?;

        assert_eq!(market.buy("1", "ITWoodenSword").await?, PurchaseOutcome::NoRoom);
        let wallet: WalletStats = profiles.read("1").await?;
        assert_eq!(wallet.coins, 5_000);
        assert_eq!(market.shop("1").await?.offers[0].remaining, 2);
        Ok(())
    }
}
