//! Timed item upgrades.
//!
//! An upgrade is paid for up front, occupies an upgrade slot while it runs and
//! is claimed once its timer is over. Claimed upgrades are remembered on the
//! [`PlayerProfile`]; backpack upgrades raise the inventory capacity.

use crate::{
    core::{
        activity::Activity,
        clock::Clock,
        inventory::PlayerProfile,
        profiles::{DigProfile, MineProfile, ProfileScope, Profiles},
        progression::ResourceProfile,
        wallet::{Currency, CurrencyChange, WalletStats},
    },
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

/// Upgrades that can run at the same time.
pub const ITEM_UPGRADE_MAX_SLOTS: u32 = 1;

/// Upgrades listed per page.
pub const UPGRADES_PER_PAGE: usize = 5;

/// One price component of an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeCost {
    /// Taken from the wallet
    Currency(Currency, u64),
    /// Spent from an activity's upgrade tokens
    Tokens(Activity, u32),
}

/// A purchasable upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemUpgrade {
    /// Stable key stored on the profile
    pub key: &'static str,
    /// Display name
    pub name: &'static str,
    /// Upgrade that must be claimed first
    pub requirement: Option<&'static str>,
    /// Everything paid on start
    pub costs: &'static [UpgradeCost],
    /// Inventory capacity granted on claim
    pub inventory_capacity: Option<u32>,
    /// Time from start until the claim opens
    pub duration_secs: i64,
}

const fn backpack(
    key: &'static str,
    name: &'static str,
    requirement: Option<&'static str>,
    costs: &'static [UpgradeCost],
    capacity: u32,
    duration_secs: i64,
) -> ItemUpgrade {
    ItemUpgrade {
        key,
        name,
        requirement,
        costs,
        inventory_capacity: Some(capacity),
        duration_secs,
    }
}

/// Every upgrade, in listing order.
pub const ITEM_UPGRADES: &[ItemUpgrade] = &[
    backpack(
        "diggers_satchel",
        "Digger's Satchel",
        None,
        &[UpgradeCost::Tokens(Activity::Dig, 5)],
        75,
        1_800,
    ),
    backpack(
        "miners_satchel",
        "Miner's Satchel",
        Some("diggers_satchel"),
        &[
            UpgradeCost::Tokens(Activity::Mine, 5),
            UpgradeCost::Currency(Currency::Coins, 5_000),
        ],
        100,
        3_600,
    ),
    backpack(
        "backpack_inventory_1",
        "Backpack Inventory 1",
        None,
        &[UpgradeCost::Currency(Currency::Coins, 100_000)],
        600,
        3_600,
    ),
    backpack(
        "backpack_inventory_2",
        "Backpack Inventory 2",
        Some("backpack_inventory_1"),
        &[UpgradeCost::Currency(Currency::Coins, 800_000)],
        800,
        14_400,
    ),
    backpack(
        "backpack_inventory_3",
        "Backpack Inventory 3",
        Some("backpack_inventory_2"),
        &[UpgradeCost::Currency(Currency::Coins, 3_000_000)],
        1_100,
        43_200,
    ),
    backpack(
        "backpack_inventory_4",
        "Backpack Inventory 4",
        Some("backpack_inventory_3"),
        &[UpgradeCost::Currency(Currency::Coins, 25_000_000)],
        1_500,
        86_400,
    ),
    backpack(
        "backpack_inventory_5",
        "Backpack Inventory 5",
        Some("backpack_inventory_4"),
        &[UpgradeCost::Currency(Currency::Coins, 99_000_000)],
        2_000,
        172_800,
    ),
    backpack(
        "backpack_inventory_6",
        "Backpack Inventory 6",
        Some("backpack_inventory_5"),
        &[UpgradeCost::Currency(Currency::Coins, 456_000_000)],
        2_600,
        360_000,
    ),
];

/// Looks up an upgrade by key.
#[must_use]
pub fn find_upgrade(key: &str) -> Option<&'static ItemUpgrade> {
    ITEM_UPGRADES.iter().find(|upgrade| upgrade.key == key)
}

/// An upgrade occupying a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeSlot {
    /// 1-based slot number
    pub slot: u32,
    /// Key of the running upgrade
    pub upgrade_key: String,
    /// Start time, ms since epoch
    pub started_at: i64,
    /// Claim opens at this time, ms since epoch
    pub ends_at: i64,
}

impl UpgradeSlot {
    /// Whether the upgrade can be claimed at `now_ms`.
    #[must_use]
    pub const fn is_ready(&self, now_ms: i64) -> bool {
        now_ms >= self.ends_at
    }
}

/// What the user can pay with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Funds {
    /// Wallet balances
    pub wallet: WalletStats,
    /// Dig progression
    pub dig: ResourceProfile,
    /// Mine progression
    pub mine: ResourceProfile,
}

impl Funds {
    /// Unspent tokens of `activity`.
    #[must_use]
    pub const fn tokens(&self, activity: Activity) -> u32 {
        match activity {
            Activity::Dig => self.dig.upgrade_tokens(),
            Activity::Mine => self.mine.upgrade_tokens(),
        }
    }

    async fn read(scope: &ProfileScope<'_>) -> Result<Self> {
        Ok(Self {
            wallet: scope.read().await?,
            dig: scope.read::<DigProfile>().await?.0,
            mine: scope.read::<MineProfile>().await?.0,
        })
    }
}

/// Why an upgrade cannot start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Blocker {
    /// Claimed before
    Owned,
    /// Already running in a slot
    InProgress,
    /// Needs another upgrade first
    MissingRequirement(&'static str),
    /// Every slot is busy
    NoFreeSlot,
    /// Slot number out of range
    InvalidSlot,
    /// Wallet too low
    InsufficientCurrency {
        /// Currency short
        currency: Currency,
        /// Current balance
        balance: u64,
        /// Price
        cost: u64,
    },
    /// Not enough unspent tokens
    InsufficientTokens {
        /// Activity whose tokens are short
        activity: Activity,
        /// Unspent tokens
        available: u32,
        /// Price
        cost: u32,
    },
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owned => f.write_str("You already own this upgrade."),
            Self::InProgress => f.write_str("This upgrade is already in progress."),
            Self::MissingRequirement(key) => {
                let name = find_upgrade(key).map_or(*key, |upgrade| upgrade.name);
                write!(f, "You need {name} first.")
            }
            Self::NoFreeSlot => f.write_str("You have no upgrade slot left!"),
            Self::InvalidSlot => f.write_str("That upgrade slot does not exist."),
            Self::InsufficientCurrency {
                currency,
                balance,
                cost,
            } => write!(f, "You need {cost} {currency} but only have {balance}."),
            Self::InsufficientTokens {
                activity,
                available,
                cost,
            } => write!(
                f,
                "You need {cost} {} upgrade tokens but only have {available}.",
                activity.key()
            ),
        }
    }
}

/// First reason `upgrade` cannot start in `slot`, if any.
#[must_use]
pub fn check_start(upgrade: &ItemUpgrade, slot: u32, player: &PlayerProfile, funds: &Funds) -> Option<Blocker> {
    if player.has_upgrade(upgrade.key) {
        return Some(Blocker::Owned);
    }
    if player.upgrade_slots.iter().any(|running| running.upgrade_key == upgrade.key) {
        return Some(Blocker::InProgress);
    }
    if let Some(requirement) = upgrade.requirement {
        if !player.has_upgrade(requirement) {
            return Some(Blocker::MissingRequirement(requirement));
        }
    }
    if slot == 0 || slot > ITEM_UPGRADE_MAX_SLOTS {
        return Some(Blocker::InvalidSlot);
    }
    let used = u32::try_from(player.upgrade_slots.len()).unwrap_or(u32::MAX);
    if used >= ITEM_UPGRADE_MAX_SLOTS || player.upgrade_slots.iter().any(|running| running.slot == slot) {
        return Some(Blocker::NoFreeSlot);
    }
    upgrade.costs.iter().find_map(|cost| match *cost {
        UpgradeCost::Currency(currency, cost) => {
            let balance = funds.wallet.balance(currency);
            (balance < cost).then_some(Blocker::InsufficientCurrency {
                currency,
                balance,
                cost,
            })
        }
        UpgradeCost::Tokens(activity, cost) => {
            let available = funds.tokens(activity);
            (available < cost).then_some(Blocker::InsufficientTokens {
                activity,
                available,
                cost,
            })
        }
    })
}

/// Upgrades the player could pick: not owned, not running, requirement met,
/// and with a name containing `search` (case-insensitive).
#[must_use]
pub fn available_upgrades(player: &PlayerProfile, search: &str) -> Vec<&'static ItemUpgrade> {
    let search = search.trim().to_lowercase();
    ITEM_UPGRADES
        .iter()
        .filter(|upgrade| !player.has_upgrade(upgrade.key))
        .filter(|upgrade| !player.upgrade_slots.iter().any(|slot| slot.upgrade_key == upgrade.key))
        .filter(|upgrade| upgrade.requirement.is_none_or(|key| player.has_upgrade(key)))
        .filter(|upgrade| search.is_empty() || upgrade.name.to_lowercase().contains(&search))
        .collect()
}

/// One page of upgrades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePage {
    /// Upgrades on this page
    pub upgrades: Vec<&'static ItemUpgrade>,
    /// 1-based page after clamping
    pub page: usize,
    /// Total pages, at least 1
    pub total_pages: usize,
}

/// Slices `upgrades` into a clamped 1-based `page`.
#[must_use]
pub fn paginate(upgrades: &[&'static ItemUpgrade], page: usize) -> UpgradePage {
    let total_pages = upgrades.len().div_ceil(UPGRADES_PER_PAGE).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * UPGRADES_PER_PAGE;
    UpgradePage {
        upgrades: upgrades.iter().skip(start).take(UPGRADES_PER_PAGE).copied().collect(),
        page,
        total_pages,
    }
}

/// Result of confirming an upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeStart {
    /// Paid and running
    Started {
        /// Slot now in use
        slot: UpgradeSlot,
        /// Profile after the payment
        player: PlayerProfile,
    },
    /// Nothing was paid
    Blocked(Blocker),
}

/// Result of a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeClaim {
    /// Upgrade applied and slot freed
    Claimed {
        /// The claimed upgrade
        upgrade: &'static ItemUpgrade,
        /// Profile after the claim
        player: PlayerProfile,
    },
    /// Still running
    NotReady {
        /// Claim opens at this time, ms since epoch
        ends_at: i64,
    },
    /// Nothing runs in that slot
    EmptySlot,
}

/// Starts and claims item upgrades.
#[derive(Clone)]
pub struct ItemUpgradeService {
    profiles: Arc<Profiles>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ItemUpgradeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemUpgradeService").finish_non_exhaustive()
    }
}

impl ItemUpgradeService {
    /// Creates the service.
    #[must_use]
    pub fn new(profiles: Arc<Profiles>, clock: Arc<dyn Clock>) -> Self {
        Self { profiles, clock }
    }

    /// Current time from the injected clock.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Player profile and balances of `user_id`, read together.
    pub async fn overview(&self, user_id: &str) -> Result<(PlayerProfile, Funds)> {
        let scope = self.profiles.scope(user_id).await;
        let player = scope.read().await?;
        let funds = Funds::read(&scope).await?;
        Ok((player, funds))
    }

    /// Pays for `key` and puts it into `slot`.
    ///
    /// Currency leaves the wallet; tokens are spent by raising the activity's
    /// `upgrade_tokens_used`, which also shrinks the token stack.
    #[instrument(skip(self))]
    pub async fn start(&self, user_id: &str, slot: u32, key: &str) -> Result<UpgradeStart> {
        let upgrade = find_upgrade(key).ok_or_else(|| Error::InvalidInput {
            message: "That upgrade is not available.".to_string(),
        })?;
        let now = self.clock.now_ms();
        let scope = self.profiles.scope(user_id).await;

        let player: PlayerProfile = scope.read().await?;
        let mut funds = Funds::read(&scope).await?;
        if let Some(blocker) = check_start(upgrade, slot, &player, &funds) {
            return Ok(UpgradeStart::Blocked(blocker));
        }

        for cost in upgrade.costs {
            if let UpgradeCost::Currency(currency, amount) = *cost {
                let delta = i64::try_from(amount).map_err(|_| Error::InvalidInput {
                    message: format!("Upgrade price {amount} is too large"),
                })?;
                if let CurrencyChange::Insufficient { balance } = funds.wallet.add_currency(currency, -delta) {
                    return Ok(UpgradeStart::Blocked(Blocker::InsufficientCurrency {
                        currency,
                        balance,
                        cost: amount,
                    }));
                }
            }
        }
        scope.write(&funds.wallet).await?;
        for cost in upgrade.costs {
            if let UpgradeCost::Tokens(activity, amount) = *cost {
                scope
                    .update_resource(activity, |profile| {
                        profile.upgrade_tokens_used = profile.upgrade_tokens_used.saturating_add(amount);
                    })
                    .await?;
            }
        }

        // Token spends rewrite the inventory, so reload before adding the slot.
        let mut player: PlayerProfile = scope.read().await?;
        let started = UpgradeSlot {
            slot,
            upgrade_key: upgrade.key.to_string(),
            started_at: now,
            ends_at: now + upgrade.duration_secs * 1000,
        };
        player.upgrade_slots.push(started.clone());
        scope.write(&player).await?;

        info!(user_id, upgrade = upgrade.key, slot, "Item upgrade started");
        Ok(UpgradeStart::Started { slot: started, player })
    }

    /// Applies a finished upgrade and frees its slot.
    #[instrument(skip(self))]
    pub async fn claim(&self, user_id: &str, slot: u32) -> Result<UpgradeClaim> {
        let now = self.clock.now_ms();
        self.profiles
            .update(user_id, |player: &mut PlayerProfile| {
                let Some(index) = player.upgrade_slots.iter().position(|running| running.slot == slot) else {
                    return UpgradeClaim::EmptySlot;
                };
                let running = &player.upgrade_slots[index];
                if !running.is_ready(now) {
                    return UpgradeClaim::NotReady {
                        ends_at: running.ends_at,
                    };
                }
                let running = player.upgrade_slots.remove(index);
                let Some(upgrade) = find_upgrade(&running.upgrade_key) else {
                    return UpgradeClaim::EmptySlot;
                };
                if !player.has_upgrade(upgrade.key) {
                    player.item_upgrades.push(upgrade.key.to_string());
                }
                if let Some(capacity) = upgrade.inventory_capacity {
                    player.inventory_capacity = player.inventory_capacity.max(capacity);
                }
                info!(user_id, upgrade = upgrade.key, "Item upgrade claimed");
                UpgradeClaim::Claimed {
                    upgrade,
                    player: player.clone(),
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::test_utils::memory_profiles;

    async fn service(start_ms: i64) -> Result<(ItemUpgradeService, Arc<Profiles>, Arc<ManualClock>)> {
        let profiles = Arc::new(memory_profiles().await?);
        let clock = Arc::new(ManualClock::new(start_ms));
        let service = ItemUpgradeService::new(Arc::clone(&profiles), Arc::clone(&clock) as Arc<dyn Clock>);
        Ok((service, profiles, clock))
    }

    #[tokio::test]
    async fn test_token_upgrade_spends_tokens_and_resyncs_stack() -> Result<()> {
        let (service, profiles, _clock) = service(1_000).await?;
        // 100 + 150 + 200 + 250 + 300 XP: level 5, five unspent tokens.
        profiles.add_xp("1", Activity::Dig, 1_000).await?;
        let player: PlayerProfile = profiles.read("1").await?;
        assert_eq!(player.amount_of("ITDigUpgradeToken"), 5);

        let outcome = service.start("1", 1, "diggers_satchel").await?;
        let UpgradeStart::Started { slot, player } = outcome else {
            panic!("expected the upgrade to start, got {outcome:?}");
        };
        assert_eq!(slot.ends_at, 1_000 + 1_800_000);
        assert_eq!(player.amount_of("ITDigUpgradeToken"), 0);
        assert_eq!(player.upgrade_slots.len(), 1);

        let dig = profiles.resource("1", Activity::Dig).await?;
        assert_eq!((dig.level, dig.upgrade_tokens_used, dig.upgrade_tokens()), (5, 5, 0));
        let stored: PlayerProfile = profiles.read("1").await?;
        assert_eq!(stored, player);
        Ok(())
    }

    #[tokio::test]
    async fn test_insufficient_tokens_changes_nothing() -> Result<()> {
        let (service, profiles, _clock) = service(1_000).await?;
        profiles.add_xp("1", Activity::Dig, 260).await?;

        let outcome = service.start("1", 1, "diggers_satchel").await?;
        assert_eq!(
            outcome,
            UpgradeStart::Blocked(Blocker::InsufficientTokens {
                activity: Activity::Dig,
                available: 2,
                cost: 5,
            })
        );
        let dig = profiles.resource("1", Activity::Dig).await?;
        assert_eq!(dig.upgrade_tokens_used, 0);
        let player: PlayerProfile = profiles.read("1").await?;
        assert_eq!(player.amount_of("ITDigUpgradeToken"), 2);
        assert!(player.upgrade_slots.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_mixed_cost_upgrade_needs_requirement_then_pays_both() -> Result<()> {
        let (service, profiles, _clock) = service(0).await?;
        profiles.add_xp("1", Activity::Mine, 1_000).await?;
        profiles
            .update("1", |wallet: &mut WalletStats| wallet.coins = 6_000)
            .await?;

        assert_eq!(
            service.start("1", 1, "miners_satchel").await?,
            UpgradeStart::Blocked(Blocker::MissingRequirement("diggers_satchel"))
        );

        profiles
            .update("1", |player: &mut PlayerProfile| {
                player.item_upgrades.push("diggers_satchel".to_string());
            })
            .await?;
        let outcome = service.start("1", 1, "miners_satchel").await?;
        assert!(matches!(outcome, UpgradeStart::Started { .. }), "{outcome:?}");

        let wallet: WalletStats = profiles.read("1").await?;
        assert_eq!(wallet.coins, 1_000);
        let mine = profiles.resource("1", Activity::Mine).await?;
        assert_eq!(mine.upgrade_tokens(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_waits_for_timer_and_raises_capacity() -> Result<()> {
        let (service, profiles, clock) = service(0).await?;
        profiles
            .update("1", |wallet: &mut WalletStats| wallet.coins = 100_000)
            .await?;

        assert!(matches!(
            service.start("1", 1, "backpack_inventory_1").await?,
            UpgradeStart::Started { .. }
        ));
        assert_eq!(
            service.start("1", 1, "diggers_satchel").await?,
            UpgradeStart::Blocked(Blocker::NoFreeSlot)
        );
        assert_eq!(service.claim("1", 1).await?, UpgradeClaim::NotReady { ends_at: 3_600_000 });
        assert_eq!(service.claim("1", 2).await?, UpgradeClaim::EmptySlot);

        clock.advance(3_600_000);
        let UpgradeClaim::Claimed { upgrade, player } = service.claim("1", 1).await? else {
            panic!("finished upgrade should be claimable");
        };
        assert_eq!(upgrade.key, "backpack_inventory_1");
        assert_eq!(player.inventory_capacity, 600);
        assert!(player.has_upgrade("backpack_inventory_1"));
        assert!(player.upgrade_slots.is_empty());

        let wallet: WalletStats = profiles.read("1").await?;
        assert_eq!(wallet.coins, 0);
        Ok(())
    }

    #[test]
    fn test_available_hides_owned_running_and_locked() {
        let mut player = PlayerProfile::default();
        let keys = |player: &PlayerProfile, search: &str| -> Vec<&str> {
            available_upgrades(player, search).iter().map(|upgrade| upgrade.key).collect()
        };
        assert_eq!(keys(&player, ""), vec!["diggers_satchel", "backpack_inventory_1"]);
        assert_eq!(keys(&player, "BACKPACK"), vec!["backpack_inventory_1"]);

        player.item_upgrades.push("backpack_inventory_1".to_string());
        player.upgrade_slots.push(UpgradeSlot {
            slot: 1,
            upgrade_key: "diggers_satchel".to_string(),
            started_at: 0,
            ends_at: 10,
        });
        assert_eq!(keys(&player, ""), vec!["backpack_inventory_2"]);
    }

    #[test]
    fn test_paginate_clamps_page() {
        let all: Vec<&'static ItemUpgrade> = ITEM_UPGRADES.iter().collect();
        let page = paginate(&all, 9);
        assert_eq!((page.page, page.total_pages), (2, 2));
        assert_eq!(page.upgrades.len(), ITEM_UPGRADES.len() - UPGRADES_PER_PAGE);
        assert_eq!(paginate(&[], 0).total_pages, 1);
    }
}
