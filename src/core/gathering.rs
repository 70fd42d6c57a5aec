//! The dig/mine game loop.
//!
//! [`GatheringEngine`] ties the session registry, the loot tables and the
//! profile service together. It never talks to Discord; callers render the
//! returned outcomes.

use crate::{
    core::{
        activity::Activity,
        catalog::FIST_ID,
        inventory::PlayerProfile,
        loot::{LootItem, LootOutcome, LootTables, roll_loot},
        profiles::{LootReceipt, Profiles},
        random::{RandomSource, uniform_int},
        session::{GatheringSession, MessageRef, Phase, SessionRegistry, StartOutcome},
    },
    errors::Result,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Damage range used without usable gear.
const FALLBACK_DAMAGE: (f64, f64) = (2.0, 5.0);

/// Result of one swing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwingOutcome {
    /// No live session; show the idle view
    NoSession,
    /// Damage dealt, layer still standing
    Hit {
        /// Session after the swing
        session: GatheringSession,
        /// Damage dealt
        damage: i64,
    },
    /// Layer cleared and loot committed
    LayerCleared {
        /// Session after the swing (already on the next layer)
        session: GatheringSession,
        /// Damage dealt
        damage: i64,
        /// What was written to the profiles
        receipt: LootReceipt,
    },
}

/// Which equipment slot a selection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipSlot {
    /// Tool/weapon slot
    Gear,
    /// Misc slot
    Misc,
}

impl EquipSlot {
    /// Parses the slot segment of a select-menu id.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "gear" => Some(Self::Gear),
            "misc" => Some(Self::Misc),
            _ => None,
        }
    }

    /// Slot segment used in select-menu ids.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Gear => "gear",
            Self::Misc => "misc",
        }
    }
}

/// Result of an equipment selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EquipOutcome {
    /// Selection applied
    Equipped(PlayerProfile),
    /// Item not held or not usable for this activity; profile unchanged
    Rejected(PlayerProfile),
}

/// Dig/mine engine shared by every handler.
pub struct GatheringEngine {
    registry: SessionRegistry,
    profiles: Arc<Profiles>,
    rng: Arc<dyn RandomSource>,
    dig_tables: LootTables,
    mine_tables: LootTables,
}

impl std::fmt::Debug for GatheringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatheringEngine")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl GatheringEngine {
    /// Builds the engine with the built-in loot tables, validating them first.
    pub fn new(registry: SessionRegistry, profiles: Arc<Profiles>, rng: Arc<dyn RandomSource>) -> Result<Self> {
        let dig_tables = LootTables::for_activity(Activity::Dig);
        let mine_tables = LootTables::for_activity(Activity::Mine);
        dig_tables.validate()?;
        mine_tables.validate()?;
        Ok(Self {
            registry,
            profiles,
            rng,
            dig_tables,
            mine_tables,
        })
    }

    /// Session registry.
    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Profile service.
    #[must_use]
    pub fn profiles(&self) -> &Profiles {
        &self.profiles
    }

    const fn tables(&self, activity: Activity) -> &LootTables {
        match activity {
            Activity::Dig => &self.dig_tables,
            Activity::Mine => &self.mine_tables,
        }
    }

    /// Rolls loot for `layer` of `activity`.
    #[must_use]
    pub fn roll(&self, activity: Activity, layer: i64) -> LootOutcome {
        roll_loot(self.tables(activity), self.profiles.catalog(), self.rng.as_ref(), layer)
    }

    /// Starts a session with layer 0 loot pre-rolled.
    #[instrument(skip(self))]
    pub fn start(&self, user_id: &str, activity: Activity, message: Option<MessageRef>) -> StartOutcome {
        let pending = self.roll(activity, 0);
        self.registry.start(user_id, activity, message, Some(pending))
    }

    /// Damage of the next swing.
    ///
    /// Mining with gear that has power deals
    /// `max(1, floor(power + power_per_level * level))`; everything else rolls 2..=5.
    pub async fn damage(&self, user_id: &str, activity: Activity) -> Result<i64> {
        let fallback = || uniform_int(self.rng.as_ref(), FALLBACK_DAMAGE.0, FALLBACK_DAMAGE.1);
        if activity != Activity::Mine {
            return Ok(fallback());
        }
        let player: PlayerProfile = self.profiles.read(user_id).await?;
        let Some(power) = player
            .gear_for(self.profiles.catalog(), activity.key())
            .and_then(|item| item.gear)
        else {
            return Ok(fallback());
        };
        let level = self.profiles.resource(user_id, activity).await?.level;
        #[allow(clippy::cast_possible_truncation)]
        let damage = (power.power + power.power_per_level * f64::from(level)).floor() as i64;
        Ok(damage.max(1))
    }

    /// Processes one swing.
    ///
    /// A cleared layer's loot is committed to the profiles before returning.
    #[instrument(skip(self))]
    pub async fn swing(&self, user_id: &str, activity: Activity) -> Result<SwingOutcome> {
        if self.registry.get(user_id, activity).is_none() {
            return Ok(SwingOutcome::NoSession);
        }
        let damage = self.damage(user_id, activity).await?;

        let Some((cleared, session)) = self.registry.with_live(user_id, activity, |session| {
            session.phase = Phase::Active;
            session.apply_damage(damage, |layer| self.roll(activity, layer))
        }) else {
            return Ok(SwingOutcome::NoSession);
        };

        let Some(loot) = cleared else {
            return Ok(SwingOutcome::Hit { session, damage });
        };
        debug!(user_id, layer = session.layer - 1, xp = loot.xp, "Layer cleared");
        let receipt = self.profiles.commit_loot(user_id, activity, &loot).await?;

        // Only what reached the inventory is shown as earned.
        let mut session = session;
        if let Some(shown) = session.loot.as_mut() {
            shown.items = receipt
                .added
                .iter()
                .filter(|(_, amount)| *amount > 0)
                .map(|&(item_id, amount)| LootItem { item_id, amount })
                .collect();
        }
        self.registry
            .set_loot(user_id, activity, session.session_id, session.loot.clone());
        Ok(SwingOutcome::LayerCleared {
            session,
            damage,
            receipt,
        })
    }

    /// Ends a session without awarding the layer in progress.
    pub fn stop(&self, user_id: &str, activity: Activity) -> bool {
        self.registry.destroy(user_id, activity)
    }

    /// Counts a navigation click as activity for a live session.
    pub fn touch(&self, user_id: &str, activity: Activity) {
        self.registry.touch(user_id, activity);
    }

    /// Applies an equipment selection from the activity's select menu.
    ///
    /// `value` is an item id; `"none"` and items not usable for `activity`
    /// leave the profile untouched.
    pub async fn equip(&self, user_id: &str, activity: Activity, slot: EquipSlot, value: &str) -> Result<EquipOutcome> {
        let catalog = self.profiles.catalog();
        let usable = value == FIST_ID
            || catalog
                .get(value)
                .is_some_and(|item| item.supports(activity.key()));

        self.profiles
            .update(user_id, |player: &mut PlayerProfile| {
                let applied = usable
                    && match slot {
                        EquipSlot::Gear => player.equip_gear(value),
                        EquipSlot::Misc => player.equip_misc(value),
                    };
                if applied {
                    EquipOutcome::Equipped(player.clone())
                } else {
                    EquipOutcome::Rejected(player.clone())
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
    use crate::core::random::FixedRandom;
    use crate::core::session::SessionSettings;
    use crate::test_utils::{init_test_tracing, memory_profiles};

    async fn engine(random: f64, clock: Arc<ManualClock>) -> Result<GatheringEngine> {
        let registry = SessionRegistry::new(clock, SessionSettings::default(), None);
        GatheringEngine::new(registry, Arc::new(memory_profiles().await?), Arc::new(FixedRandom(random)))
    }

    #[tokio::test]
    async fn test_swing_without_session_is_not_an_error() -> Result<()> {
        let engine = engine(0.5, Arc::new(ManualClock::new(0))).await?;
        assert_eq!(engine.swing("u", Activity::Dig).await?, SwingOutcome::NoSession);
        Ok(())
    }

    #[tokio::test]
    async fn test_two_max_swings_clear_dig_layer_and_commit_loot() -> Result<()> {
        // 0.999 rolls maximum damage (5) and the top treasure band
        let engine = engine(0.999, Arc::new(ManualClock::new(0))).await?;
        assert!(matches!(engine.start("u", Activity::Dig, None), StartOutcome::Started(_)));

        let first = engine.swing("u", Activity::Dig).await?;
        assert!(matches!(first, SwingOutcome::Hit { damage: 5, ref session } if session.health == 5));

        let SwingOutcome::LayerCleared { session, receipt, .. } = engine.swing("u", Activity::Dig).await? else {
            panic!("layer should clear");
        };
        assert_eq!(session.layer, 1);
        assert_eq!(session.max_health, 10);
        assert_eq!(receipt.added, vec![("ITCommonChest", 1)]);

        let player: PlayerProfile = engine.profiles().read("u").await?;
        assert_eq!(player.amount_of("ITCommonChest"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_discards_partial_layer() -> Result<()> {
        let engine = engine(0.0, Arc::new(ManualClock::new(0))).await?;
        engine.start("u", Activity::Mine, None);
        // minimum damage 2 against 10 health
        engine.swing("u", Activity::Mine).await?;
        assert!(engine.stop("u", Activity::Mine));

        let player: PlayerProfile = engine.profiles().read("u").await?;
        assert!(player.misc_inventory.is_empty());
        assert_eq!(engine.profiles().resource("u", Activity::Mine).await?.xp, 0);
        assert_eq!(engine.swing("u", Activity::Mine).await?, SwingOutcome::NoSession);
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_mid_layer_keeps_only_cleared_layers() -> Result<()> {
        // every dig layer below 26 rolls a common chest worth 80 xp
        let engine = engine(0.999, Arc::new(ManualClock::new(0))).await?;
        engine.start("u", Activity::Dig, None);

        // layers 0 and 1 take two swings of 5 each
        for _ in 0..4 {
            engine.swing("u", Activity::Dig).await?;
        }
        let SwingOutcome::Hit { session, .. } = engine.swing("u", Activity::Dig).await? else {
            panic!("layer 2 has 15 health");
        };
        assert_eq!((session.layer, session.health), (2, 10));
        assert!(engine.stop("u", Activity::Dig));

        let player: PlayerProfile = engine.profiles().read("u").await?;
        assert_eq!(player.amount_of("ITCommonChest"), 2);
        assert_eq!(player.amount_of("ITDigUpgradeToken"), 1);
        assert_eq!(player.misc_inventory.len(), 2);
        let dig = engine.profiles().resource("u", Activity::Dig).await?;
        assert_eq!((dig.level, dig.xp), (1, 60));
        Ok(())
    }

    #[tokio::test]
    async fn test_full_inventory_shows_no_unstored_loot() -> Result<()> {
        init_test_tracing();
        let engine = engine(0.999, Arc::new(ManualClock::new(0))).await?;
        let dirt = engine.profiles().catalog().get("ITDirt").unwrap().clone();
        engine
            .profiles()
            .update("u", |player: &mut PlayerProfile| {
                player.inventory_capacity = 1;
                player.add_item(&dirt, 1)
            })
            .await?;
        engine.start("u", Activity::Dig, None);

        engine.swing("u", Activity::Dig).await?;
        let SwingOutcome::LayerCleared { session, receipt, .. } = engine.swing("u", Activity::Dig).await? else {
            panic!("layer should clear");
        };
        assert_eq!(receipt.added, vec![("ITCommonChest", 0)]);
        assert!(session.loot.as_ref().unwrap().items.is_empty());
        assert_eq!(session.loot.as_ref().unwrap().xp, 80);

        let stored = engine.registry().get("u", Activity::Dig).unwrap();
        assert_eq!(stored.loot, session.loot);
        let body = crate::core::presenter::gathering_active(&stored, engine.profiles().catalog()).body();
        assert!(!body.contains("You earned"));
        assert!(!body.contains("Treasure Chest"));
        Ok(())
    }

    #[tokio::test]
    async fn test_swing_after_duration_ends_session() -> Result<()> {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(0.0, Arc::clone(&clock)).await?;
        engine.start("u", Activity::Dig, None);
        clock.advance(5 * 60 * 1000);

        assert_eq!(engine.swing("u", Activity::Dig).await?, SwingOutcome::NoSession);
        assert!(engine.registry().get("u", Activity::Dig).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_mine_damage_scales_with_gear_and_level() -> Result<()> {
        let engine = engine(0.0, Arc::new(ManualClock::new(0))).await?;
        // bare hands fall back to the 2..=5 roll
        assert_eq!(engine.damage("u", Activity::Mine).await?, 2);

        let catalog = engine.profiles().catalog();
        let pickaxe = catalog.get("ITIronPickaxe").unwrap().clone();
        engine
            .profiles()
            .update("u", |player: &mut PlayerProfile| player.add_item(&pickaxe, 1))
            .await?;
        let outcome = engine.equip("u", Activity::Mine, EquipSlot::Gear, "ITIronPickaxe").await?;
        assert!(matches!(outcome, EquipOutcome::Equipped(_)));
        engine.profiles().add_xp("u", Activity::Mine, 250).await?;

        // floor(8 + 0.2 * 2)
        assert_eq!(engine.damage("u", Activity::Mine).await?, 8);
        Ok(())
    }

    #[tokio::test]
    async fn test_equip_rejects_gear_for_other_activity() -> Result<()> {
        let engine = engine(0.0, Arc::new(ManualClock::new(0))).await?;
        let pickaxe = engine.profiles().catalog().get("ITWoodenPickaxe").unwrap().clone();
        engine
            .profiles()
            .update("u", |player: &mut PlayerProfile| player.add_item(&pickaxe, 1))
            .await?;

        let outcome = engine.equip("u", Activity::Dig, EquipSlot::Gear, "ITWoodenPickaxe").await?;
        assert!(matches!(outcome, EquipOutcome::Rejected(ref p) if p.gear_equipped.is_none()));

        let outcome = engine.equip("u", Activity::Dig, EquipSlot::Gear, FIST_ID).await?;
        assert!(matches!(outcome, EquipOutcome::Equipped(_)));
        Ok(())
    }
}
