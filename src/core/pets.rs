//! Pet collections.
//!
//! Pets are owned as individual instances with their own level and XP. Up to
//! three instances can be placed on a battle team; stats scale with level.

use crate::{
    core::{
        catalog::Rarity,
        clock::Clock,
        profiles::{Profiles, Record, RecordDefaults},
        random::RandomSource,
        store::Domain,
    },
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Highest pet level.
pub const PET_LEVEL_CAP: u32 = 100;

/// Growth of the XP requirement per level.
pub const PET_BASE_GROWTH: f64 = 1.069;

/// Battle team size.
pub const TEAM_SLOTS: usize = 3;

/// Target strategy of an empty team slot.
pub const DEFAULT_TARGET: &str = "Random";

/// Identifier of the pet granted to guild owners.
pub const OWNER_PET_ID: &str = "PETUFO";

/// One attack of a pet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PetAttack {
    /// Display name
    pub name: &'static str,
    /// Targeting style, e.g. `Singular`
    pub kind: &'static str,
    /// Hits per turn
    pub hits: u32,
    /// Minimum damage at level 0
    pub min_damage: u64,
    /// Maximum damage at level 0
    pub max_damage: u64,
}

/// Static description of a pet species.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PetDefinition {
    /// Stable identifier
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Discord emoji markup
    pub emoji: &'static str,
    /// Rarity tier
    pub rarity: Rarity,
    /// Nominal value
    pub value: u64,
    /// Whether the market accepts it
    pub sellable: bool,
    /// Whether players may trade it
    pub tradable: bool,
    /// Only granted by administrators
    pub admin_only: bool,
    /// Health at level 0
    pub base_health: u64,
    /// Attacks, the first is used in battle
    pub attacks: &'static [PetAttack],
}

/// Every pet species.
pub const PETS: &[PetDefinition] = &[PetDefinition {
    id: OWNER_PET_ID,
    name: "UFO",
    emoji: "<:PETUFO:1450110098692112384>",
    rarity: Rarity::Secret,
    value: 7_777,
    sellable: false,
    tradable: false,
    admin_only: true,
    base_health: 1_000,
    attacks: &[PetAttack {
        name: "Laser Beam",
        kind: "Singular",
        hits: 1,
        min_damage: 300,
        max_damage: 500,
    }],
}];

/// Looks up a species.
#[must_use]
pub fn find_pet(id: &str) -> Option<&'static PetDefinition> {
    PETS.iter().find(|pet| pet.id == id)
}

/// XP multiplier of a rarity.
#[must_use]
pub const fn rarity_multiplier(rarity: Rarity) -> f64 {
    match rarity {
        Rarity::Common => 1.0,
        Rarity::Rare => 1.25,
        Rarity::Epic => 1.8,
        Rarity::Legendary => 2.5,
        Rarity::Mythical => 3.75,
        Rarity::Secret => 5.0,
    }
}

/// XP needed to leave `level`, `None` at the cap.
#[must_use]
pub fn pet_xp_requirement(level: u32, rarity: Rarity) -> Option<u64> {
    if level >= PET_LEVEL_CAP {
        return None;
    }
    let base = (100.0 * PET_BASE_GROWTH.powf(f64::from(level))).ceil();
    // Bounded by the level cap, far below u64::MAX.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let requirement = (base * rarity_multiplier(rarity)).ceil() as u64;
    Some(requirement)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn scale(value: u64, factor: f64, level: u32) -> u64 {
    (value as f64 * factor.powf(f64::from(level))).ceil() as u64
}

/// Health at `level`.
#[must_use]
pub fn scale_health(base: u64, level: u32) -> u64 {
    scale(base, 1.5, level)
}

/// Damage range at `level`.
#[must_use]
pub fn scale_damage(min: u64, max: u64, level: u32) -> (u64, u64) {
    (scale(min, 1.35, level), scale(max, 1.35, level))
}

/// One owned pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetInstance {
    /// Unique per owner
    pub instance_id: String,
    /// Species identifier
    pub id: String,
    /// Current level
    #[serde(default)]
    pub level: u32,
    /// XP into the current level
    #[serde(default)]
    pub xp: u64,
}

impl PetInstance {
    /// Species of this instance.
    #[must_use]
    pub fn definition(&self) -> Option<&'static PetDefinition> {
        find_pet(&self.id)
    }

    /// XP needed to level up, `None` at the cap.
    #[must_use]
    pub fn next_level_xp(&self) -> Option<u64> {
        let rarity = self.definition().map_or(Rarity::Common, |pet| pet.rarity);
        pet_xp_requirement(self.level, rarity)
    }
}

/// One battle team position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSlot {
    /// Placed instance
    pub pet_instance_id: Option<String>,
    /// Targeting strategy
    pub target_type: String,
}

impl Default for TeamSlot {
    fn default() -> Self {
        Self {
            pet_instance_id: None,
            target_type: DEFAULT_TARGET.to_string(),
        }
    }
}

/// Per-user pet record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PetProfile {
    /// Owned instances
    pub inventory: Vec<PetInstance>,
    /// Battle team
    pub team: Vec<TeamSlot>,
}

impl Record for PetProfile {
    fn domain() -> Domain {
        Domain::Pets
    }

    fn normalize(&mut self, _defaults: &RecordDefaults) {
        self.inventory.retain(|pet| !pet.instance_id.is_empty());
        for pet in &mut self.inventory {
            pet.level = pet.level.min(PET_LEVEL_CAP);
        }
        if self.team.is_empty() {
            self.team = vec![TeamSlot::default(); TEAM_SLOTS];
        }
        let owned: Vec<String> = self.inventory.iter().map(|pet| pet.instance_id.clone()).collect();
        for slot in &mut self.team {
            if slot.pet_instance_id.as_ref().is_some_and(|id| !owned.contains(id)) {
                slot.pet_instance_id = None;
            }
            if slot.target_type.is_empty() {
                slot.target_type = DEFAULT_TARGET.to_string();
            }
        }
    }
}

impl PetProfile {
    /// Finds an owned instance.
    #[must_use]
    pub fn find(&self, instance_id: &str) -> Option<&PetInstance> {
        self.inventory.iter().find(|pet| pet.instance_id == instance_id)
    }

    /// Owned instances of `rarity`.
    #[must_use]
    pub fn of_rarity(&self, rarity: Rarity) -> Vec<&PetInstance> {
        self.inventory
            .iter()
            .filter(|pet| pet.definition().is_some_and(|def| def.rarity == rarity))
            .collect()
    }

    /// Whether any instance of species `pet_id` is owned.
    #[must_use]
    pub fn owns(&self, pet_id: &str) -> bool {
        self.inventory.iter().any(|pet| pet.id == pet_id)
    }
}

/// Level-scaled battle stats of a pet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattlePet {
    /// Instance
    pub instance_id: String,
    /// Species
    pub definition: &'static PetDefinition,
    /// Level
    pub level: u32,
    /// Damage range of the first attack
    pub damage: (u64, u64),
    /// Hits per turn
    pub hits: u32,
    /// Targeting strategy
    pub target_type: String,
    /// Full health
    pub max_health: u64,
}

impl BattlePet {
    /// Stats of `pet`, `None` for unknown species.
    #[must_use]
    pub fn new(pet: &PetInstance, target_type: &str) -> Option<Self> {
        let definition = pet.definition()?;
        let (min, max, hits) = definition
            .attacks
            .first()
            .map_or((1, 1, 1), |attack| (attack.min_damage, attack.max_damage, attack.hits));
        Some(Self {
            instance_id: pet.instance_id.clone(),
            definition,
            level: pet.level,
            damage: scale_damage(min, max, pet.level),
            hits,
            target_type: target_type.to_string(),
            max_health: scale_health(definition.base_health, pet.level),
        })
    }
}

/// The team of `profile`, skipping empty and dangling slots.
#[must_use]
pub fn battle_pets(profile: &PetProfile) -> Vec<BattlePet> {
    profile
        .team
        .iter()
        .filter_map(|slot| {
            let pet = profile.find(slot.pet_instance_id.as_deref()?)?;
            BattlePet::new(pet, &slot.target_type)
        })
        .collect()
}

/// Pet collections.
#[derive(Clone)]
pub struct PetService {
    profiles: Arc<Profiles>,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for PetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetService").finish_non_exhaustive()
    }
}

impl PetService {
    /// Creates the service.
    #[must_use]
    pub fn new(profiles: Arc<Profiles>, clock: Arc<dyn Clock>, rng: Arc<dyn RandomSource>) -> Self {
        Self { profiles, clock, rng }
    }

    /// The user's pets.
    pub async fn collection(&self, user_id: &str) -> Result<PetProfile> {
        self.profiles.read(user_id).await
    }

    fn new_instance_id(&self) -> String {
        // Draws are in [0, 1), the product fits in u32.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let suffix = (self.rng.next_f64() * f64::from(u32::MAX)) as u32;
        format!("pet-{}-{suffix:08x}", self.clock.now_ms())
    }

    /// Adds a level 0 instance of `pet_id`.
    pub async fn grant(&self, user_id: &str, pet_id: &str) -> Result<PetInstance> {
        let definition = find_pet(pet_id).ok_or_else(|| Error::UnknownItem { id: pet_id.to_string() })?;
        let pet = PetInstance {
            instance_id: self.new_instance_id(),
            id: definition.id.to_string(),
            level: 0,
            xp: 0,
        };
        let stored = pet.clone();
        self.profiles
            .update(user_id, move |profile: &mut PetProfile| profile.inventory.push(stored))
            .await?;
        info!(user_id, pet_id, instance_id = %pet.instance_id, "Pet granted");
        Ok(pet)
    }

    /// Grants the owner pet unless the user already has one. Returns whether
    /// a pet was added.
    pub async fn grant_owner_pet(&self, user_id: &str) -> Result<bool> {
        let instance_id = self.new_instance_id();
        let granted = self
            .profiles
            .update(user_id, move |profile: &mut PetProfile| {
                if profile.owns(OWNER_PET_ID) {
                    return false;
                }
                profile.inventory.push(PetInstance {
                    instance_id,
                    id: OWNER_PET_ID.to_string(),
                    level: 0,
                    xp: 0,
                });
                true
            })
            .await?;
        if granted {
            info!(user_id, "Owner pet granted");
        }
        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::random::FixedRandom;
    use crate::test_utils::memory_profiles;

    #[test]
    fn test_xp_requirement_curve() {
        assert_eq!(pet_xp_requirement(0, Rarity::Common), Some(100));
        assert_eq!(pet_xp_requirement(0, Rarity::Secret), Some(500));
        // ceil(100 * 1.069) = 107, then * 1.25 = 133.75
        assert_eq!(pet_xp_requirement(1, Rarity::Rare), Some(134));
        assert_eq!(pet_xp_requirement(PET_LEVEL_CAP, Rarity::Common), None);
    }

    #[test]
    fn test_battle_stats_scale_with_level() {
        let profile = PetProfile {
            inventory: vec![PetInstance {
                instance_id: "pet-1".into(),
                id: OWNER_PET_ID.into(),
                level: 2,
                xp: 0,
            }],
            team: vec![
                TeamSlot {
                    pet_instance_id: Some("pet-1".into()),
                    target_type: "Strongest".into(),
                },
                TeamSlot {
                    pet_instance_id: Some("pet-gone".into()),
                    target_type: DEFAULT_TARGET.into(),
                },
                TeamSlot::default(),
            ],
        };

        let team = battle_pets(&profile);
        assert_eq!(team.len(), 1);
        assert_eq!(team[0].max_health, 2_250);
        // 300 * 1.8225 = 546.75, 500 * 1.8225 = 911.25
        assert_eq!(team[0].damage, (547, 912));
        assert_eq!(team[0].target_type, "Strongest");
    }

    #[test]
    fn test_normalize_repairs_team() {
        let mut profile = PetProfile {
            inventory: vec![PetInstance {
                instance_id: String::new(),
                id: OWNER_PET_ID.into(),
                level: 250,
                xp: 0,
            }],
            team: Vec::new(),
        };
        profile.normalize(&RecordDefaults::default());
        assert!(profile.inventory.is_empty());
        assert_eq!(profile.team, vec![TeamSlot::default(); TEAM_SLOTS]);
    }

    #[tokio::test]
    async fn test_owner_pet_is_granted_once() -> Result<()> {
        let profiles = Arc::new(memory_profiles().await?);
        let pets = PetService::new(
            Arc::clone(&profiles),
            Arc::new(ManualClock::new(42)),
            Arc::new(FixedRandom(0.5)),
        );

        assert!(pets.grant_owner_pet("owner").await?);
        assert!(!pets.grant_owner_pet("owner").await?);
        let collection = pets.collection("owner").await?;
        assert_eq!(collection.inventory.len(), 1);
        assert_eq!(collection.inventory[0].instance_id, "pet-42-7fffffff");
        assert_eq!(collection.of_rarity(Rarity::Secret).len(), 1);
        assert!(collection.of_rarity(Rarity::Common).is_empty());
        assert_eq!(collection.team.len(), TEAM_SLOTS);

        let err = pets.grant("owner", "PETDRAGON").await.unwrap_err();
        assert!(matches!(err, Error::UnknownItem { .. }));
        Ok(())
    }
}
