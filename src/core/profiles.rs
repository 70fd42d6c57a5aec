//! Typed profile access on top of a [`ProfileStore`].
//!
//! Every record is normalised once when it crosses the storage boundary, so the
//! rest of the crate can rely on well-formed values. Mutations for one user are
//! serialised through a per-user async mutex.

use crate::{
    core::{
        activity::Activity,
        catalog::Catalog,
        inventory::{DEFAULT_CAPACITY, PlayerProfile},
        loot::LootOutcome,
        progression::{ResourceProfile, XpGain},
        store::{Domain, ProfileStore},
        wallet::WalletStats,
    },
    errors::{Error, Result},
};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{instrument, warn};

/// Defaults applied while normalising stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordDefaults {
    /// Inventory slots for new or broken player profiles
    pub inventory_capacity: u32,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            inventory_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// A per-user record that lives in one storage domain.
pub trait Record: Serialize + DeserializeOwned + Default + Send + 'static {
    /// Domain the record is stored under.
    fn domain() -> Domain;

    /// Repairs a freshly loaded record.
    fn normalize(&mut self, defaults: &RecordDefaults);

    /// Value used when the user has no stored record yet.
    fn fresh(defaults: &RecordDefaults) -> Self {
        let mut record = Self::default();
        record.normalize(defaults);
        record
    }
}

impl Record for PlayerProfile {
    fn domain() -> Domain {
        Domain::Player
    }

    fn normalize(&mut self, defaults: &RecordDefaults) {
        Self::normalize(self, defaults.inventory_capacity);
    }

    fn fresh(defaults: &RecordDefaults) -> Self {
        Self::with_capacity(defaults.inventory_capacity)
    }
}

impl Record for WalletStats {
    fn domain() -> Domain {
        Domain::Wallet
    }

    fn normalize(&mut self, _defaults: &RecordDefaults) {
        Self::normalize(self);
    }
}

/// Dig progression record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DigProfile(pub ResourceProfile);

/// Mine progression record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MineProfile(pub ResourceProfile);

impl Record for DigProfile {
    fn domain() -> Domain {
        Activity::Dig.domain()
    }

    fn normalize(&mut self, _defaults: &RecordDefaults) {
        self.0.normalize();
    }
}

impl Record for MineProfile {
    fn domain() -> Domain {
        Activity::Mine.domain()
    }

    fn normalize(&mut self, _defaults: &RecordDefaults) {
        self.0.normalize();
    }
}

/// What a committed loot outcome actually changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootReceipt {
    /// `(item id, units added)`; 0 means the inventory had no room
    pub added: Vec<(&'static str, u32)>,
    /// XP award result
    pub xp: XpGain,
    /// Activity profile after the award
    pub profile: ResourceProfile,
}

/// Exclusive access to one user's records. The user's lock entry is dropped
/// with the last holder.
#[derive(Debug)]
pub struct UserLock<'p> {
    guard: Option<OwnedMutexGuard<()>>,
    profiles: &'p Profiles,
    user_id: String,
}

impl Drop for UserLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.profiles.lock_map();
        // Waiters hold a clone, so a count of 1 means nobody else wants it.
        if locks
            .get(&self.user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.user_id);
        }
    }
}

/// Several records of one user, read and written under a single hold of the
/// user's lock.
#[derive(Debug)]
pub struct ProfileScope<'p> {
    lock: UserLock<'p>,
}

impl ProfileScope<'_> {
    /// Owner of the scope.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.lock.user_id
    }

    /// Reads a record, creating defaults like [`Profiles::read`].
    pub async fn read<T: Record>(&self) -> Result<T> {
        self.lock.profiles.read_unlocked(&self.lock.user_id).await
    }

    /// Replaces a record.
    pub async fn write<T: Record>(&self, record: &T) -> Result<()> {
        self.lock.profiles.write_unlocked(&self.lock.user_id, record).await
    }

    /// Changes the progression profile of `activity` and re-syncs its token
    /// stack in the inventory.
    pub async fn update_resource<R, F>(&self, activity: Activity, mutate: F) -> Result<(ResourceProfile, R)>
    where
        F: FnOnce(&mut ResourceProfile) -> R + Send,
    {
        let profiles = self.lock.profiles;
        let user_id = self.lock.user_id.as_str();
        let (profile, result) = profiles.update_resource_unlocked(user_id, activity, mutate).await?;
        profiles.sync_token_unlocked(user_id, activity, &profile).await?;
        Ok((profile, result))
    }
}

/// Typed, per-user serialised access to every profile domain.
pub struct Profiles {
    store: Arc<dyn ProfileStore>,
    catalog: Arc<Catalog>,
    defaults: RecordDefaults,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl std::fmt::Debug for Profiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiles")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl Profiles {
    /// Creates the service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ProfileStore>, catalog: Arc<Catalog>, defaults: RecordDefaults) -> Self {
        Self {
            store,
            catalog,
            defaults,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Item catalog used for inventory mutations.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn lock_map(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Waits for exclusive access to `user_id`'s records.
    pub async fn lock_user(&self, user_id: &str) -> UserLock<'_> {
        let lock = Arc::clone(self.lock_map().entry(user_id.to_string()).or_default());
        UserLock {
            guard: Some(lock.lock_owned().await),
            profiles: self,
            user_id: user_id.to_string(),
        }
    }

    /// Locks `user_id` for a multi-record change.
    pub async fn scope(&self, user_id: &str) -> ProfileScope<'_> {
        ProfileScope {
            lock: self.lock_user(user_id).await,
        }
    }

    /// Number of users with a lock entry.
    #[must_use]
    pub fn locked_users(&self) -> usize {
        self.lock_map().len()
    }

    /// Reads a record, creating and persisting defaults if it does not exist.
    pub async fn read<T: Record>(&self, user_id: &str) -> Result<T> {
        let _guard = self.lock_user(user_id).await;
        self.read_unlocked(user_id).await
    }

    /// Replaces a record wholesale.
    pub async fn write<T: Record>(&self, user_id: &str, record: &T) -> Result<()> {
        let _guard = self.lock_user(user_id).await;
        self.write_unlocked(user_id, record).await
    }

    /// Read-modify-write of one record under the user's lock.
    pub async fn update<T, R, F>(&self, user_id: &str, mutate: F) -> Result<R>
    where
        T: Record,
        F: FnOnce(&mut T) -> R + Send,
    {
        let _guard = self.lock_user(user_id).await;
        let mut record: T = self.read_unlocked(user_id).await?;
        let result = mutate(&mut record);
        self.write_unlocked(user_id, &record).await?;
        Ok(result)
    }

    /// Every stored record in `T`'s domain, normalised. Broken entries are skipped.
    pub async fn list<T: Record>(&self) -> Result<Vec<(String, T)>> {
        let records = self.store.list(T::domain()).await?;
        Ok(records
            .into_iter()
            .filter_map(|(user_id, value)| match serde_json::from_value::<T>(value) {
                Ok(mut record) => {
                    record.normalize(&self.defaults);
                    Some((user_id, record))
                }
                Err(e) => {
                    warn!("Skipping unreadable {} record for {user_id}: {e}", T::domain());
                    None
                }
            })
            .collect())
    }

    /// Reads the progression profile of `activity`.
    pub async fn resource(&self, user_id: &str, activity: Activity) -> Result<ResourceProfile> {
        Ok(match activity {
            Activity::Dig => self.read::<DigProfile>(user_id).await?.0,
            Activity::Mine => self.read::<MineProfile>(user_id).await?.0,
        })
    }

    /// Awards activity XP and mirrors the token count into the inventory.
    #[instrument(skip(self))]
    pub async fn add_xp(&self, user_id: &str, activity: Activity, amount: u64) -> Result<(ResourceProfile, XpGain)> {
        let _guard = self.lock_user(user_id).await;
        self.add_xp_unlocked(user_id, activity, amount).await
    }

    /// Writes a loot outcome through to the player inventory and activity
    /// profile as one step for the user.
    #[instrument(skip(self, loot), fields(items = loot.items.len(), xp = loot.xp))]
    pub async fn commit_loot(&self, user_id: &str, activity: Activity, loot: &LootOutcome) -> Result<LootReceipt> {
        let _guard = self.lock_user(user_id).await;

        let mut player: PlayerProfile = self.read_unlocked(user_id).await?;
        let mut added = Vec::with_capacity(loot.items.len());
        for entry in &loot.items {
            let Some(item) = self.catalog.get(entry.item_id) else {
                warn!("Dropping unknown loot item {}", entry.item_id);
                continue;
            };
            let amount = player.add_item(item, entry.amount);
            if amount < entry.amount {
                warn!("Inventory full for {user_id}, {} x{} not stored", item.id, entry.amount - amount);
            }
            added.push((item.id, amount));
        }
        self.write_unlocked(user_id, &player).await?;

        let (profile, xp) = self.add_xp_unlocked(user_id, activity, loot.xp).await?;
        Ok(LootReceipt { added, xp, profile })
    }

    async fn add_xp_unlocked(
        &self,
        user_id: &str,
        activity: Activity,
        amount: u64,
    ) -> Result<(ResourceProfile, XpGain)> {
        let (profile, gain) = self
            .update_resource_unlocked(user_id, activity, |profile| profile.add_xp(amount))
            .await?;
        self.sync_token_unlocked(user_id, activity, &profile).await?;
        Ok((profile, gain))
    }

    async fn update_resource_unlocked<R, F>(
        &self,
        user_id: &str,
        activity: Activity,
        mutate: F,
    ) -> Result<(ResourceProfile, R)>
    where
        F: FnOnce(&mut ResourceProfile) -> R + Send,
    {
        Ok(match activity {
            Activity::Dig => {
                let mut record: DigProfile = self.read_unlocked(user_id).await?;
                let result = mutate(&mut record.0);
                self.write_unlocked(user_id, &record).await?;
                (record.0, result)
            }
            Activity::Mine => {
                let mut record: MineProfile = self.read_unlocked(user_id).await?;
                let result = mutate(&mut record.0);
                self.write_unlocked(user_id, &record).await?;
                (record.0, result)
            }
        })
    }

    /// The token item always mirrors the unspent token count.
    async fn sync_token_unlocked(&self, user_id: &str, activity: Activity, profile: &ResourceProfile) -> Result<()> {
        let token = self
            .catalog
            .get(activity.token_item())
            .ok_or_else(|| Error::UnknownItem {
                id: activity.token_item().to_string(),
            })?;
        let mut player: PlayerProfile = self.read_unlocked(user_id).await?;
        if player.amount_of(token.id) != profile.upgrade_tokens() {
            player.set_item_amount(token, profile.upgrade_tokens());
            self.write_unlocked(user_id, &player).await?;
        }
        Ok(())
    }

    async fn read_unlocked<T: Record>(&self, user_id: &str) -> Result<T> {
        let Some(stored) = self.store.load(T::domain(), user_id).await? else {
            let record = T::fresh(&self.defaults);
            self.write_unlocked(user_id, &record).await?;
            return Ok(record);
        };
        let mut record: T = serde_json::from_value(stored.clone()).map_err(|e| Error::Serialization {
            message: format!("Invalid {} record for {user_id}: {e}", T::domain()),
        })?;
        record.normalize(&self.defaults);
        if serde_json::to_value(&record)? != stored {
            self.write_unlocked(user_id, &record).await?;
        }
        Ok(record)
    }

    async fn write_unlocked<T: Record>(&self, user_id: &str, record: &T) -> Result<()> {
        let value = serde_json::to_value(record)?;
        self.store.save(T::domain(), user_id, value).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::loot::LootItem;
    use crate::test_utils::{memory_profiles, temp_json_store};
    use serde_json::json;

    #[tokio::test]
    async fn test_read_creates_and_persists_defaults() -> Result<()> {
        let (_dir, store) = temp_json_store();
        let store: Arc<dyn ProfileStore> = Arc::new(store);
        let profiles = Profiles::new(
            Arc::clone(&store),
            Arc::new(Catalog::builtin()),
            RecordDefaults { inventory_capacity: 12 },
        );

        let player: PlayerProfile = profiles.read("42").await?;
        assert_eq!(player.inventory_capacity, 12);
        assert!(store.load(Domain::Player, "42").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_read_normalises_stored_record() -> Result<()> {
        let (_dir, store) = temp_json_store();
        store
            .save(Domain::Dig, "7", json!({"level": 500, "xp": 12, "upgrade_tokens_used": 2}))
            .await?;
        let profiles = Profiles::new(
            Arc::new(store),
            Arc::new(Catalog::builtin()),
            RecordDefaults { inventory_capacity: 50 },
        );

        let dig = profiles.resource("7", Activity::Dig).await?;
        assert_eq!((dig.level, dig.xp), (100, 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_commit_loot_updates_inventory_xp_and_tokens() -> Result<()> {
        let profiles = memory_profiles().await?;
        let loot = LootOutcome {
            tier: crate::core::loot::NORMAL_TIER,
            items: vec![
                LootItem { item_id: "ITDirt", amount: 1 },
                LootItem { item_id: "ITBone", amount: 1 },
            ],
            xp: 260,
        };

        let receipt = profiles.commit_loot("1", Activity::Dig, &loot).await?;
        assert_eq!(receipt.added, vec![("ITDirt", 1), ("ITBone", 1)]);
        assert_eq!(receipt.profile.level, 2);
        assert_eq!(receipt.xp.levels_gained, 2);

        let player: PlayerProfile = profiles.read("1").await?;
        assert_eq!(player.amount_of("ITDirt"), 1);
        assert_eq!(player.amount_of("ITDigUpgradeToken"), 2);
        assert_eq!(player.amount_of("ITMineUpgradeToken"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() -> Result<()> {
        let profiles = Arc::new(memory_profiles().await?);
        let mut handles = Vec::new();
        for _ in 0..20 {
            let profiles = Arc::clone(&profiles);
            handles.push(tokio::spawn(async move {
                profiles
                    .update("5", |wallet: &mut WalletStats| wallet.coins += 1)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap()?;
        }
        let wallet: WalletStats = profiles.read("5").await?;
        assert_eq!(wallet.coins, 20);
        assert_eq!(profiles.locked_users(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_entries_are_released_with_the_guard() -> Result<()> {
        let profiles = memory_profiles().await?;
        for user in ["1", "2", "3"] {
            profiles
                .update(user, |wallet: &mut WalletStats| wallet.coins += 1)
                .await?;
        }
        assert_eq!(profiles.locked_users(), 0);

        let guard = profiles.lock_user("1").await;
        assert_eq!(profiles.locked_users(), 1);
        drop(guard);
        assert_eq!(profiles.locked_users(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_skips_broken_records() -> Result<()> {
        let (_dir, store) = temp_json_store();
        store.save(Domain::Wallet, "1", json!({"coins": 5})).await?;
        store.save(Domain::Wallet, "2", json!({"coins": "lots"})).await?;
        let profiles = Profiles::new(
            Arc::new(store),
            Arc::new(Catalog::builtin()),
            RecordDefaults { inventory_capacity: 50 },
        );

        let wallets = profiles.list::<WalletStats>().await?;
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].1.coins, 5);
        Ok(())
    }
}
