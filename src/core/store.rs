//! Profile persistence.
//!
//! Profiles are opaque JSON values keyed by `(domain, user_id)`. The
//! [`ProfileStore`] trait hides whether they live in flat JSON files or in the
//! `profile_records` table, so the typed [`Profiles`](super::profiles::Profiles)
//! service never touches the backend directly.

use crate::{
    entities::{ProfileRecord, profile_record},
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{DatabaseConnection, Set, prelude::*};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Persisted profile families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Inventory and equipment
    Player,
    /// Dig progression
    Dig,
    /// Mine progression
    Mine,
    /// Currency wallet
    Wallet,
    /// Generator state
    Generator,
    /// Collector's Market sell lists
    Market,
    /// Collector's Shop stock, one shared record
    Shop,
    /// Pet collections
    Pets,
}

impl Domain {
    /// Stable key used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Dig => "dig",
            Self::Mine => "mine",
            Self::Wallet => "wallet",
            Self::Generator => "generator",
            Self::Market => "market",
            Self::Shop => "shop",
            Self::Pets => "pets",
        }
    }

    /// File name used by [`JsonFileStore`].
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Player => "player_profiles.json",
            Self::Dig => "dig_profiles.json",
            Self::Mine => "mine_profiles.json",
            Self::Wallet => "user_stats.json",
            Self::Generator => "generators.json",
            Self::Market => "market_state.json",
            Self::Shop => "shop_state.json",
            Self::Pets => "pet_profiles.json",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value storage for serialized profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Loads the stored value for `user_id`, if any.
    async fn load(&self, domain: Domain, user_id: &str) -> Result<Option<Value>>;

    /// Replaces the stored value for `user_id`.
    async fn save(&self, domain: Domain, user_id: &str, value: Value) -> Result<()>;

    /// Every stored `(user_id, value)` pair in `domain`.
    async fn list(&self, domain: Domain) -> Result<Vec<(String, Value)>>;
}

/// One JSON file per domain, rewritten whole on every save.
#[derive(Debug)]
pub struct JsonFileStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Creates a store rooted at `data_dir`. The directory is created on first save.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, domain: Domain) -> PathBuf {
        self.data_dir.join(domain.file_name())
    }

    async fn read_all(path: &Path) -> Result<BTreeMap<String, Value>> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| Error::Serialization {
            message: format!("Failed to parse {}: {e}", path.display()),
        })
    }

    async fn write_all(path: &Path, records: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let content = serde_json::to_string(records)?;
        let tmp_path = path.with_extension(format!("json.tmp-{}", std::process::id()));
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for JsonFileStore {
    async fn load(&self, domain: Domain, user_id: &str) -> Result<Option<Value>> {
        let mut records = Self::read_all(&self.path_for(domain)).await?;
        Ok(records.remove(user_id))
    }

    #[instrument(skip(self, value))]
    async fn save(&self, domain: Domain, user_id: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(domain);
        let mut records = Self::read_all(&path).await?;
        records.insert(user_id.to_string(), value);
        Self::write_all(&path, &records).await?;
        debug!("Saved {domain} profile for {user_id}");
        Ok(())
    }

    async fn list(&self, domain: Domain) -> Result<Vec<(String, Value)>> {
        let records = Self::read_all(&self.path_for(domain)).await?;
        Ok(records.into_iter().collect())
    }
}

/// Profiles stored in the `profile_records` table.
#[derive(Debug, Clone)]
pub struct SqlProfileStore {
    db: DatabaseConnection,
}

impl SqlProfileStore {
    /// Wraps an open connection. Tables must already exist.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find(&self, domain: Domain, user_id: &str) -> Result<Option<profile_record::Model>> {
        ProfileRecord::find()
            .filter(profile_record::Column::Domain.eq(domain.as_str()))
            .filter(profile_record::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl ProfileStore for SqlProfileStore {
    async fn load(&self, domain: Domain, user_id: &str) -> Result<Option<Value>> {
        self.find(domain, user_id)
            .await?
            .map(|record| serde_json::from_str(&record.payload).map_err(Error::from))
            .transpose()
    }

    #[instrument(skip(self, value))]
    async fn save(&self, domain: Domain, user_id: &str, value: Value) -> Result<()> {
        let payload = serde_json::to_string(&value)?;
        let now = Utc::now().naive_utc();

        if let Some(record) = self.find(domain, user_id).await? {
            let mut active_model: profile_record::ActiveModel = record.into();
            active_model.payload = Set(payload);
            active_model.updated_at = Set(now);
            active_model.update(&self.db).await?;
        } else {
            let record = profile_record::ActiveModel {
                domain: Set(domain.as_str().to_string()),
                user_id: Set(user_id.to_string()),
                payload: Set(payload),
                updated_at: Set(now),
                ..Default::default()
            };
            record.insert(&self.db).await?;
        }
        Ok(())
    }

    async fn list(&self, domain: Domain) -> Result<Vec<(String, Value)>> {
        let records = ProfileRecord::find()
            .filter(profile_record::Column::Domain.eq(domain.as_str()))
            .all(&self.db)
            .await?;
        records
            .into_iter()
            .map(|record| -> Result<(String, Value)> {
                Ok((record.user_id, serde_json::from_str(&record.payload)?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{setup_test_db, temp_json_store};
    use serde_json::json;

    async fn exercise_store(store: &dyn ProfileStore) -> Result<()> {
        assert!(store.load(Domain::Dig, "1").await?.is_none());

        store.save(Domain::Dig, "1", json!({"level": 2})).await?;
        store.save(Domain::Mine, "1", json!({"level": 7})).await?;
        store.save(Domain::Dig, "1", json!({"level": 3})).await?;
        store.save(Domain::Dig, "2", json!({"level": 1})).await?;

        assert_eq!(store.load(Domain::Dig, "1").await?, Some(json!({"level": 3})));
        assert_eq!(store.load(Domain::Mine, "1").await?, Some(json!({"level": 7})));

        let mut all = store.list(Domain::Dig).await?;
        all.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(all.len(), 2);
        assert_eq!(all[1], ("2".to_string(), json!({"level": 1})));
        Ok(())
    }

    #[tokio::test]
    async fn test_json_file_store_round_trip() -> Result<()> {
        let (_dir, store) = temp_json_store();
        exercise_store(&store).await
    }

    #[tokio::test]
    async fn test_sql_store_round_trip() -> Result<()> {
        let db = setup_test_db().await?;
        let store = SqlProfileStore::new(db);
        exercise_store(&store).await
    }

    #[tokio::test]
    async fn test_json_file_store_rejects_corrupt_file() -> Result<()> {
        let (dir, store) = temp_json_store();
        tokio::fs::write(dir.path().join(Domain::Wallet.file_name()), "{not json").await?;

        let err = store.load(Domain::Wallet, "1").await.unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_json_file_store_leaves_no_temp_files() -> Result<()> {
        let (dir, store) = temp_json_store();
        store.save(Domain::Player, "9", json!({})).await?;

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec![Domain::Player.file_name().to_string()]);
        Ok(())
    }
}
