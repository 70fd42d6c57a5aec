//! Storage setup for `LootBuddy`.
//!
//! Opens the configured [`ProfileStore`]. For the `SQLite` backend the
//! `profile_records` table is created from the entity definition with
//! `Schema::create_table_from_entity`, so the schema always matches the model.

use super::{StorageBackend, StorageConfig};
use crate::core::store::{JsonFileStore, ProfileStore, SqlProfileStore};
use crate::entities::ProfileRecord;
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::sync::Arc;
use tracing::info;

/// Connects to `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates the `profile_records` table if it does not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut profile_table = schema.create_table_from_entity(ProfileRecord);
    profile_table.if_not_exists();

    db.execute(builder.build(&profile_table)).await?;
    Ok(())
}

/// Opens the store selected in `[storage]`.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn ProfileStore>> {
    match config.backend {
        StorageBackend::Json => {
            info!(data_dir = %config.data_dir.display(), "Using JSON profile store");
            Ok(Arc::new(JsonFileStore::new(config.data_dir.clone())))
        }
        StorageBackend::Sqlite => {
            let url = config.resolved_database_url();
            if let Some(path) = url
                .strip_prefix("sqlite://")
                .map(|rest| rest.split('?').next().unwrap_or(rest))
            {
                if let Some(dir) = std::path::Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(dir).await?;
                }
            }
            let db = create_connection(&url).await?;
            create_tables(&db).await?;
            info!("Using SQLite profile store");
            Ok(Arc::new(SqlProfileStore::new(db)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ProfileRecordModel;
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<ProfileRecordModel> = ProfileRecord::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_open_json_store() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = StorageConfig {
            data_dir: dir.path().to_path_buf(),
            ..StorageConfig::default()
        };
        let store = open_store(&config).await?;
        assert!(store.load(crate::core::store::Domain::Wallet, "1").await?.is_none());
        Ok(())
    }
}
