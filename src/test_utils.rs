//! Shared test utilities for `LootBuddy`.
//!
//! Helpers for building stores and profile services with sensible defaults.

use crate::{
    core::{
        catalog::Catalog,
        profiles::{Profiles, RecordDefaults},
        store::{JsonFileStore, SqlProfileStore},
    },
    errors::Result,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tempfile::TempDir;

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// JSON store in a fresh temporary directory. Keep the `TempDir` alive for
/// the duration of the test.
#[allow(clippy::expect_used)]
pub fn temp_json_store() -> (TempDir, JsonFileStore) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = JsonFileStore::new(dir.path());
    (dir, store)
}

/// Profiles over the in-memory database with the built-in catalog.
pub async fn memory_profiles() -> Result<Profiles> {
    let db = setup_test_db().await?;
    Ok(Profiles::new(
        Arc::new(SqlProfileStore::new(db)),
        Arc::new(Catalog::builtin()),
        RecordDefaults::default(),
    ))
}

/// Profiles over a temporary JSON store. Suitable for paused-clock tests,
/// which the pooled database connection does not tolerate.
pub fn json_profiles() -> (TempDir, Profiles) {
    let (dir, store) = temp_json_store();
    let profiles = Profiles::new(
        Arc::new(store),
        Arc::new(Catalog::builtin()),
        RecordDefaults::default(),
    );
    (dir, profiles)
}

/// Routes `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
