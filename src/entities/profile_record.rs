//! Profile record entity - One serialized profile per (domain, user).
//!
//! Each gameplay subsystem (player, dig, mine, wallet, generator) keeps its
//! per-user record as a JSON payload keyed by domain name and Discord user id.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Profile record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profile_records")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Profile domain (e.g., `"dig"`, `"wallet"`)
    pub domain: String,
    /// Discord user ID
    pub user_id: String,
    /// Profile serialized as JSON
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    /// When this record was last written
    pub updated_at: DateTime,
}

/// Profile records have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
