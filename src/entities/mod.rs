//! Entity module - Contains the SeaORM entity definitions for the database.
//! Profiles are stored as JSON payloads, so a single table backs every domain.

pub mod profile_record;

pub use profile_record::{
    Column as ProfileRecordColumn, Entity as ProfileRecord, Model as ProfileRecordModel,
};
