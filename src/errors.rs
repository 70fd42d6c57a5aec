//! Unified error types for `LootBuddy`.
//!
//! Expected game conditions (no active session, nothing to claim, cooldowns) are
//! modelled as ordinary outcome enums in `core`. Only genuinely unexpected
//! failures travel through this type.

use thiserror::Error;

/// Errors that can occur anywhere in the bot.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human readable description
        message: String,
    },

    /// Backing database reported an error
    #[error("Database error: {0}")]
    Database(String),

    /// A stored record could not be (de)serialized
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human readable description
        message: String,
    },

    /// Filesystem access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Required environment variable missing
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// An item identifier does not exist in the catalog
    #[error("Unknown item: {id}")]
    UnknownItem {
        /// The identifier that failed to resolve
        id: String,
    },

    /// User supplied input failed validation
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Message suitable for showing to the user
        message: String,
    },

    /// Formatting a response failed
    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),

    /// Serenity/Poise framework error
    #[error("Serenity/Poise framework error: {0}")]
    #[allow(clippy::enum_variant_names)]
    FrameworkError(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::FrameworkError(Box::new(value))
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(value: sea_orm::DbErr) -> Self {
        Self::Database(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            message: value.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
