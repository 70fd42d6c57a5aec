//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Gathering commands
pub mod gathering;

/// General utility commands
pub mod general;

/// Bronze Coin Generator commands
pub mod generator;

/// Giveaway commands
pub mod giveaway;

/// Inventory and item lookup commands
pub mod inventory;

/// Collector's Market and Shop commands
pub mod market;

/// Pet collection commands
pub mod pets;

/// Item upgrade commands
pub mod upgrades;

/// Wallet commands
pub mod wallet;

// Export commands
pub use gathering::*;
pub use general::*;
pub use generator::*;
pub use giveaway::*;
pub use inventory::*;
pub use market::*;
pub use pets::*;
pub use upgrades::*;
pub use wallet::*;
