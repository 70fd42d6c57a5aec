//! Core game logic, independent of Discord.
//!
//! Everything here is driven through plain method calls so it can be tested
//! without a gateway connection. The bot layer only translates interactions
//! into these calls and renders the resulting [`view::View`]s.

/// Gathering activities and their per-activity constants
pub mod activity;
/// Static item catalog
pub mod catalog;
/// Injectable time source
pub mod clock;
/// Component custom id encoding
pub mod custom_id;
/// Dig and mine session engine
pub mod gathering;
/// Bronze Coin Generator runs
pub mod generator;
/// Giveaway lifecycle and winner draws
pub mod giveaway;
/// Player inventory and equipment
pub mod inventory;
/// Timed item upgrades
pub mod item_upgrade;
/// Loot tables and rolls
pub mod loot;
/// Collector's Market sell lists and the Collector's Shop
pub mod market;
/// Pet collections
pub mod pets;
/// Screen builders
pub mod presenter;
/// Typed access to persisted profiles
pub mod profiles;
/// Level and XP curve
pub mod progression;
/// Injectable randomness
pub mod random;
/// Live gathering sessions and their timers
pub mod session;
/// Profile persistence backends
pub mod store;
/// Framework-independent message model
pub mod view;
/// Currencies and wallet records
pub mod wallet;
