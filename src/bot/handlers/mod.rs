//! Discord interaction handlers
//!
//! This module provides handlers for Discord interactions such as autocomplete,
//! button clicks and select menus.

/// Autocomplete handlers for item names and currencies
pub mod autocomplete;
/// Button and select menu routing
pub mod components;
