//! Gathering activities and their fixed parameters.

use crate::core::store::Domain;
use std::fmt;

/// A resource-gathering mini-game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Activity {
    /// Digging through dirt layers
    Dig,
    /// Mining through rock layers
    Mine,
}

impl Activity {
    /// Both activities.
    pub const ALL: [Self; 2] = [Self::Dig, Self::Mine];

    /// Lowercase name, also the custom id prefix and gear tag.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Dig => "dig",
            Self::Mine => "mine",
        }
    }

    /// Parses [`Activity::key`].
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|activity| activity.key() == key)
    }

    /// Storage domain of the progression profile.
    #[must_use]
    pub const fn domain(self) -> Domain {
        match self {
            Self::Dig => Domain::Dig,
            Self::Mine => Domain::Mine,
        }
    }

    /// Item awarded once per normal layer.
    #[must_use]
    pub const fn base_item(self) -> &'static str {
        match self {
            Self::Dig => "ITDirt",
            Self::Mine => "ITStone",
        }
    }

    /// Inclusive XP range of a normal layer before secondary drops.
    #[must_use]
    pub const fn base_xp(self) -> (f64, f64) {
        match self {
            Self::Dig => (5.0, 10.0),
            Self::Mine => (5.0, 12.0),
        }
    }

    /// Item mirroring the unspent upgrade token count.
    #[must_use]
    pub const fn token_item(self) -> &'static str {
        match self {
            Self::Dig => "ITDigUpgradeToken",
            Self::Mine => "ITMineUpgradeToken",
        }
    }

    /// Health pool of `layer`.
    ///
    /// Dig grows by 5 every second layer, mine by 5 every layer.
    #[must_use]
    pub fn max_health(self, layer: i64) -> i64 {
        let layer = layer.max(0);
        match self {
            Self::Dig => 10 + (layer / 2) * 5,
            Self::Mine => 10 + layer * 5,
        }
    }

    /// Verb shown on the swing button.
    #[must_use]
    pub const fn swing_label(self) -> &'static str {
        match self {
            Self::Dig => "Dig",
            Self::Mine => "Mine",
        }
    }

    /// Emoji shown on buttons and headers.
    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Dig => "🪏",
            Self::Mine => "⛏️",
        }
    }

    /// Accent colour of the activity's views.
    #[must_use]
    pub const fn accent_color(self) -> u32 {
        match self {
            Self::Dig => 0x8B_5A2B,
            Self::Mine => 0x70_7B8C,
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.swing_label())
    }
}
