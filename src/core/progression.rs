//! Dig and mine progression.
//!
//! Both activities share the same [`ResourceProfile`] shape and level curve.

use serde::{Deserialize, Serialize};

/// Highest reachable activity level.
pub const MAX_LEVEL: u32 = 100;

/// XP needed to go from `level` to `level + 1`.
#[must_use]
pub const fn next_level_requirement(level: u32) -> u64 {
    let capped = if level > 99 { 99 } else { level };
    100 + capped as u64 * 50
}

/// Persistent level/XP record for one activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceProfile {
    /// Current level, `0..=100`
    pub level: u32,
    /// XP into the current level
    pub xp: u64,
    /// Upgrade tokens already spent
    pub upgrade_tokens_used: u32,
}

/// Result of an XP award.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpGain {
    /// XP actually added
    pub gained: u64,
    /// Levels crossed by this award
    pub levels_gained: u32,
}

impl ResourceProfile {
    /// Clamps stored values back into range.
    pub fn normalize(&mut self) {
        self.level = self.level.min(MAX_LEVEL);
        if self.level == MAX_LEVEL {
            self.xp = 0;
        } else {
            let requirement = next_level_requirement(self.level);
            if self.xp >= requirement {
                // Stored data predates a curve change; resolve pending level-ups.
                self.add_xp(0);
            }
        }
    }

    /// XP needed for the next level.
    #[must_use]
    pub const fn next_level_requirement(&self) -> u64 {
        next_level_requirement(self.level)
    }

    /// Unspent upgrade tokens, one per level.
    #[must_use]
    pub const fn upgrade_tokens(&self) -> u32 {
        self.level.saturating_sub(self.upgrade_tokens_used)
    }

    /// Adds XP and applies every level-up it pays for.
    ///
    /// At [`MAX_LEVEL`] XP is pinned to 0.
    pub fn add_xp(&mut self, amount: u64) -> XpGain {
        let start_level = self.level;
        self.xp = self.xp.saturating_add(amount);
        while self.level < MAX_LEVEL && self.xp >= next_level_requirement(self.level) {
            self.xp -= next_level_requirement(self.level);
            self.level += 1;
        }
        if self.level >= MAX_LEVEL {
            self.level = MAX_LEVEL;
            self.xp = 0;
        }
        XpGain {
            gained: amount,
            levels_gained: self.level - start_level,
        }
    }
}

/// Text progress bar of `width` cells.
#[must_use]
pub fn progress_bar(current: u64, total: u64, width: usize) -> String {
    let total = total.max(1);
    #[allow(clippy::cast_precision_loss)]
    let ratio = (current as f64 / total as f64).clamp(0.0, 1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = ((ratio * width as f64).round() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_curve() {
        assert_eq!(next_level_requirement(0), 100);
        assert_eq!(next_level_requirement(1), 150);
        assert_eq!(next_level_requirement(99), 5_050);
        assert_eq!(next_level_requirement(100), 5_050);
    }

    #[test]
    fn test_add_xp_carries_remainder_across_levels() {
        let mut profile = ResourceProfile::default();
        let gain = profile.add_xp(260);
        // 100 for level 0, 150 for level 1, 10 left over
        assert_eq!(gain.levels_gained, 2);
        assert_eq!(profile.level, 2);
        assert_eq!(profile.xp, 10);
        assert!(profile.xp < profile.next_level_requirement());
    }

    #[test]
    fn test_add_xp_stays_below_requirement() {
        let mut profile = ResourceProfile::default();
        for amount in [0, 7, 99, 1, 500, 3, 12_345] {
            profile.add_xp(amount);
            if profile.level < MAX_LEVEL {
                assert!(profile.xp < profile.next_level_requirement());
            }
        }
    }

    #[test]
    fn test_level_cap_pins_xp() {
        let mut profile = ResourceProfile::default();
        profile.add_xp(u64::MAX / 2);
        assert_eq!(profile.level, MAX_LEVEL);
        assert_eq!(profile.xp, 0);

        profile.add_xp(1_000);
        assert_eq!(profile.level, MAX_LEVEL);
        assert_eq!(profile.xp, 0);
    }

    #[test]
    fn test_upgrade_tokens_never_negative() {
        let mut profile = ResourceProfile {
            level: 3,
            xp: 0,
            upgrade_tokens_used: 1,
        };
        assert_eq!(profile.upgrade_tokens(), 2);
        profile.upgrade_tokens_used = 10;
        assert_eq!(profile.upgrade_tokens(), 0);
    }

    #[test]
    fn test_normalize_resolves_out_of_range_values() {
        let mut profile = ResourceProfile {
            level: 250,
            xp: 40,
            upgrade_tokens_used: 0,
        };
        profile.normalize();
        assert_eq!((profile.level, profile.xp), (MAX_LEVEL, 0));

        let mut stale = ResourceProfile {
            level: 0,
            xp: 120,
            upgrade_tokens_used: 0,
        };
        stale.normalize();
        assert_eq!((stale.level, stale.xp), (1, 20));
    }

    #[test]
    fn test_progress_bar_shape() {
        assert_eq!(progress_bar(0, 100, 4), "░░░░");
        assert_eq!(progress_bar(50, 100, 4), "██░░");
        assert_eq!(progress_bar(500, 100, 4), "████");
        assert_eq!(progress_bar(1, 0, 2), "██");
    }
}
