//! Currency wallet and account-level progression.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::Error;

/// Highest account level.
pub const MAX_WALLET_LEVEL: u32 = 100;

/// XP needed to go from `level` to `level + 1`; `None` at the cap.
#[must_use]
pub fn wallet_level_requirement(level: u32) -> Option<u64> {
    if level >= MAX_WALLET_LEVEL {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let requirement = (100.0 * 1.25_f64.powi(i32::try_from(level).ok()?)).ceil() as u64;
    Some(requirement)
}

/// Currencies a wallet holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Everyday currency
    Coins,
    /// Premium currency
    Diamonds,
    /// Event currency
    Prismatic,
}

impl Currency {
    /// Every currency, in display order.
    pub const ALL: [Self; 3] = [Self::Coins, Self::Diamonds, Self::Prismatic];

    /// Lowercase name accepted by [`FromStr`].
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Coins => "coins",
            Self::Diamonds => "diamonds",
            Self::Prismatic => "prismatic",
        }
    }

    /// Emoji shown next to balances.
    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Coins => "🪙",
            Self::Diamonds => "💎",
            Self::Prismatic => "🌈",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Coins => "Coins",
            Self::Diamonds => "Diamonds",
            Self::Prismatic => "Prismatic",
        })
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coins" | "coin" => Ok(Self::Coins),
            "diamonds" | "diamond" => Ok(Self::Diamonds),
            "prismatic" => Ok(Self::Prismatic),
            other => Err(Error::InvalidInput {
                message: format!("Unknown currency `{other}`"),
            }),
        }
    }
}

/// Per-user wallet record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletStats {
    /// Account level
    pub level: u32,
    /// XP into the current level
    pub xp: u64,
    /// Coin balance
    pub coins: u64,
    /// Diamond balance
    pub diamonds: u64,
    /// Prismatic balance
    pub prismatic: u64,
}

/// Outcome of a currency change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyChange {
    /// Applied; carries the new balance
    Applied(u64),
    /// Rejected because the balance would drop below zero
    Insufficient {
        /// Balance before the attempt
        balance: u64,
    },
}

impl WalletStats {
    /// Clamps stored values back into range.
    pub fn normalize(&mut self) {
        if self.level >= MAX_WALLET_LEVEL {
            self.level = MAX_WALLET_LEVEL;
            self.xp = 0;
        }
    }

    /// Balance of `currency`.
    #[must_use]
    pub const fn balance(&self, currency: Currency) -> u64 {
        match currency {
            Currency::Coins => self.coins,
            Currency::Diamonds => self.diamonds,
            Currency::Prismatic => self.prismatic,
        }
    }

    fn balance_mut(&mut self, currency: Currency) -> &mut u64 {
        match currency {
            Currency::Coins => &mut self.coins,
            Currency::Diamonds => &mut self.diamonds,
            Currency::Prismatic => &mut self.prismatic,
        }
    }

    /// Adds `delta` (may be negative) to `currency`.
    pub fn add_currency(&mut self, currency: Currency, delta: i64) -> CurrencyChange {
        let balance = self.balance_mut(currency);
        let updated = if delta >= 0 {
            balance.checked_add(delta.unsigned_abs())
        } else {
            balance.checked_sub(delta.unsigned_abs())
        };
        match updated {
            Some(value) => {
                *balance = value;
                CurrencyChange::Applied(value)
            }
            None => CurrencyChange::Insufficient { balance: *balance },
        }
    }

    /// Adds account XP, levelling up as the requirement allows.
    pub fn add_xp(&mut self, amount: u64) {
        let mut remaining = amount;
        while remaining > 0 {
            let Some(requirement) = wallet_level_requirement(self.level) else {
                break;
            };
            let space = requirement.saturating_sub(self.xp);
            if remaining >= space {
                self.level += 1;
                self.xp = 0;
                remaining -= space;
            } else {
                self.xp += remaining;
                remaining = 0;
            }
        }
        self.normalize();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_wallet_requirement_curve() {
        assert_eq!(wallet_level_requirement(0), Some(100));
        assert_eq!(wallet_level_requirement(1), Some(125));
        assert_eq!(wallet_level_requirement(2), Some(157));
        assert_eq!(wallet_level_requirement(100), None);
    }

    #[test]
    fn test_add_currency_rejects_overdraw() {
        let mut wallet = WalletStats::default();
        assert_eq!(wallet.add_currency(Currency::Coins, 50), CurrencyChange::Applied(50));
        assert_eq!(
            wallet.add_currency(Currency::Coins, -80),
            CurrencyChange::Insufficient { balance: 50 }
        );
        assert_eq!(wallet.coins, 50);
        assert_eq!(wallet.add_currency(Currency::Coins, -50), CurrencyChange::Applied(0));
        assert_eq!(wallet.balance(Currency::Diamonds), 0);
    }

    #[test]
    fn test_wallet_xp_levels_up() {
        let mut wallet = WalletStats::default();
        wallet.add_xp(130);
        assert_eq!((wallet.level, wallet.xp), (1, 30));
        wallet.add_xp(95);
        assert_eq!((wallet.level, wallet.xp), (2, 0));
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!("Coins".parse::<Currency>().unwrap(), Currency::Coins);
        assert_eq!(" diamond ".parse::<Currency>().unwrap(), Currency::Diamonds);
        assert!("gold".parse::<Currency>().is_err());
    }
}
