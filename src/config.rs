//! Engine configuration
//!
//! All limits and bank parameters are plain values built once at start-up
//! and injected into the engine at construction. Nothing here is re-read per
//! call.
//!
//! Invalid values never abort start-up: each constructor logs a warning and
//! falls back to the default for the offending field.

use crate::types::Currency;
use rust_decimal::Decimal;
use std::time::Duration;

/// Default maximum for a single withdrawal: 10,000.00
pub const DEFAULT_MAX_WITHDRAWAL: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 2);

/// Default daily withdrawal cap when the rule is switched on: 50,000.00
pub const DEFAULT_DAILY_WITHDRAWAL_CAP: Decimal = Decimal::from_parts(5_000_000, 0, 0, false, 2);

/// Default bank starting capital: 250,000.00
pub const DEFAULT_INITIAL_CAPITAL: Decimal = Decimal::from_parts(25_000_000, 0, 0, false, 2);

/// Default share of on-hand funds usable for new loans: 0.25
pub const DEFAULT_RESERVE_RATIO: Decimal = Decimal::from_parts(25, 0, 0, false, 2);

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

pub const DEFAULT_REFERENCE_ATTEMPTS: usize = 5;

/// Per-transaction and per-day withdrawal rules
#[derive(Debug, Clone, PartialEq)]
pub struct LimitConfig {
    /// Largest single withdrawal accepted
    pub max_withdrawal: Decimal,

    /// Daily aggregate cap; `None` disables the rule
    pub daily_withdrawal_cap: Option<Decimal>,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_withdrawal: DEFAULT_MAX_WITHDRAWAL,
            daily_withdrawal_cap: None,
        }
    }
}

impl LimitConfig {
    pub fn new(max_withdrawal: Decimal, daily_withdrawal_cap: Option<Decimal>) -> Self {
        let max_withdrawal = if max_withdrawal <= Decimal::ZERO {
            tracing::warn!(
                %max_withdrawal,
                default = %DEFAULT_MAX_WITHDRAWAL,
                "Invalid max_withdrawal, using default"
            );
            DEFAULT_MAX_WITHDRAWAL
        } else {
            max_withdrawal
        };

        let daily_withdrawal_cap = match daily_withdrawal_cap {
            Some(cap) if cap <= Decimal::ZERO => {
                tracing::warn!(%cap, "Invalid daily withdrawal cap, disabling the rule");
                None
            }
            other => other,
        };

        Self {
            max_withdrawal,
            daily_withdrawal_cap,
        }
    }

    /// Switch on the daily cap with its default value
    pub fn with_default_daily_cap(mut self) -> Self {
        self.daily_withdrawal_cap = Some(DEFAULT_DAILY_WITHDRAWAL_CAP);
        self
    }
}

/// Bank balance-sheet parameters used by the solvency calculator
#[derive(Debug, Clone, PartialEq)]
pub struct BankConfig {
    pub initial_capital: Decimal,

    /// Fraction of on-hand funds available for new loan disbursements
    pub reserve_ratio: Decimal,

    /// Currency of loan accounts
    pub currency: Currency,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            reserve_ratio: DEFAULT_RESERVE_RATIO,
            currency: Currency::usd(),
        }
    }
}

impl BankConfig {
    pub fn new(initial_capital: Decimal, reserve_ratio: Decimal, currency: Currency) -> Self {
        let initial_capital = if initial_capital < Decimal::ZERO {
            tracing::warn!(
                %initial_capital,
                default = %DEFAULT_INITIAL_CAPITAL,
                "Invalid initial_capital, using default"
            );
            DEFAULT_INITIAL_CAPITAL
        } else {
            initial_capital
        };

        let reserve_ratio = if reserve_ratio <= Decimal::ZERO || reserve_ratio > Decimal::ONE {
            tracing::warn!(
                %reserve_ratio,
                default = %DEFAULT_RESERVE_RATIO,
                "Invalid reserve_ratio, using default"
            );
            DEFAULT_RESERVE_RATIO
        } else {
            reserve_ratio
        };

        Self {
            initial_capital,
            reserve_ratio,
            currency,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub limits: LimitConfig,
    pub bank: BankConfig,

    /// Longest a request waits for any row lock or the ledger gate
    pub lock_timeout: Duration,

    /// Reference-number draws before giving up with `ReferenceCollision`
    pub reference_attempts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: LimitConfig::default(),
            bank: BankConfig::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            reference_attempts: DEFAULT_REFERENCE_ATTEMPTS,
        }
    }
}

impl EngineConfig {
    pub fn new(
        limits: LimitConfig,
        bank: BankConfig,
        lock_timeout: Duration,
        reference_attempts: usize,
    ) -> Self {
        let lock_timeout = if lock_timeout.is_zero() {
            tracing::warn!(
                default_ms = DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
                "Invalid lock_timeout (0), using default"
            );
            DEFAULT_LOCK_TIMEOUT
        } else {
            lock_timeout
        };

        let reference_attempts = if reference_attempts == 0 {
            tracing::warn!(
                default = DEFAULT_REFERENCE_ATTEMPTS,
                "Invalid reference_attempts (0), using default"
            );
            DEFAULT_REFERENCE_ATTEMPTS
        } else {
            reference_attempts
        };

        Self {
            limits,
            bank,
            lock_timeout,
            reference_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_match_bank_policy() {
        let config = EngineConfig::default();

        assert_eq!(config.limits.max_withdrawal, Decimal::new(1000000, 2));
        assert_eq!(config.limits.daily_withdrawal_cap, None);
        assert_eq!(config.bank.initial_capital, Decimal::new(25000000, 2));
        assert_eq!(config.bank.reserve_ratio, Decimal::new(25, 2));
        assert_eq!(config.bank.currency, Currency::usd());
        assert_eq!(config.reference_attempts, 5);
    }

    #[test]
    fn test_default_daily_cap() {
        let limits = LimitConfig::default().with_default_daily_cap();
        assert_eq!(limits.daily_withdrawal_cap, Some(Decimal::new(5000000, 2)));
    }

    #[rstest]
    #[case::zero(Decimal::ZERO)]
    #[case::negative(Decimal::new(-100, 0))]
    fn test_invalid_max_withdrawal_falls_back(#[case] value: Decimal) {
        let limits = LimitConfig::new(value, None);
        assert_eq!(limits.max_withdrawal, DEFAULT_MAX_WITHDRAWAL);
    }

    #[test]
    fn test_non_positive_daily_cap_disables_rule() {
        let limits = LimitConfig::new(Decimal::new(500, 0), Some(Decimal::ZERO));
        assert_eq!(limits.max_withdrawal, Decimal::new(500, 0));
        assert_eq!(limits.daily_withdrawal_cap, None);
    }

    #[rstest]
    #[case::zero(Decimal::ZERO, DEFAULT_RESERVE_RATIO)]
    #[case::above_one(Decimal::new(15, 1), DEFAULT_RESERVE_RATIO)]
    #[case::one(Decimal::ONE, Decimal::ONE)]
    #[case::half(Decimal::new(5, 1), Decimal::new(5, 1))]
    fn test_reserve_ratio_bounds(#[case] ratio: Decimal, #[case] expected: Decimal) {
        let bank = BankConfig::new(DEFAULT_INITIAL_CAPITAL, ratio, Currency::usd());
        assert_eq!(bank.reserve_ratio, expected);
    }

    #[test]
    fn test_zero_timeouts_and_attempts_fall_back() {
        let config = EngineConfig::new(
            LimitConfig::default(),
            BankConfig::default(),
            Duration::ZERO,
            0,
        );

        assert_eq!(config.lock_timeout, DEFAULT_LOCK_TIMEOUT);
        assert_eq!(config.reference_attempts, DEFAULT_REFERENCE_ATTEMPTS);
    }
}
