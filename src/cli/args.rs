use crate::config::{BankConfig, EngineConfig, LimitConfig, DEFAULT_REFERENCE_ATTEMPTS};
use crate::strategy::BatchConfig;
use crate::types::Currency;
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// Replay banking commands against an in-memory ledger
#[derive(Parser, Debug)]
#[command(name = "ledger-engine")]
#[command(about = "Replay account and loan commands against an in-memory ledger", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing replay commands
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Processing strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "sync",
        help = "Processing strategy: 'sync' for in-order replay or 'async' for per-customer parallel replay"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Worker threads for async replay (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Largest single withdrawal
    #[arg(long = "max-withdrawal", value_name = "AMOUNT", env = "LEDGER_MAX_WITHDRAWAL")]
    pub max_withdrawal: Option<Decimal>,

    /// Daily withdrawal cap per account; off unless set
    #[arg(long = "daily-limit", value_name = "AMOUNT", env = "LEDGER_DAILY_LIMIT")]
    pub daily_limit: Option<Decimal>,

    /// Bank starting capital
    #[arg(long = "initial-capital", value_name = "AMOUNT", env = "LEDGER_INITIAL_CAPITAL")]
    pub initial_capital: Option<Decimal>,

    /// Share of on-hand funds available for new loans
    #[arg(long = "reserve-ratio", value_name = "RATIO", env = "LEDGER_RESERVE_RATIO")]
    pub reserve_ratio: Option<Decimal>,

    /// Bank currency; default for requests and currency of loan accounts
    #[arg(long = "currency", value_name = "CODE", env = "LEDGER_CURRENCY")]
    pub currency: Option<Currency>,

    /// Longest wait for any ledger lock
    #[arg(long = "lock-timeout-ms", value_name = "MILLIS", env = "LEDGER_LOCK_TIMEOUT_MS")]
    pub lock_timeout_ms: Option<u64>,
}

/// Available processing strategies
#[derive(Clone, Debug, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create an EngineConfig from CLI arguments and `LEDGER_*` variables
    ///
    /// Unset options keep their defaults; invalid values are logged and
    /// replaced by defaults.
    pub fn to_engine_config(&self) -> EngineConfig {
        let default = EngineConfig::default();

        let limits = LimitConfig::new(
            self.max_withdrawal
                .unwrap_or(default.limits.max_withdrawal),
            self.daily_limit,
        );
        let bank = BankConfig::new(
            self.initial_capital
                .unwrap_or(default.bank.initial_capital),
            self.reserve_ratio.unwrap_or(default.bank.reserve_ratio),
            self.currency.clone().unwrap_or(default.bank.currency),
        );
        let lock_timeout = self
            .lock_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(default.lock_timeout);

        EngineConfig::new(limits, bank, lock_timeout, DEFAULT_REFERENCE_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_MAX_WITHDRAWAL, DEFAULT_RESERVE_RATIO};
    use rstest::rstest;

    #[rstest]
    #[case::default_strategy(&["program", "input.csv"], StrategyType::Sync)]
    #[case::explicit_sync(&["program", "--strategy", "sync", "input.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "--strategy", "async", "input.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        match (&parsed.strategy, &expected) {
            (StrategyType::Sync, StrategyType::Sync) => (),
            (StrategyType::Async, StrategyType::Async) => (),
            _ => panic!("Expected {:?}, got {:?}", expected, parsed.strategy),
        }
    }

    #[rstest]
    #[case::all_defaults(&["program", "input.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "--batch-size", "2000", "input.csv"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["program", "--max-concurrent", "8", "input.csv"], 1000, 8)]
    #[case::zero_batch_size(&["program", "--batch-size", "0", "input.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_batch_config();

        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[test]
    fn test_engine_config_from_options() {
        let parsed = CliArgs::try_parse_from([
            "program",
            "--max-withdrawal",
            "500.00",
            "--daily-limit",
            "1000",
            "--initial-capital",
            "1000000",
            "--reserve-ratio",
            "0.5",
            "--currency",
            "eur",
            "--lock-timeout-ms",
            "250",
            "input.csv",
        ])
        .unwrap();

        let config = parsed.to_engine_config();

        assert_eq!(config.limits.max_withdrawal, Decimal::new(50000, 2));
        assert_eq!(config.limits.daily_withdrawal_cap, Some(Decimal::new(1000, 0)));
        assert_eq!(config.bank.initial_capital, Decimal::new(1000000, 0));
        assert_eq!(config.bank.reserve_ratio, Decimal::new(5, 1));
        assert_eq!(config.bank.currency.as_str(), "EUR");
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_engine_config_invalid_values_fall_back() {
        let parsed = CliArgs::try_parse_from([
            "program",
            "--max-withdrawal",
            "0",
            "--reserve-ratio",
            "1.5",
            "input.csv",
        ])
        .unwrap();

        let config = parsed.to_engine_config();

        assert_eq!(config.limits.max_withdrawal, DEFAULT_MAX_WITHDRAWAL);
        assert_eq!(config.bank.reserve_ratio, DEFAULT_RESERVE_RATIO);
    }

    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::invalid_strategy(&["program", "--strategy", "invalid", "input.csv"])]
    #[case::invalid_currency(&["program", "--currency", "DOLLAR", "input.csv"])]
    #[case::invalid_amount(&["program", "--max-withdrawal", "lots", "input.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
