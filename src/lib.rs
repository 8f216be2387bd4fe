//! Ledger Engine Library
//! # Overview
//!
//! An in-memory retail banking ledger: checking accounts, an immutable
//! transaction journal, and the loan lifecycle from application to payoff,
//! with bank-wide solvency checks gating every disbursement. Commands can be
//! replayed from CSV with a sync or an async strategy.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Account, Transaction, LoanApplication, etc.)
//! - [`config`] - Withdrawal limits, bank parameters and lock timeouts
//! - [`core`] - Business logic components:
//!   - [`core::transaction_service`] - Authorized entry points for every operation
//!   - [`core::balance_mutator`] - The single writer of balances and journals
//!   - [`core::loan_lifecycle`] - Loan applications and their state machine
//!   - [`core::solvency`] - Usable bank funds
//!   - [`core::engine`] - CSV command replay
//! - [`io`] - CSV input and output
//! - [`strategy`] - Sync and async replay pipelines
//! - [`cli`] - CLI arguments parsing
//!
//! # Balances
//!
//! Checking balances are never negative. A loan account's balance is the
//! negated outstanding principal: a 5,000 loan starts at -5,000.00 and
//! closes itself when payments bring it to zero.
//!
//! # Concurrency
//!
//! All operations take `&self`. Money movements on different accounts run in
//! parallel; solvency reads and disbursements see a consistent ledger.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use config::{BankConfig, EngineConfig, LimitConfig};
pub use core::{CommandEngine, TransactionService};
pub use io::write_accounts_csv;
pub use types::{
    Account, AccountId, CommandKind, CommandRecord, Currency, CustomerId, LedgerError,
    LoanApplication, LoanStatus, Principal, Transaction, TransactionType,
};
