//! Types module
//!
//! Contains the core data structures used throughout the engine:
//! - `account`: accounts, identifiers and currency codes
//! - `command`: replay commands read from CSV
//! - `transaction`: ledger entries and history filters
//! - `loan`: loan applications and their tagged lifecycle state
//! - `principal`: the authenticated caller
//! - `error`: the engine's error type

pub mod account;
pub mod command;
pub mod error;
pub mod loan;
pub mod principal;
pub mod transaction;

pub use account::{Account, AccountId, AccountStatus, AccountType, Currency, CustomerId};
pub use command::{CommandKind, CommandRecord};
pub use error::LedgerError;
pub use loan::{
    Approved, Cancelled, Disbursed, LoanApplication, LoanApplicationId, LoanState, LoanStatus,
    LoanTerms, Pending, Rejected,
};
pub use principal::{Principal, Role};
pub use transaction::{
    Page, Transaction, TransactionFilter, TransactionId, TransactionMetadata, TransactionStatus,
    TransactionType,
};
