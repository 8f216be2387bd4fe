//! Core business logic module
//!
//! This module contains the ledger and loan processing components:
//! - `traits` - Clock and reference-number source seams
//! - `ledger_store` - Locked account rows, journals and indexes
//! - `limit_policy` - Pure validation of money movements
//! - `numbering` - Unique reference and account number allocation
//! - `balance_mutator` - The only writer of balances and journals
//! - `solvency` - Usable bank funds and the bank position
//! - `loan_lifecycle` - Loan applications from submission to disbursement
//! - `transaction_service` - Authorized entry points for every operation
//! - `engine` - Replay of CSV commands against the service
//! - `batch_processor` - Customer-partitioned parallel replay

pub mod balance_mutator;
pub mod batch_processor;
pub mod engine;
pub mod ledger_store;
pub mod limit_policy;
pub mod loan_lifecycle;
pub mod numbering;
pub mod solvency;
pub mod traits;
pub mod transaction_service;

pub use balance_mutator::{BalanceMutator, Posting, Reversal};
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use engine::CommandEngine;
pub use ledger_store::LedgerStore;
pub use loan_lifecycle::{Disbursement, LoanApproval, LoanLifecycleController, ReviewDecision};
pub use solvency::{BankPosition, SolvencyCalculator};
pub use traits::{Clock, ManualClock, RandomReferences, ReferenceSource, SystemClock};
pub use transaction_service::TransactionService;
