//! Error types for the ledger engine
//!
//! Every failure the engine can report is a variant of [`LedgerError`].
//! Business-rule failures are terminal for the request that caused them and
//! carry enough context to correct the input. [`LedgerError::Contention`] and
//! [`LedgerError::ReferenceCollision`] are transient: the request may simply be
//! retried.
//!
//! # Error Categories
//!
//! - **Lookup**: account, transaction or loan application not found
//! - **Limit policy**: inactive account, wrong type, currency, amount, limits, funds
//! - **Lifecycle**: duplicate active account, loan state conflicts, bank funds
//! - **Access**: principal may not act on the target
//! - **Transient**: lock-wait timeout, reference number exhaustion

use super::account::{AccountId, AccountStatus, AccountType, Currency, CustomerId};
use super::loan::{LoanApplicationId, LoanStatus};
use super::transaction::TransactionId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the ledger engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("Account {account} not found")]
    AccountNotFound { account: AccountId },

    /// The account is not ACTIVE
    #[error("Account {account} with status {status} cannot perform transactions")]
    AccountInactive {
        account: AccountId,
        status: AccountStatus,
    },

    /// Operation applied to the wrong kind of account
    #[error("Invalid account type for {operation}: expected {expected}, got {actual}")]
    InvalidAccountType {
        operation: String,
        expected: AccountType,
        actual: AccountType,
    },

    #[error("Currency mismatch: account currency is {expected}, got {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    /// Non-positive amount or more than two fractional digits
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Decimal, reason: String },

    /// Withdrawal would overdraw the account
    ///
    /// Carries the current balance so the caller can correct the request.
    #[error("Insufficient funds: available {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    /// Single withdrawal above the per-transaction maximum
    #[error("Withdrawal amount {requested} exceeds maximum limit of {limit}")]
    TransactionLimitExceeded { limit: Decimal, requested: Decimal },

    /// Withdrawal would push today's total above the daily cap
    #[error("Daily withdrawal limit exceeded: limit {limit}, already withdrawn today {withdrawn_today}, requested {requested}")]
    DailyLimitExceeded {
        limit: Decimal,
        withdrawn_today: Decimal,
        requested: Decimal,
    },

    /// Customer already holds an ACTIVE account of some type
    #[error("Customer {customer} already has an active {account_type} account")]
    DuplicateActiveAccount {
        customer: CustomerId,
        account_type: AccountType,
    },

    /// Customer holds no ACTIVE account to address
    #[error("Customer {customer} has no active account")]
    NoActiveAccount { customer: CustomerId },

    #[error("Customer {customer} already has a pending loan application")]
    DuplicatePendingApplication { customer: CustomerId },

    /// Bank reserves cannot cover the loan at this moment
    ///
    /// The application stays APPROVED and may be retried later.
    #[error("Insufficient bank funds: available {available}, requested {requested}")]
    InsufficientBankFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Payment {requested} exceeds outstanding loan balance {outstanding}")]
    PaymentExceedsBalance {
        outstanding: Decimal,
        requested: Decimal,
    },

    #[error("Cannot close account {account} with non-zero balance {balance}")]
    NonZeroBalance { account: AccountId, balance: Decimal },

    /// Principal does not own the target or lacks the admin role
    #[error("Not authorized to {operation}")]
    Unauthorized { operation: String },

    /// Customer has never applied for a loan
    #[error("Customer {customer} has no loan application")]
    NoLoanApplication { customer: CustomerId },

    #[error("Loan application {application} not found")]
    LoanApplicationNotFound { application: LoanApplicationId },

    /// Requested transition is not legal from the current state
    #[error("Loan application {application} with status {status} cannot be {operation}")]
    LoanStateConflict {
        application: LoanApplicationId,
        status: LoanStatus,
        operation: String,
    },

    #[error("Invalid loan terms: {reason}")]
    InvalidLoanTerms { reason: String },

    #[error("Transaction {transaction} not found")]
    TransactionNotFound { transaction: TransactionId },

    #[error("Transaction {transaction} cannot be reversed: {reason}")]
    NotReversible {
        transaction: TransactionId,
        reason: String,
    },

    #[error("Invalid currency code '{code}'")]
    InvalidCurrency { code: String },

    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow { operation: String },

    /// Replay command lacks a column its type needs
    #[error("{command} command for customer {customer} is missing {field}")]
    IncompleteCommand {
        command: String,
        customer: CustomerId,
        field: String,
    },

    /// Lock wait timed out; retryable
    #[error("Timed out waiting for lock on {resource}")]
    Contention { resource: String },

    /// No unique reference number could be allocated; retryable
    #[error("Could not allocate a unique reference number after {attempts} attempts")]
    ReferenceCollision { attempts: usize },
}

impl LedgerError {
    /// Whether the caller should retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Contention { .. } | LedgerError::ReferenceCollision { .. }
        )
    }
}

// Helper functions for creating common errors

impl LedgerError {
    pub fn account_not_found(account: AccountId) -> Self {
        LedgerError::AccountNotFound { account }
    }

    pub fn account_inactive(account: AccountId, status: AccountStatus) -> Self {
        LedgerError::AccountInactive { account, status }
    }

    pub fn invalid_account_type(
        operation: &str,
        expected: AccountType,
        actual: AccountType,
    ) -> Self {
        LedgerError::InvalidAccountType {
            operation: operation.to_string(),
            expected,
            actual,
        }
    }

    pub fn currency_mismatch(expected: &Currency, actual: &Currency) -> Self {
        LedgerError::CurrencyMismatch {
            expected: expected.clone(),
            actual: actual.clone(),
        }
    }

    pub fn invalid_amount(amount: Decimal, reason: &str) -> Self {
        LedgerError::InvalidAmount {
            amount,
            reason: reason.to_string(),
        }
    }

    pub fn insufficient_funds(balance: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds { balance, requested }
    }

    pub fn duplicate_active_account(customer: CustomerId, account_type: AccountType) -> Self {
        LedgerError::DuplicateActiveAccount {
            customer,
            account_type,
        }
    }

    pub fn insufficient_bank_funds(available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientBankFunds {
            available,
            requested,
        }
    }

    pub fn unauthorized(operation: &str) -> Self {
        LedgerError::Unauthorized {
            operation: operation.to_string(),
        }
    }

    pub fn loan_state_conflict(
        application: LoanApplicationId,
        status: LoanStatus,
        operation: &str,
    ) -> Self {
        LedgerError::LoanStateConflict {
            application,
            status,
            operation: operation.to_string(),
        }
    }

    pub fn invalid_loan_terms(reason: &str) -> Self {
        LedgerError::InvalidLoanTerms {
            reason: reason.to_string(),
        }
    }

    pub fn not_reversible(transaction: TransactionId, reason: &str) -> Self {
        LedgerError::NotReversible {
            transaction,
            reason: reason.to_string(),
        }
    }

    pub fn invalid_currency(code: &str) -> Self {
        LedgerError::InvalidCurrency {
            code: code.to_string(),
        }
    }

    pub fn arithmetic_overflow(operation: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    pub fn incomplete_command(command: &str, customer: CustomerId, field: &str) -> Self {
        LedgerError::IncompleteCommand {
            command: command.to_string(),
            customer,
            field: field.to_string(),
        }
    }

    pub fn contention(resource: impl Into<String>) -> Self {
        LedgerError::Contention {
            resource: resource.into(),
        }
    }
}
