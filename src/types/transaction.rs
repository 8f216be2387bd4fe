//! Transaction-related types for the ledger engine
//!
//! This module defines transaction records, their types and statuses, and the
//! filter used when listing an account's history.

use super::account::{AccountId, Currency};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Creates a new random `TransactionId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Money movements recorded by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Credit a checking account
    Deposit,

    /// Debit a checking account; never below zero
    Withdrawal,

    /// Principal leaving the bank into a freshly created loan account
    LoanDisbursement,

    /// Repayment moving a loan balance toward zero
    LoanPayment,
}

impl TransactionType {
    /// Sign applied to the amount when posting to the account balance
    ///
    /// Deposits and loan payments credit the account; withdrawals and
    /// disbursements debit it.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            TransactionType::Deposit | TransactionType::LoanPayment => amount,
            TransactionType::Withdrawal | TransactionType::LoanDisbursement => -amount,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::LoanDisbursement => "LOAN_DISBURSEMENT",
            TransactionType::LoanPayment => "LOAN_PAYMENT",
        };
        f.write_str(name)
    }
}

/// Transaction status
///
/// The engine only ever persists COMPLETED rows (a failed movement leaves no
/// row behind) and flips COMPLETED to REVERSED when a compensating entry is
/// posted. PENDING and FAILED exist for records imported from elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Reversed => "REVERSED",
        };
        f.write_str(name)
    }
}

/// Ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,

    pub account: AccountId,

    pub tx_type: TransactionType,

    /// Always positive; the direction comes from `tx_type`
    pub amount: Decimal,

    pub currency: Currency,

    /// Account balance immediately after this entry was applied
    pub balance_after: Decimal,

    pub status: TransactionStatus,

    /// Unique `TXN-YYYYMMDD-XXXXXX` reference
    pub reference: String,

    pub description: Option<String>,

    /// The entry this one compensates, for reversal offsets
    pub reverses: Option<TransactionId>,

    pub created_at: DateTime<Utc>,

    pub processed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Signed effect of this entry on its account's balance
    pub fn signed_amount(&self) -> Decimal {
        self.tx_type.signed(self.amount)
    }

    /// Whether the entry's effect is part of the ledger
    ///
    /// A REVERSED entry still had its effect; the compensating entry carries
    /// the undo.
    pub fn is_effective(&self) -> bool {
        matches!(
            self.status,
            TransactionStatus::Completed | TransactionStatus::Reversed
        )
    }
}

/// Caller-supplied details attached to a money movement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionMetadata {
    /// Currency the caller sent; `None` posts in the account's own currency
    pub currency: Option<Currency>,
    pub description: Option<String>,
    pub reverses: Option<TransactionId>,
}

impl TransactionMetadata {
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn in_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// Filter for listing an account's transactions
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFilter {
    pub tx_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub until: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            tx_type: None,
            status: None,
            from: None,
            until: None,
            limit: 20,
            offset: 0,
        }
    }
}

impl TransactionFilter {
    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.tx_type.map_or(true, |t| transaction.tx_type == t)
            && self.status.map_or(true, |s| transaction.status == s)
            && self.from.map_or(true, |from| transaction.created_at >= from)
            && self.until.map_or(true, |until| transaction.created_at <= until)
    }
}

/// One page of a filtered listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of matching records before pagination
    pub total: usize,
}
