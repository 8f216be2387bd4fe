//! Solvency calculator: how much the bank can lend right now
//!
//! ```text
//! on_hand = initial_capital
//!         + Σ deposits − Σ withdrawals
//!         − Σ loan disbursements + Σ loan payments
//!
//! usable  = on_hand × reserve_ratio
//! ```
//!
//! Sums run over effective entries only (COMPLETED, plus REVERSED ones whose
//! compensating entry is counted separately). The whole sum is taken inside an
//! exclusive ledger scope, so it reflects one consistent instant.

use super::ledger_store::{AccountRow, LedgerScope, LedgerStore};
use super::traits::Clock;
use crate::config::BankConfig;
use crate::types::{AccountType, LedgerError, TransactionType};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::sync::Arc;

/// Ledger-wide sums feeding the solvency formula
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerTotals {
    pub deposits: Decimal,
    pub withdrawals: Decimal,
    pub disbursed: Decimal,
    pub repaid: Decimal,

    /// Current balance of all checking accounts
    pub customer_deposits: Decimal,

    /// Outstanding principal across all loan accounts
    pub outstanding_loans: Decimal,

    pub active_checking_accounts: usize,
    pub active_loan_accounts: usize,
}

impl LedgerTotals {
    fn add_row(mut self, row: &AccountRow) -> Result<Self, LedgerError> {
        let overflow = || LedgerError::arithmetic_overflow("ledger totals");

        for tx in row.journal.iter().filter(|tx| tx.is_effective()) {
            let bucket = match tx.tx_type {
                TransactionType::Deposit => &mut self.deposits,
                TransactionType::Withdrawal => &mut self.withdrawals,
                TransactionType::LoanDisbursement => &mut self.disbursed,
                TransactionType::LoanPayment => &mut self.repaid,
            };
            *bucket = bucket.checked_add(tx.amount).ok_or_else(overflow)?;
        }

        let account = &row.account;
        match account.account_type {
            AccountType::Checking => {
                self.customer_deposits = self
                    .customer_deposits
                    .checked_add(account.balance)
                    .ok_or_else(overflow)?;
                if account.is_active() {
                    self.active_checking_accounts += 1;
                }
            }
            AccountType::Loan => {
                self.outstanding_loans = self
                    .outstanding_loans
                    .checked_add(account.outstanding())
                    .ok_or_else(overflow)?;
                if account.is_active() {
                    self.active_loan_accounts += 1;
                }
            }
        }

        Ok(self)
    }

    /// Cash the bank holds given its starting capital
    pub fn on_hand(&self, initial_capital: Decimal) -> Result<Decimal, LedgerError> {
        initial_capital
            .checked_add(self.deposits)
            .and_then(|v| v.checked_sub(self.withdrawals))
            .and_then(|v| v.checked_sub(self.disbursed))
            .and_then(|v| v.checked_add(self.repaid))
            .ok_or_else(|| LedgerError::arithmetic_overflow("funds on hand"))
    }
}

/// Bank financial position report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankPosition {
    pub initial_capital: Decimal,
    pub funds_on_hand: Decimal,
    pub reserve_ratio: Decimal,
    pub usable_funds: Decimal,

    /// Share of funds on hand held back from lending
    pub reserved_funds: Decimal,
    pub is_overextended: bool,
    pub customer_deposits: Decimal,
    pub outstanding_loans: Decimal,
    pub total_disbursed: Decimal,
    pub total_repaid: Decimal,
    pub active_checking_accounts: usize,
    pub active_loan_accounts: usize,
    pub as_of: DateTime<Utc>,
}

/// Computes usable funds and the bank position from the ledger
pub struct SolvencyCalculator {
    store: Arc<LedgerStore>,
    bank: BankConfig,
    clock: Arc<dyn Clock>,
}

impl SolvencyCalculator {
    pub fn new(store: Arc<LedgerStore>, bank: BankConfig, clock: Arc<dyn Clock>) -> Self {
        Self { store, bank, clock }
    }

    pub fn bank(&self) -> &BankConfig {
        &self.bank
    }

    /// Funds currently available for new loan disbursements
    ///
    /// Takes the ledger gate exclusive for the duration of the sum.
    ///
    /// # Errors
    ///
    /// `Contention` if in-flight movements keep the gate past the timeout.
    pub fn usable_funds(&self) -> Result<Decimal, LedgerError> {
        let scope = self.store.exclusive()?;
        self.usable_funds_in(&scope)
    }

    /// [`usable_funds`](Self::usable_funds) inside an exclusive scope the
    /// caller already holds
    pub fn usable_funds_in(&self, scope: &LedgerScope<'_>) -> Result<Decimal, LedgerError> {
        let totals = self.totals_in(scope)?;
        self.usable(&totals)
    }

    /// Full financial position report
    pub fn position(&self) -> Result<BankPosition, LedgerError> {
        let scope = self.store.exclusive()?;
        let totals = self.totals_in(&scope)?;
        let funds_on_hand = totals.on_hand(self.bank.initial_capital)?;
        let usable_funds = self.usable(&totals)?;
        let reserved_funds = funds_on_hand
            .checked_sub(usable_funds)
            .ok_or_else(|| LedgerError::arithmetic_overflow("reserved funds"))?;

        Ok(BankPosition {
            initial_capital: self.bank.initial_capital,
            funds_on_hand,
            reserve_ratio: self.bank.reserve_ratio,
            usable_funds,
            reserved_funds,
            is_overextended: usable_funds < Decimal::ZERO,
            customer_deposits: totals.customer_deposits,
            outstanding_loans: totals.outstanding_loans,
            total_disbursed: totals.disbursed,
            total_repaid: totals.repaid,
            active_checking_accounts: totals.active_checking_accounts,
            active_loan_accounts: totals.active_loan_accounts,
            as_of: self.clock.now(),
        })
    }

    pub fn totals_in(&self, scope: &LedgerScope<'_>) -> Result<LedgerTotals, LedgerError> {
        scope.fold_accounts(LedgerTotals::default(), LedgerTotals::add_row)
    }

    fn usable(&self, totals: &LedgerTotals) -> Result<Decimal, LedgerError> {
        let on_hand = totals.on_hand(self.bank.initial_capital)?;
        let usable = on_hand
            .checked_mul(self.bank.reserve_ratio)
            .ok_or_else(|| LedgerError::arithmetic_overflow("usable funds"))?;
        Ok(usable.round_dp_with_strategy(2, RoundingStrategy::ToZero))
    }
}
