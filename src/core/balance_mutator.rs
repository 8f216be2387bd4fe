//! Balance mutator: the only writer of account balances
//!
//! Every money movement in the engine funnels through [`BalanceMutator`].
//! Under the account's row lock it re-runs the limit policy against the
//! locked state, computes the new balance, allocates a unique reference and
//! only then writes the balance and appends the journal entry. Every fallible
//! step happens before the first write, so a failed movement leaves the row
//! exactly as it was and no journal entry behind.
//!
//! The mutator also owns the account lifecycle writes that must be atomic with
//! the one-active-account rule: opening and closing accounts.

use super::ledger_store::{AccountRow, CustomerRow, LedgerScope, LedgerStore};
use super::limit_policy::{self, MovementRequest};
use super::numbering::Numbering;
use super::traits::Clock;
use crate::config::LimitConfig;
use crate::types::{
    Account, AccountId, AccountStatus, AccountType, Currency, CustomerId, LedgerError,
    Transaction, TransactionId, TransactionMetadata, TransactionStatus, TransactionType,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Description appended to the payment that clears a loan
pub const LOAN_PAID_IN_FULL: &str = "LOAN PAID IN FULL";

/// A committed entry together with the account state it left behind
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub transaction: Transaction,
    pub account: Account,
}

/// Outcome of reversing a posted entry
#[derive(Debug, Clone, PartialEq)]
pub struct Reversal {
    /// The original entry, now REVERSED
    pub original: Transaction,
    /// The compensating entry
    pub offset: Transaction,
}

/// Serialized writer of account rows
pub struct BalanceMutator {
    store: Arc<LedgerStore>,
    limits: LimitConfig,
    clock: Arc<dyn Clock>,
    numbering: Numbering,
}

impl BalanceMutator {
    pub fn new(
        store: Arc<LedgerStore>,
        limits: LimitConfig,
        clock: Arc<dyn Clock>,
        numbering: Numbering,
    ) -> Self {
        Self {
            store,
            limits,
            clock,
            numbering,
        }
    }

    /// Apply a signed delta to an account
    ///
    /// Takes the ledger gate shared for the duration of the write.
    ///
    /// # Arguments
    ///
    /// * `account` - Target account
    /// * `delta` - Signed change to the balance; its sign must agree with `tx_type`
    /// * `tx_type` - Kind of movement
    /// * `metadata` - Request currency, description and reversal link
    ///
    /// # Returns
    ///
    /// The COMPLETED journal entry
    ///
    /// # Errors
    ///
    /// - Any limit-policy failure, evaluated against the locked row
    /// - `ArithmeticOverflow` if the new balance is not representable
    /// - `ReferenceCollision` if no unique reference could be drawn
    /// - `Contention` if the gate or row lock wait times out
    pub fn apply(
        &self,
        account: AccountId,
        delta: Decimal,
        tx_type: TransactionType,
        metadata: TransactionMetadata,
    ) -> Result<Transaction, LedgerError> {
        let scope = self.store.shared()?;
        self.apply_in(&scope, account, delta, tx_type, metadata)
            .map(|posting| posting.transaction)
    }

    /// [`apply`](Self::apply) inside a scope the caller already holds
    ///
    /// Also returns the account as written, so callers never need a second
    /// read that could time out after the commit.
    pub fn apply_in(
        &self,
        scope: &LedgerScope<'_>,
        account: AccountId,
        delta: Decimal,
        tx_type: TransactionType,
        metadata: TransactionMetadata,
    ) -> Result<Posting, LedgerError> {
        let amount = delta.abs();
        if tx_type.signed(amount) != delta {
            return Err(LedgerError::invalid_amount(
                delta,
                &format!("sign does not match {tx_type}"),
            ));
        }

        scope.with_account(account, |row| {
            let now = self.clock.now();
            let currency = metadata
                .currency
                .clone()
                .unwrap_or_else(|| row.account.currency.clone());

            let withdrawn_today = if tx_type == TransactionType::Withdrawal
                && self.limits.daily_withdrawal_cap.is_some()
            {
                limit_policy::withdrawn_on(&row.journal, now.date_naive())
            } else {
                Decimal::ZERO
            };

            limit_policy::validate(
                &row.account,
                &MovementRequest {
                    tx_type,
                    amount,
                    currency: &currency,
                },
                &self.limits,
                withdrawn_today,
            )?;

            let balance_after = row
                .account
                .balance
                .checked_add(delta)
                .ok_or_else(|| LedgerError::arithmetic_overflow(&tx_type.to_string()))?;

            let paid_off = tx_type == TransactionType::LoanPayment && balance_after.is_zero();
            let description = if paid_off {
                Some(match metadata.description {
                    Some(text) => format!("{text} - {LOAN_PAID_IN_FULL}"),
                    None => LOAN_PAID_IN_FULL.to_string(),
                })
            } else {
                metadata.description
            };

            let tx = self.post(
                scope.store(),
                row,
                tx_type,
                amount,
                balance_after,
                description,
                metadata.reverses,
                now,
            )?;

            if paid_off {
                row.account.status = AccountStatus::Closed;
                row.account.closed_at = Some(now);
                tracing::info!(
                    account = %row.account.id,
                    customer = row.account.owner,
                    "Loan paid in full, account closed"
                );
            }

            Ok(Posting {
                transaction: tx,
                account: row.account.clone(),
            })
        })
    }

    /// Reverse a COMPLETED deposit or withdrawal
    ///
    /// Marks the original REVERSED and posts an opposite entry for the same
    /// amount linked back to it. Neither the per-transaction maximum nor the
    /// daily cap applies to the offset.
    pub fn reverse(
        &self,
        transaction: TransactionId,
        reason: Option<String>,
    ) -> Result<Reversal, LedgerError> {
        let scope = self.store.shared()?;
        let account = self.store.transaction_account(transaction)?;

        scope.with_account(account, |row| {
            let now = self.clock.now();
            let index = row
                .journal
                .iter()
                .position(|tx| tx.id == transaction)
                .ok_or(LedgerError::TransactionNotFound { transaction })?;
            let original = row.journal[index].clone();

            limit_policy::check_reversal(&row.account, &original)?;

            let offset_type = match original.tx_type {
                TransactionType::Deposit => TransactionType::Withdrawal,
                _ => TransactionType::Deposit,
            };
            let delta = offset_type.signed(original.amount);
            let balance_after = row
                .account
                .balance
                .checked_add(delta)
                .ok_or_else(|| LedgerError::arithmetic_overflow("reversal"))?;

            let description = match reason {
                Some(reason) => format!("Reversal of {}: {reason}", original.reference),
                None => format!("Reversal of {}", original.reference),
            };

            let offset = self.post(
                scope.store(),
                row,
                offset_type,
                original.amount,
                balance_after,
                Some(description),
                Some(original.id),
                now,
            )?;

            row.journal[index].status = TransactionStatus::Reversed;

            tracing::info!(
                transaction = %original.id,
                offset = %offset.id,
                account = %row.account.id,
                "Transaction reversed"
            );

            Ok(Reversal {
                original: row.journal[index].clone(),
                offset,
            })
        })
    }

    /// Open a new ACTIVE account with zero balance
    ///
    /// The caller must hold `owner`'s customer lock, proven by passing the
    /// customer row, and must already have checked the one-active-account
    /// rule under that lock.
    pub fn open_in(
        &self,
        scope: &LedgerScope<'_>,
        customer: &mut CustomerRow,
        owner: CustomerId,
        account_type: AccountType,
        currency: Currency,
    ) -> Result<Account, LedgerError> {
        let id = AccountId::new();
        let number = self
            .numbering
            .account_number(scope.store(), id, account_type)?;

        let mut account = Account::new(owner, account_type, number, currency, self.clock.now());
        account.id = id;
        scope.insert_account(customer, account.clone());

        tracing::info!(
            account = %account.id,
            number = %account.number,
            customer = owner,
            account_type = %account_type,
            "Account opened"
        );

        Ok(account)
    }

    /// Remove an account opened in the same locked section whose first
    /// posting failed
    pub fn discard_in(&self, scope: &LedgerScope<'_>, customer: &mut CustomerRow, id: AccountId) {
        scope.discard_account(customer, id);
        tracing::debug!(account = %id, "Discarded unfunded account");
    }

    /// Close an ACTIVE account with a zero balance
    ///
    /// # Errors
    ///
    /// - `AccountInactive` if the account is already CLOSED
    /// - `NonZeroBalance` if money remains on it
    pub fn close_in(&self, scope: &LedgerScope<'_>, id: AccountId) -> Result<Account, LedgerError> {
        scope.with_account(id, |row| {
            limit_policy::check_active(&row.account)?;
            if !row.account.balance.is_zero() {
                return Err(LedgerError::NonZeroBalance {
                    account: id,
                    balance: row.account.balance,
                });
            }

            row.account.status = AccountStatus::Closed;
            row.account.closed_at = Some(self.clock.now());

            tracing::info!(account = %id, customer = row.account.owner, "Account closed");
            Ok(row.account.clone())
        })
    }

    /// Allocate a reference, then write the balance and append the entry
    ///
    /// Reference allocation is the last fallible step; everything after it is
    /// infallible.
    #[allow(clippy::too_many_arguments)]
    fn post(
        &self,
        store: &LedgerStore,
        row: &mut AccountRow,
        tx_type: TransactionType,
        amount: Decimal,
        balance_after: Decimal,
        description: Option<String>,
        reverses: Option<TransactionId>,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let id = TransactionId::new();
        let reference = self.numbering.transaction_reference(store, id, now)?;

        let tx = Transaction {
            id,
            account: row.account.id,
            tx_type,
            amount,
            currency: row.account.currency.clone(),
            balance_after,
            status: TransactionStatus::Completed,
            reference,
            description,
            reverses,
            created_at: now,
            processed_at: Some(now),
        };

        row.account.balance = balance_after;
        row.journal.push(tx.clone());
        store.index_transaction(id, row.account.id);

        tracing::info!(
            transaction = %tx.id,
            reference = %tx.reference,
            account = %tx.account,
            tx_type = %tx.tx_type,
            amount = %tx.amount,
            balance_after = %tx.balance_after,
            "Transaction posted"
        );

        Ok(tx)
    }
}
