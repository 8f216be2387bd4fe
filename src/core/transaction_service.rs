//! Transaction service: the engine's public surface
//!
//! `TransactionService` wires the store, balance mutator, solvency calculator
//! and loan lifecycle controller together from one [`EngineConfig`], and is
//! the only place that checks the calling [`Principal`].
//!
//! Every money movement follows the same path:
//!
//! 1. load a snapshot of the target account
//! 2. check that the principal owns it (or is an admin)
//! 3. run the limit policy against the snapshot to fail fast
//! 4. hand off to the mutator, which re-checks under the row lock
//!
//! Step 3 is an optimization only; the authoritative check is step 4.

use super::balance_mutator::{BalanceMutator, Reversal};
use super::ledger_store::LedgerStore;
use super::limit_policy::{self, MovementRequest};
use super::loan_lifecycle::{Disbursement, LoanLifecycleController, ReviewDecision};
use super::numbering::Numbering;
use super::solvency::{BankPosition, SolvencyCalculator};
use super::traits::{Clock, RandomReferences, ReferenceSource, SystemClock};
use crate::config::EngineConfig;
use crate::types::{
    Account, AccountId, AccountType, Currency, CustomerId, LedgerError, LoanApplication,
    LoanApplicationId, LoanStatus, Page, Principal, Transaction, TransactionFilter,
    TransactionId, TransactionMetadata, TransactionType,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Composition root and authorization boundary of the engine
pub struct TransactionService {
    config: EngineConfig,
    store: Arc<LedgerStore>,
    mutator: Arc<BalanceMutator>,
    solvency: Arc<SolvencyCalculator>,
    loans: LoanLifecycleController,
    clock: Arc<dyn Clock>,
}

impl TransactionService {
    /// Build an engine on the wall clock and the thread-local RNG
    pub fn new(config: EngineConfig) -> Self {
        Self::with_dependencies(config, Arc::new(SystemClock), Arc::new(RandomReferences))
    }

    /// Build an engine with explicit time and randomness sources
    pub fn with_dependencies(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        references: Arc<dyn ReferenceSource>,
    ) -> Self {
        let store = Arc::new(LedgerStore::new(config.lock_timeout));
        let numbering = Numbering::new(references, config.reference_attempts);
        let mutator = Arc::new(BalanceMutator::new(
            Arc::clone(&store),
            config.limits.clone(),
            Arc::clone(&clock),
            numbering.clone(),
        ));
        let solvency = Arc::new(SolvencyCalculator::new(
            Arc::clone(&store),
            config.bank.clone(),
            Arc::clone(&clock),
        ));
        let loans = LoanLifecycleController::new(
            Arc::clone(&store),
            Arc::clone(&mutator),
            Arc::clone(&solvency),
            Arc::clone(&clock),
            numbering,
        );

        Self {
            config,
            store,
            mutator,
            solvency,
            loans,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // Accounts

    /// Open a CHECKING account, optionally funding it in the same step
    ///
    /// LOAN accounts are never opened directly; disbursement creates them.
    ///
    /// # Arguments
    ///
    /// * `principal` - Caller; must be `owner` or an admin
    /// * `owner` - Customer the account belongs to
    /// * `currency` - Account currency
    /// * `initial_deposit` - Posted as a DEPOSIT when positive
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the principal may not act for `owner`
    /// - `DuplicateActiveAccount` if `owner` already has an ACTIVE account
    /// - any deposit rule failure; the account is then not created
    pub fn open_account(
        &self,
        principal: &Principal,
        owner: CustomerId,
        currency: Currency,
        initial_deposit: Option<Decimal>,
    ) -> Result<Account, LedgerError> {
        principal.ensure_can_act_for(owner, "open an account")?;

        let initial_deposit = initial_deposit.filter(|amount| !amount.is_zero());
        if let Some(amount) = initial_deposit {
            limit_policy::check_amount(amount)?;
        }

        let scope = self.store.shared()?;
        self.store.with_customer(owner, |row| {
            if let Some(active) = self.store.active_account_in(row)? {
                return Err(LedgerError::duplicate_active_account(
                    owner,
                    active.account_type,
                ));
            }

            let account =
                self.mutator
                    .open_in(&scope, row, owner, AccountType::Checking, currency.clone())?;

            let Some(amount) = initial_deposit else {
                return Ok(account);
            };

            let metadata = TransactionMetadata::described("Initial deposit").in_currency(currency);
            match self
                .mutator
                .apply_in(&scope, account.id, amount, TransactionType::Deposit, metadata)
            {
                Ok(posting) => Ok(posting.account),
                Err(e) => {
                    self.mutator.discard_in(&scope, row, account.id);
                    Err(e)
                }
            }
        })
    }

    /// Close an ACTIVE account whose balance is zero
    pub fn close_account(
        &self,
        principal: &Principal,
        account: AccountId,
    ) -> Result<Account, LedgerError> {
        let snapshot = self.store.account(account)?;
        principal.ensure_can_act_for(snapshot.owner, "close this account")?;

        let scope = self.store.shared()?;
        self.store
            .with_customer(snapshot.owner, |_| self.mutator.close_in(&scope, account))
    }

    pub fn account(&self, principal: &Principal, id: AccountId) -> Result<Account, LedgerError> {
        let account = self.store.account(id)?;
        principal.ensure_can_act_for(account.owner, "view this account")?;
        Ok(account)
    }

    /// A customer's accounts in opening order
    pub fn accounts_for_customer(
        &self,
        principal: &Principal,
        customer: CustomerId,
    ) -> Result<Vec<Account>, LedgerError> {
        principal.ensure_can_act_for(customer, "view these accounts")?;
        self.store.customer_accounts(customer)
    }

    /// The customer's ACTIVE account, if any
    pub fn active_account(
        &self,
        principal: &Principal,
        customer: CustomerId,
    ) -> Result<Option<Account>, LedgerError> {
        principal.ensure_can_act_for(customer, "view these accounts")?;
        self.store.active_account(customer)
    }

    /// Every account, by customer then opening order
    pub fn all_accounts(&self, principal: &Principal) -> Result<Vec<Account>, LedgerError> {
        principal.ensure_admin("list all accounts")?;

        let mut accounts = Vec::new();
        for customer in self.store.customers() {
            accounts.extend(self.store.customer_accounts(customer)?);
        }
        Ok(accounts)
    }

    // Money movements

    pub fn deposit(
        &self,
        principal: &Principal,
        account: AccountId,
        amount: Decimal,
        currency: Currency,
        description: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        self.move_money(
            principal,
            account,
            TransactionType::Deposit,
            amount,
            currency,
            description,
            "deposit to this account",
        )
    }

    pub fn withdraw(
        &self,
        principal: &Principal,
        account: AccountId,
        amount: Decimal,
        currency: Currency,
        description: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        self.move_money(
            principal,
            account,
            TransactionType::Withdrawal,
            amount,
            currency,
            description,
            "withdraw from this account",
        )
    }

    /// Pay down a loan; clearing it closes the LOAN account
    pub fn loan_payment(
        &self,
        principal: &Principal,
        loan_account: AccountId,
        amount: Decimal,
        currency: Currency,
        description: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        self.move_money(
            principal,
            loan_account,
            TransactionType::LoanPayment,
            amount,
            currency,
            description,
            "pay this loan",
        )
    }

    /// Reverse a COMPLETED deposit or withdrawal; admin only
    pub fn reverse_transaction(
        &self,
        principal: &Principal,
        transaction: TransactionId,
        reason: Option<String>,
    ) -> Result<Reversal, LedgerError> {
        principal.ensure_admin("reverse transactions")?;
        self.mutator.reverse(transaction, reason)
    }

    #[allow(clippy::too_many_arguments)]
    fn move_money(
        &self,
        principal: &Principal,
        account: AccountId,
        tx_type: TransactionType,
        amount: Decimal,
        currency: Currency,
        description: Option<String>,
        operation: &str,
    ) -> Result<Transaction, LedgerError> {
        let snapshot = self.store.account_row_snapshot(account)?;
        principal.ensure_can_act_for(snapshot.account.owner, operation)?;

        let withdrawn_today = if tx_type == TransactionType::Withdrawal {
            limit_policy::withdrawn_on(&snapshot.journal, self.clock.now().date_naive())
        } else {
            Decimal::ZERO
        };
        limit_policy::validate(
            &snapshot.account,
            &MovementRequest {
                tx_type,
                amount,
                currency: &currency,
            },
            &self.config.limits,
            withdrawn_today,
        )?;

        let metadata = TransactionMetadata::default()
            .in_currency(currency)
            .with_description(description);

        match tx_type {
            TransactionType::LoanPayment => self.loans.pay(account, amount, metadata),
            _ => self
                .mutator
                .apply(account, tx_type.signed(amount), tx_type, metadata),
        }
    }

    // Transaction history

    pub fn transaction(
        &self,
        principal: &Principal,
        id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        let transaction = self.store.transaction(id)?;
        let owner = self.store.account(transaction.account)?.owner;
        principal.ensure_can_act_for(owner, "view this transaction")?;
        Ok(transaction)
    }

    /// An account's transactions matching `filter`, newest first
    pub fn account_transactions(
        &self,
        principal: &Principal,
        account: AccountId,
        filter: &TransactionFilter,
    ) -> Result<Page<Transaction>, LedgerError> {
        let row = self.store.account_row_snapshot(account)?;
        principal.ensure_can_act_for(row.account.owner, "view this account's transactions")?;

        let matching: Vec<Transaction> = row
            .journal
            .into_iter()
            .rev()
            .filter(|tx| filter.matches(tx))
            .collect();
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect();

        Ok(Page { items, total })
    }

    // Loans

    pub fn apply_for_loan(
        &self,
        principal: &Principal,
        customer: CustomerId,
        amount: Decimal,
        term_months: u32,
    ) -> Result<LoanApplication, LedgerError> {
        principal.ensure_can_act_for(customer, "apply for a loan")?;
        self.loans.apply(customer, amount, term_months)
    }

    /// Approve or reject a PENDING application; admin only
    pub fn review_loan(
        &self,
        principal: &Principal,
        application: LoanApplicationId,
        decision: ReviewDecision,
    ) -> Result<LoanApplication, LedgerError> {
        principal.ensure_admin("review loan applications")?;
        self.loans.review(application, decision)
    }

    /// Fund an APPROVED application; admin only
    pub fn disburse_loan(
        &self,
        principal: &Principal,
        application: LoanApplicationId,
    ) -> Result<Disbursement, LedgerError> {
        principal.ensure_admin("disburse loans")?;
        self.loans.disburse(application)
    }

    /// Withdraw a PENDING application; owner or admin
    pub fn cancel_loan(
        &self,
        principal: &Principal,
        application: LoanApplicationId,
    ) -> Result<LoanApplication, LedgerError> {
        let snapshot = self.loans.application(application)?;
        principal.ensure_can_act_for(snapshot.customer, "cancel this loan application")?;
        self.loans.cancel(application)
    }

    pub fn loan_application(
        &self,
        principal: &Principal,
        application: LoanApplicationId,
    ) -> Result<LoanApplication, LedgerError> {
        let snapshot = self.loans.application(application)?;
        principal.ensure_can_act_for(snapshot.customer, "view this loan application")?;
        Ok(snapshot)
    }

    /// A customer's applications, newest first
    pub fn loan_applications_for_customer(
        &self,
        principal: &Principal,
        customer: CustomerId,
    ) -> Result<Vec<LoanApplication>, LedgerError> {
        principal.ensure_can_act_for(customer, "view these loan applications")?;
        self.loans.customer_applications(customer)
    }

    /// All applications, newest first; admin only
    pub fn list_loan_applications(
        &self,
        principal: &Principal,
        status: Option<LoanStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Page<LoanApplication>, LedgerError> {
        principal.ensure_admin("list loan applications")?;
        self.loans.list(status, limit, offset)
    }

    // Bank

    /// Funds available for new loans right now
    pub fn usable_funds(&self) -> Result<Decimal, LedgerError> {
        self.solvency.usable_funds()
    }

    /// Full financial position; admin only
    pub fn bank_position(&self, principal: &Principal) -> Result<BankPosition, LedgerError> {
        principal.ensure_admin("view the bank position")?;
        self.solvency.position()
    }
}
