//! Loan lifecycle controller
//!
//! Drives a loan application through its states and performs the one step
//! that moves money: disbursement.
//!
//! ```text
//! apply ──▶ PENDING ──approve──▶ APPROVED ──disburse──▶ DISBURSED
//!              │  └────reject──▶ REJECTED
//!              └──────cancel───▶ CANCELLED
//! ```
//!
//! Disbursement runs inside an exclusive ledger scope. Within it the
//! controller re-checks the one-active-account rule and bank solvency, opens
//! the LOAN account and posts the disbursement. If any step fails, nothing of
//! it remains and the application stays APPROVED.
//!
//! The controller does not authorize; the transaction service checks the
//! principal before calling in.

use super::balance_mutator::BalanceMutator;
use super::ledger_store::LedgerStore;
use super::limit_policy;
use super::numbering::Numbering;
use super::solvency::SolvencyCalculator;
use super::traits::Clock;
use crate::types::{
    Account, AccountId, AccountType, Currency, CustomerId, LedgerError, LoanApplication,
    LoanApplicationId, LoanState, LoanStatus, LoanTerms, Page, Transaction, TransactionMetadata,
    TransactionType,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Underwriting decision on a PENDING application
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDecision {
    Approve(LoanApproval),
    Reject { reason: String },
}

/// Terms chosen at approval
///
/// Amount and term default to what the customer asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanApproval {
    pub approved_amount: Option<Decimal>,
    pub interest_rate: Decimal,
    pub term_months: Option<u32>,
}

/// Result of a successful disbursement
#[derive(Debug, Clone, PartialEq)]
pub struct Disbursement {
    pub application: LoanApplication,
    pub account: Account,
    pub transaction: Transaction,
}

pub struct LoanLifecycleController {
    store: Arc<LedgerStore>,
    mutator: Arc<BalanceMutator>,
    solvency: Arc<SolvencyCalculator>,
    clock: Arc<dyn Clock>,
    numbering: Numbering,
}

impl LoanLifecycleController {
    pub fn new(
        store: Arc<LedgerStore>,
        mutator: Arc<BalanceMutator>,
        solvency: Arc<SolvencyCalculator>,
        clock: Arc<dyn Clock>,
        numbering: Numbering,
    ) -> Self {
        Self {
            store,
            mutator,
            solvency,
            clock,
            numbering,
        }
    }

    /// Submit a new application
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` for a non-positive or over-precise amount
    /// - `InvalidLoanTerms` for a zero term
    /// - `DuplicateActiveAccount` if the customer already holds an ACTIVE account
    /// - `DuplicatePendingApplication` if one is already awaiting review
    pub fn apply(
        &self,
        customer: CustomerId,
        requested_amount: Decimal,
        term_months: u32,
    ) -> Result<LoanApplication, LedgerError> {
        limit_policy::check_amount(requested_amount)?;
        if term_months == 0 {
            return Err(LedgerError::invalid_loan_terms("term must be at least one month"));
        }

        self.store.with_customer(customer, |row| {
            if let Some(active) = self.store.active_account_in(row)? {
                return Err(LedgerError::duplicate_active_account(
                    customer,
                    active.account_type,
                ));
            }
            for id in &row.applications {
                if self.store.application(*id)?.status() == LoanStatus::Pending {
                    return Err(LedgerError::DuplicatePendingApplication { customer });
                }
            }

            let now = self.clock.now();
            let id = LoanApplicationId::new();
            let number = self.numbering.application_number(&self.store, id, now)?;
            let mut application =
                LoanApplication::new(customer, number, requested_amount, term_months, now);
            application.id = id;
            self.store.insert_application(row, application.clone());

            tracing::info!(
                application = %application.id,
                number = %application.number,
                customer,
                amount = %requested_amount,
                term_months,
                "Loan application submitted"
            );

            Ok(application)
        })
    }

    pub fn review(
        &self,
        id: LoanApplicationId,
        decision: ReviewDecision,
    ) -> Result<LoanApplication, LedgerError> {
        match decision {
            ReviewDecision::Approve(approval) => self.approve(id, approval),
            ReviewDecision::Reject { reason } => self.reject(id, reason),
        }
    }

    /// PENDING → APPROVED
    ///
    /// Fixes the terms and checks that the bank could fund the loan today.
    /// The check is advisory: disbursement checks again. On failure the
    /// application stays PENDING.
    pub fn approve(
        &self,
        id: LoanApplicationId,
        approval: LoanApproval,
    ) -> Result<LoanApplication, LedgerError> {
        let scope = self.store.exclusive()?;

        self.store.with_application(id, |app| {
            let LoanState::Pending(pending) = &app.state else {
                return Err(LedgerError::loan_state_conflict(
                    app.id,
                    app.status(),
                    "approved",
                ));
            };

            let terms = LoanTerms {
                approved_amount: approval.approved_amount.unwrap_or(app.requested_amount),
                interest_rate: approval.interest_rate,
                term_months: approval.term_months.unwrap_or(app.requested_term_months),
            };
            validate_terms(&terms)?;

            let available = self.solvency.usable_funds_in(&scope)?;
            if available < terms.approved_amount {
                return Err(LedgerError::insufficient_bank_funds(
                    available,
                    terms.approved_amount,
                ));
            }

            let approved = pending.approve(terms, self.clock.now());
            tracing::info!(
                application = %app.id,
                amount = %approved.terms.approved_amount,
                rate = %approved.terms.interest_rate,
                term_months = approved.terms.term_months,
                "Loan application approved"
            );
            app.state = LoanState::Approved(approved);
            Ok(app.clone())
        })
    }

    /// PENDING → REJECTED
    pub fn reject(
        &self,
        id: LoanApplicationId,
        reason: String,
    ) -> Result<LoanApplication, LedgerError> {
        self.store.with_application(id, |app| {
            let LoanState::Pending(pending) = &app.state else {
                return Err(LedgerError::loan_state_conflict(
                    app.id,
                    app.status(),
                    "rejected",
                ));
            };

            let rejected = pending.reject(reason, self.clock.now());
            tracing::info!(application = %app.id, reason = %rejected.reason, "Loan application rejected");
            app.state = LoanState::Rejected(rejected);
            Ok(app.clone())
        })
    }

    /// PENDING → CANCELLED
    pub fn cancel(&self, id: LoanApplicationId) -> Result<LoanApplication, LedgerError> {
        self.store.with_application(id, |app| {
            let LoanState::Pending(pending) = &app.state else {
                return Err(LedgerError::loan_state_conflict(
                    app.id,
                    app.status(),
                    "cancelled",
                ));
            };

            app.state = LoanState::Cancelled(pending.cancel(self.clock.now()));
            tracing::info!(application = %app.id, "Loan application cancelled");
            Ok(app.clone())
        })
    }

    /// APPROVED → DISBURSED
    ///
    /// Holds the ledger gate exclusive, then the customer, application and
    /// account locks in that order.
    ///
    /// # Errors
    ///
    /// - `LoanStateConflict` unless the application is APPROVED
    /// - `DuplicateActiveAccount` if the customer opened an account since approval
    /// - `InsufficientBankFunds` if reserves no longer cover the amount
    /// - `Contention`, `ReferenceCollision` (retryable)
    pub fn disburse(&self, id: LoanApplicationId) -> Result<Disbursement, LedgerError> {
        let scope = self.store.exclusive()?;
        let customer = self.store.application(id)?.customer;

        self.store.with_customer(customer, |customer_row| {
            self.store.with_application(id, |app| {
                let LoanState::Approved(approved) = &app.state else {
                    return Err(LedgerError::loan_state_conflict(
                        app.id,
                        app.status(),
                        "disbursed",
                    ));
                };
                let amount = approved.terms.approved_amount;

                if let Some(active) = self.store.active_account_in(customer_row)? {
                    return Err(LedgerError::duplicate_active_account(
                        customer,
                        active.account_type,
                    ));
                }

                let available = self.solvency.usable_funds_in(&scope)?;
                if available < amount {
                    tracing::warn!(
                        application = %app.id,
                        %available,
                        requested = %amount,
                        "Disbursement blocked by bank reserves"
                    );
                    return Err(LedgerError::insufficient_bank_funds(available, amount));
                }

                let currency: Currency = self.solvency.bank().currency.clone();
                let account = self.mutator.open_in(
                    &scope,
                    customer_row,
                    customer,
                    AccountType::Loan,
                    currency,
                )?;

                let metadata = TransactionMetadata::described(format!(
                    "Loan disbursement for application {}",
                    app.number
                ));
                let posting = match self.mutator.apply_in(
                    &scope,
                    account.id,
                    -amount,
                    TransactionType::LoanDisbursement,
                    metadata,
                ) {
                    Ok(posting) => posting,
                    Err(e) => {
                        self.mutator.discard_in(&scope, customer_row, account.id);
                        return Err(e);
                    }
                };

                let disbursed = approved.disburse(account.id, self.clock.now());
                app.state = LoanState::Disbursed(disbursed);

                tracing::info!(
                    application = %app.id,
                    account = %account.id,
                    customer,
                    %amount,
                    "Loan disbursed"
                );

                Ok(Disbursement {
                    application: app.clone(),
                    account: posting.account,
                    transaction: posting.transaction,
                })
            })
        })
    }

    /// Post a payment against a LOAN account
    ///
    /// A payment that brings the balance to zero closes the account.
    pub fn pay(
        &self,
        loan_account: AccountId,
        amount: Decimal,
        metadata: TransactionMetadata,
    ) -> Result<Transaction, LedgerError> {
        self.mutator
            .apply(loan_account, amount, TransactionType::LoanPayment, metadata)
    }

    pub fn application(&self, id: LoanApplicationId) -> Result<LoanApplication, LedgerError> {
        self.store.application(id)
    }

    pub fn customer_applications(
        &self,
        customer: CustomerId,
    ) -> Result<Vec<LoanApplication>, LedgerError> {
        self.store.customer_applications(customer)
    }

    /// All applications, optionally filtered by status, newest first
    pub fn list(
        &self,
        status: Option<LoanStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Page<LoanApplication>, LedgerError> {
        let mut matching: Vec<LoanApplication> = self
            .store
            .applications()?
            .into_iter()
            .filter(|app| status.map_or(true, |s| app.status() == s))
            .collect();
        matching.reverse();

        let total = matching.len();
        let items = matching.into_iter().skip(offset).take(limit).collect();
        Ok(Page { items, total })
    }
}

fn validate_terms(terms: &LoanTerms) -> Result<(), LedgerError> {
    limit_policy::check_amount(terms.approved_amount)?;
    if terms.interest_rate < Decimal::ZERO || terms.interest_rate > Decimal::ONE {
        return Err(LedgerError::invalid_loan_terms(
            "interest rate must be between 0 and 1",
        ));
    }
    if terms.term_months == 0 {
        return Err(LedgerError::invalid_loan_terms("term must be at least one month"));
    }
    Ok(())
}
