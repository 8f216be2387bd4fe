//! Replay command engine
//!
//! This module provides the CommandEngine that replays CSV commands against a
//! [`TransactionService`]. Each row names only a customer; the engine resolves
//! the customer's ACTIVE account or latest loan application and runs the
//! operation with the right principal:
//!
//! - customer actions run as the customer themselves
//! - `approve`, `reject` and `disburse` run as an administrator
//!
//! The engine takes `&self` so the batch processor can share it across worker
//! threads; all synchronization lives in the service's ledger store.

use super::loan_lifecycle::{LoanApproval, ReviewDecision};
use super::transaction_service::TransactionService;
use crate::config::EngineConfig;
use crate::types::{
    Account, AccountId, CommandKind, CommandRecord, Currency, CustomerId, LedgerError,
    LoanApplicationId, Principal,
};
use std::sync::Arc;

/// Attempts per command when the service reports a transient failure
pub const RETRY_ATTEMPTS: usize = 3;

/// Reason recorded when a `reject` row carries no note
pub const DEFAULT_REJECT_REASON: &str = "Declined by underwriting";

/// Command replay engine
///
/// Cheap to clone; clones share one ledger.
#[derive(Clone)]
pub struct CommandEngine {
    service: Arc<TransactionService>,
}

impl CommandEngine {
    /// Create an engine over a fresh ledger
    pub fn new(config: EngineConfig) -> Self {
        Self::with_service(Arc::new(TransactionService::new(config)))
    }

    pub fn with_service(service: Arc<TransactionService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &TransactionService {
        &self.service
    }

    /// Replay a single command
    ///
    /// Transient failures (lock contention, reference exhaustion) are retried
    /// up to [`RETRY_ATTEMPTS`] times; they never leave partial writes behind.
    ///
    /// # Arguments
    ///
    /// * `record` - The command to replay
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the operation succeeded
    /// * `Err(LedgerError)` if it was rejected
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The customer has no ACTIVE account or no loan application to address
    /// - A column the command needs is missing
    /// - The service rejects the operation
    pub fn process(&self, record: &CommandRecord) -> Result<(), LedgerError> {
        let mut attempt = 1;
        loop {
            match self.dispatch(record) {
                Err(e) if e.is_retryable() && attempt < RETRY_ATTEMPTS => {
                    tracing::debug!(
                        command = %record.kind,
                        customer = record.customer,
                        attempt,
                        error = %e,
                        "Retrying command"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Every account in the ledger, by customer then opening order
    pub fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.service.all_accounts(&Principal::admin())
    }

    fn dispatch(&self, record: &CommandRecord) -> Result<(), LedgerError> {
        let customer = record.customer;
        let principal = if record.kind.is_admin() {
            Principal::admin()
        } else {
            Principal::customer(customer)
        };
        let note = record.note.clone();

        match record.kind {
            CommandKind::Open => {
                self.service
                    .open_account(&principal, customer, self.currency(record), record.amount)?;
            }
            CommandKind::Close => {
                let account = self.active_account(customer)?;
                self.service.close_account(&principal, account)?;
            }
            CommandKind::Deposit => {
                let account = self.active_account(customer)?;
                let amount = required(record, record.amount, "amount")?;
                self.service
                    .deposit(&principal, account, amount, self.currency(record), note)?;
            }
            CommandKind::Withdrawal => {
                let account = self.active_account(customer)?;
                let amount = required(record, record.amount, "amount")?;
                self.service
                    .withdraw(&principal, account, amount, self.currency(record), note)?;
            }
            CommandKind::Payment => {
                let account = self.active_account(customer)?;
                let amount = required(record, record.amount, "amount")?;
                self.service
                    .loan_payment(&principal, account, amount, self.currency(record), note)?;
            }
            CommandKind::Apply => {
                let amount = required(record, record.amount, "amount")?;
                let term = required(record, record.term, "term")?;
                self.service
                    .apply_for_loan(&principal, customer, amount, term)?;
            }
            CommandKind::Approve => {
                let application = self.latest_application(customer)?;
                let approval = LoanApproval {
                    approved_amount: record.amount,
                    interest_rate: required(record, record.rate, "rate")?,
                    term_months: record.term,
                };
                self.service.review_loan(
                    &principal,
                    application,
                    ReviewDecision::Approve(approval),
                )?;
            }
            CommandKind::Reject => {
                let application = self.latest_application(customer)?;
                let reason = note.unwrap_or_else(|| DEFAULT_REJECT_REASON.to_string());
                self.service.review_loan(
                    &principal,
                    application,
                    ReviewDecision::Reject { reason },
                )?;
            }
            CommandKind::Cancel => {
                let application = self.latest_application(customer)?;
                self.service.cancel_loan(&principal, application)?;
            }
            CommandKind::Disburse => {
                let application = self.latest_application(customer)?;
                self.service.disburse_loan(&principal, application)?;
            }
        }

        Ok(())
    }

    fn currency(&self, record: &CommandRecord) -> Currency {
        record
            .currency
            .clone()
            .unwrap_or_else(|| self.service.config().bank.currency.clone())
    }

    fn active_account(&self, customer: CustomerId) -> Result<AccountId, LedgerError> {
        self.service
            .active_account(&Principal::customer(customer), customer)?
            .map(|account| account.id)
            .ok_or(LedgerError::NoActiveAccount { customer })
    }

    fn latest_application(&self, customer: CustomerId) -> Result<LoanApplicationId, LedgerError> {
        self.service
            .loan_applications_for_customer(&Principal::customer(customer), customer)?
            .first()
            .map(|application| application.id)
            .ok_or(LedgerError::NoLoanApplication { customer })
    }
}

fn required<T: Copy>(
    record: &CommandRecord,
    value: Option<T>,
    field: &str,
) -> Result<T, LedgerError> {
    value.ok_or_else(|| {
        LedgerError::incomplete_command(&record.kind.to_string(), record.customer, field)
    })
}
