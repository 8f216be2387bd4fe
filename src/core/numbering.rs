//! Human-readable reference and account numbers
//!
//! | Kind               | Format                  |
//! |--------------------|-------------------------|
//! | transaction        | `TXN-YYYYMMDD-XXXXXX`   |
//! | loan application   | `LOAN-YYYYMMDD-######`  |
//! | checking account   | `CHK-##########`        |
//! | loan account       | `LOAN-##########`       |
//!
//! The random part comes from the injected [`ReferenceSource`]. Each number is
//! claimed in the store's unique index; on collision another draw is made, up
//! to the configured number of attempts.

use super::ledger_store::LedgerStore;
use super::traits::ReferenceSource;
use crate::types::{AccountId, AccountType, LedgerError, LoanApplicationId, TransactionId};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const DIGITS: &[u8] = b"0123456789";

const REFERENCE_SUFFIX_LEN: usize = 6;
const ACCOUNT_NUMBER_LEN: usize = 10;

/// Allocates unique numbers against a [`LedgerStore`]
#[derive(Clone)]
pub struct Numbering {
    source: Arc<dyn ReferenceSource>,
    attempts: usize,
}

impl Numbering {
    pub fn new(source: Arc<dyn ReferenceSource>, attempts: usize) -> Self {
        Self { source, attempts }
    }

    /// Allocate a `TXN-YYYYMMDD-XXXXXX` reference owned by `owner`
    ///
    /// # Errors
    ///
    /// `ReferenceCollision` if every attempt drew a reference already in use.
    pub fn transaction_reference(
        &self,
        store: &LedgerStore,
        owner: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<String, LedgerError> {
        let date = now.format("%Y%m%d");
        self.allocate(
            || {
                format!(
                    "TXN-{date}-{}",
                    self.source.draw(REFERENCE_ALPHABET, REFERENCE_SUFFIX_LEN)
                )
            },
            |reference| store.reserve_reference(reference, owner),
        )
    }

    /// Allocate a `CHK-##########` or `LOAN-##########` account number
    pub fn account_number(
        &self,
        store: &LedgerStore,
        owner: AccountId,
        account_type: AccountType,
    ) -> Result<String, LedgerError> {
        self.allocate(
            || {
                format!(
                    "{}-{}",
                    account_type.number_prefix(),
                    self.source.draw(DIGITS, ACCOUNT_NUMBER_LEN)
                )
            },
            |number| store.reserve_account_number(number, owner),
        )
    }

    /// Allocate a `LOAN-YYYYMMDD-######` application number
    pub fn application_number(
        &self,
        store: &LedgerStore,
        owner: LoanApplicationId,
        now: DateTime<Utc>,
    ) -> Result<String, LedgerError> {
        let date = now.format("%Y%m%d");
        self.allocate(
            || {
                format!(
                    "LOAN-{date}-{}",
                    self.source.draw(DIGITS, REFERENCE_SUFFIX_LEN)
                )
            },
            |number| store.reserve_application_number(number, owner),
        )
    }

    fn allocate(
        &self,
        mut draw: impl FnMut() -> String,
        mut claim: impl FnMut(&str) -> bool,
    ) -> Result<String, LedgerError> {
        for attempt in 1..=self.attempts {
            let candidate = draw();
            if claim(&candidate) {
                return Ok(candidate);
            }
            tracing::debug!(attempt, candidate = %candidate, "Reference collision, drawing again");
        }

        tracing::warn!(attempts = self.attempts, "Reference allocation exhausted");
        Err(LedgerError::ReferenceCollision {
            attempts: self.attempts,
        })
    }
}
