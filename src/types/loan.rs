//! Loan application types
//!
//! The application's lifecycle is a tagged state. Each state that allows a
//! transition carries the transition as a method returning the next state, so
//! an illegal move such as PENDING straight to DISBURSED has no function to
//! call.
//!
//! ```text
//! Pending ──approve──▶ Approved ──disburse──▶ Disbursed
//!    │  └──reject───▶ Rejected
//!    └─────cancel───▶ Cancelled
//! ```

use super::account::{AccountId, CustomerId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a loan application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoanApplicationId(Uuid);

impl LoanApplicationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LoanApplicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LoanApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flat status view of [`LoanState`], used for filtering and messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
    Disbursed,
    Cancelled,
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoanStatus::Pending => "PENDING",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Rejected => "REJECTED",
            LoanStatus::Disbursed => "DISBURSED",
            LoanStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// Terms fixed at approval; always present together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub approved_amount: Decimal,
    /// Annual rate as a fraction, e.g. `0.065`
    pub interest_rate: Decimal,
    pub term_months: u32,
}

/// Application awaiting an underwriting decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pending;

/// Underwriting approved; no funds have moved yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approved {
    pub terms: LoanTerms,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejected {
    pub reason: String,
    pub decided_at: DateTime<Utc>,
}

/// Principal committed; backed by a live LOAN account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disbursed {
    pub terms: LoanTerms,
    pub decided_at: DateTime<Utc>,
    pub disbursed_at: DateTime<Utc>,
    pub loan_account: AccountId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancelled {
    pub cancelled_at: DateTime<Utc>,
}

impl Pending {
    pub fn approve(&self, terms: LoanTerms, at: DateTime<Utc>) -> Approved {
        Approved {
            terms,
            decided_at: at,
        }
    }

    pub fn reject(&self, reason: String, at: DateTime<Utc>) -> Rejected {
        Rejected {
            reason,
            decided_at: at,
        }
    }

    pub fn cancel(&self, at: DateTime<Utc>) -> Cancelled {
        Cancelled { cancelled_at: at }
    }
}

impl Approved {
    pub fn disburse(&self, loan_account: AccountId, at: DateTime<Utc>) -> Disbursed {
        Disbursed {
            terms: self.terms.clone(),
            decided_at: self.decided_at,
            disbursed_at: at,
            loan_account,
        }
    }
}

/// Tagged lifecycle state of a loan application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanState {
    Pending(Pending),
    Approved(Approved),
    Rejected(Rejected),
    Disbursed(Disbursed),
    Cancelled(Cancelled),
}

impl LoanState {
    pub fn status(&self) -> LoanStatus {
        match self {
            LoanState::Pending(_) => LoanStatus::Pending,
            LoanState::Approved(_) => LoanStatus::Approved,
            LoanState::Rejected(_) => LoanStatus::Rejected,
            LoanState::Disbursed(_) => LoanStatus::Disbursed,
            LoanState::Cancelled(_) => LoanStatus::Cancelled,
        }
    }

    /// Approved or disbursed terms, if underwriting has approved the loan
    pub fn terms(&self) -> Option<&LoanTerms> {
        match self {
            LoanState::Approved(approved) => Some(&approved.terms),
            LoanState::Disbursed(disbursed) => Some(&disbursed.terms),
            _ => None,
        }
    }
}

/// Loan application record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: LoanApplicationId,

    /// Human-readable `LOAN-YYYYMMDD-######` number
    pub number: String,

    pub customer: CustomerId,

    pub requested_amount: Decimal,

    /// Term the customer asked for; approval may override it
    pub requested_term_months: u32,

    pub created_at: DateTime<Utc>,

    pub state: LoanState,
}

impl LoanApplication {
    pub fn new(
        customer: CustomerId,
        number: String,
        requested_amount: Decimal,
        requested_term_months: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LoanApplicationId::new(),
            number,
            customer,
            requested_amount,
            requested_term_months,
            created_at,
            state: LoanState::Pending(Pending),
        }
    }

    pub fn status(&self) -> LoanStatus {
        self.state.status()
    }

    /// The LOAN account backing a disbursed application
    pub fn loan_account(&self) -> Option<AccountId> {
        match &self.state {
            LoanState::Disbursed(disbursed) => Some(disbursed.loan_account),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms() -> LoanTerms {
        LoanTerms {
            approved_amount: Decimal::new(500000, 2),
            interest_rate: Decimal::new(65, 3),
            term_months: 24,
        }
    }

    fn application() -> LoanApplication {
        LoanApplication::new(
            3,
            "LOAN-20260101-000001".to_string(),
            Decimal::new(500000, 2),
            24,
            Utc::now(),
        )
    }

    #[test]
    fn test_new_application_is_pending_without_terms() {
        let app = application();

        assert_eq!(app.status(), LoanStatus::Pending);
        assert!(app.state.terms().is_none());
        assert!(app.loan_account().is_none());
    }

    #[test]
    fn test_approve_then_disburse_carries_terms() {
        let now = Utc::now();
        let approved = Pending.approve(terms(), now);
        let account = AccountId::new();
        let disbursed = approved.disburse(account, now);

        assert_eq!(disbursed.terms, terms());
        assert_eq!(disbursed.decided_at, approved.decided_at);
        assert_eq!(disbursed.loan_account, account);

        let state = LoanState::Disbursed(disbursed);
        assert_eq!(state.status(), LoanStatus::Disbursed);
        assert_eq!(state.terms(), Some(&terms()));
    }

    #[test]
    fn test_reject_and_cancel_carry_no_terms() {
        let now = Utc::now();
        let rejected = LoanState::Rejected(Pending.reject("income".to_string(), now));
        let cancelled = LoanState::Cancelled(Pending.cancel(now));

        assert_eq!(rejected.status(), LoanStatus::Rejected);
        assert_eq!(cancelled.status(), LoanStatus::Cancelled);
        assert!(rejected.terms().is_none());
    }

    #[test]
    fn test_approved_state_exposes_terms() {
        let state = LoanState::Approved(Pending.approve(terms(), Utc::now()));
        assert_eq!(state.status(), LoanStatus::Approved);
        assert_eq!(state.terms(), Some(&terms()));
    }
}
