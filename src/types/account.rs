//! Account-related types for the ledger engine
//!
//! This module defines the Account structure together with the identifiers,
//! enumerations and currency code used to describe it.

use super::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Customer identifier
///
/// Supplied by the authentication layer; the engine never creates customers.
pub type CustomerId = u32;

/// Unique identifier for an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Creates a new random `AccountId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Customer-facing account; balance never drops below zero
    Checking,

    /// Money owed to the bank; balance is the outstanding principal as a
    /// value less than or equal to zero
    Loan,
}

impl AccountType {
    /// Prefix used for human-readable account numbers
    pub fn number_prefix(self) -> &'static str {
        match self {
            AccountType::Checking => "CHK",
            AccountType::Loan => "LOAN",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Checking => f.write_str("CHECKING"),
            AccountType::Loan => f.write_str("LOAN"),
        }
    }
}

/// Lifecycle status of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Closed,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => f.write_str("ACTIVE"),
            AccountStatus::Closed => f.write_str("CLOSED"),
        }
    }
}

/// ISO-4217 style currency code (three upper-case ASCII letters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parse and normalize a currency code
    ///
    /// Lower-case input is accepted and upper-cased; anything that is not
    /// exactly three ASCII letters is rejected.
    pub fn new(code: &str) -> Result<Self, LedgerError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LedgerError::invalid_currency(code));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// US dollar, the default bank currency
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account row
///
/// The balance is only ever written by the balance mutator while it holds the
/// account's row lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    /// Human-readable number, `CHK-##########` or `LOAN-##########`
    pub number: String,

    /// Owning customer
    pub owner: CustomerId,

    pub account_type: AccountType,

    pub status: AccountStatus,

    /// Current balance
    ///
    /// Checking: `>= 0`. Loan: `<= 0`, the negated outstanding principal.
    pub balance: Decimal,

    pub currency: Currency,

    pub opened_at: DateTime<Utc>,

    pub closed_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create a new ACTIVE account with a zero balance
    pub fn new(
        owner: CustomerId,
        account_type: AccountType,
        number: String,
        currency: Currency,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Account {
            id: AccountId::new(),
            number,
            owner,
            account_type,
            status: AccountStatus::Active,
            balance: Decimal::ZERO,
            currency,
            opened_at,
            closed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Outstanding principal of a loan account as a positive value
    pub fn outstanding(&self) -> Decimal {
        match self.account_type {
            AccountType::Loan => -self.balance,
            AccountType::Checking => Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("USD", "USD")]
    #[case("eur", "EUR")]
    #[case(" gbp ", "GBP")]
    fn test_currency_normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(Currency::new(input).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("US")]
    #[case("USDT")]
    #[case("U$D")]
    fn test_currency_rejects_malformed_codes(#[case] input: &str) {
        assert!(matches!(
            Currency::new(input),
            Err(LedgerError::InvalidCurrency { .. })
        ));
    }

    #[test]
    fn test_new_account_is_active_with_zero_balance() {
        let account = Account::new(
            7,
            AccountType::Checking,
            "CHK-0000000001".to_string(),
            Currency::usd(),
            Utc::now(),
        );

        assert!(account.is_active());
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.owner, 7);
        assert!(account.closed_at.is_none());
    }

    #[test]
    fn test_outstanding_is_negated_loan_balance() {
        let mut account = Account::new(
            1,
            AccountType::Loan,
            "LOAN-0000000001".to_string(),
            Currency::usd(),
            Utc::now(),
        );
        account.balance = Decimal::new(-500000, 2);

        assert_eq!(account.outstanding(), Decimal::new(500000, 2));
    }
}
