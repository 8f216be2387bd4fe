//! Replay commands
//!
//! A replay file is a sequence of customer and underwriting actions. Each row
//! names the customer it concerns; the engine resolves the customer's ACTIVE
//! account or latest loan application when it runs the command.

use super::account::{Currency, CustomerId};
use rust_decimal::Decimal;
use std::fmt;

/// Action named in the `type` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Open a checking account; `amount` is an optional initial deposit
    Open,
    /// Close the customer's ACTIVE account
    Close,
    Deposit,
    Withdrawal,
    /// Pay toward the customer's ACTIVE loan account
    Payment,
    /// Submit a loan application for `amount` over `term` months
    Apply,
    /// Approve the latest application at `rate`
    Approve,
    /// Reject the latest application; `note` is the reason
    Reject,
    /// Cancel the latest application
    Cancel,
    /// Disburse the latest application
    Disburse,
}

impl CommandKind {
    /// Underwriting actions run with admin rights
    pub fn is_admin(self) -> bool {
        matches!(
            self,
            CommandKind::Approve | CommandKind::Reject | CommandKind::Disburse
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Open => "open",
            CommandKind::Close => "close",
            CommandKind::Deposit => "deposit",
            CommandKind::Withdrawal => "withdrawal",
            CommandKind::Payment => "payment",
            CommandKind::Apply => "apply",
            CommandKind::Approve => "approve",
            CommandKind::Reject => "reject",
            CommandKind::Cancel => "cancel",
            CommandKind::Disburse => "disburse",
        };
        f.write_str(name)
    }
}

/// One validated replay command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    pub kind: CommandKind,
    pub customer: CustomerId,
    pub amount: Option<Decimal>,
    /// Request currency; the bank currency when absent
    pub currency: Option<Currency>,
    /// Annual interest rate for `approve`
    pub rate: Option<Decimal>,
    /// Term in months for `apply`, or an override for `approve`
    pub term: Option<u32>,
    /// Description for money movements, reason for `reject`
    pub note: Option<String>,
}

impl CommandRecord {
    /// A command with only the required columns set
    pub fn new(kind: CommandKind, customer: CustomerId) -> Self {
        Self {
            kind,
            customer,
            amount: None,
            currency: None,
            rate: None,
            term: None,
            note: None,
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }
}
