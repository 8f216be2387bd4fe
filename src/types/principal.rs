//! Authenticated caller identity
//!
//! Authentication happens upstream; the engine receives an already verified
//! principal and only checks ownership and role.

use super::account::CustomerId;
use super::error::LedgerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Admin,
}

/// The caller on whose behalf an operation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub role: Role,
    /// Set for customers; admins may act without a customer identity
    pub customer: Option<CustomerId>,
}

impl Principal {
    pub fn customer(customer: CustomerId) -> Self {
        Self {
            role: Role::Customer,
            customer: Some(customer),
        }
    }

    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            customer: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may act on any customer; customers only on themselves
    pub fn can_act_for(&self, owner: CustomerId) -> bool {
        self.is_admin() || self.customer == Some(owner)
    }

    pub fn ensure_can_act_for(&self, owner: CustomerId, operation: &str) -> Result<(), LedgerError> {
        if self.can_act_for(owner) {
            Ok(())
        } else {
            Err(LedgerError::unauthorized(operation))
        }
    }

    pub fn ensure_admin(&self, operation: &str) -> Result<(), LedgerError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(LedgerError::unauthorized(operation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::own_account(Principal::customer(1), 1, true)]
    #[case::foreign_account(Principal::customer(1), 2, false)]
    #[case::admin(Principal::admin(), 2, true)]
    fn test_can_act_for(#[case] principal: Principal, #[case] owner: CustomerId, #[case] expected: bool) {
        assert_eq!(principal.can_act_for(owner), expected);
    }

    #[test]
    fn test_customer_is_not_admin() {
        let result = Principal::customer(4).ensure_admin("review loan applications");
        assert_eq!(
            result,
            Err(LedgerError::unauthorized("review loan applications"))
        );
    }
}
