//! Limit policy: pure validation of a proposed money movement
//!
//! Nothing in this module touches storage or takes a lock. The service runs
//! the policy against a snapshot to reject obviously bad requests early, and
//! the balance mutator runs it again against the locked row, which is the
//! check that counts.
//!
//! Rules are evaluated in a fixed order and the first failure wins:
//!
//! 1. account is ACTIVE
//! 2. account type matches the operation
//! 3. currency matches the account
//! 4. amount is positive with at most two fractional digits
//! 5. withdrawal: amount within the per-transaction maximum
//! 6. withdrawal: balance covers the amount
//! 7. withdrawal: today's total stays within the daily cap, when enabled
//!
//! Loan payments additionally may not exceed the outstanding principal, and a
//! disbursement must leave the loan balance at or below zero.

use crate::config::LimitConfig;
use crate::types::{
    Account, AccountType, Currency, LedgerError, Transaction, TransactionStatus, TransactionType,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Largest number of fractional digits an amount may carry
pub const MAX_AMOUNT_SCALE: u32 = 2;

/// A movement to validate
#[derive(Debug, Clone, Copy)]
pub struct MovementRequest<'a> {
    pub tx_type: TransactionType,
    /// Positive magnitude; direction comes from `tx_type`
    pub amount: Decimal,
    pub currency: &'a Currency,
}

/// Validate a movement against an account
///
/// # Arguments
///
/// * `account` - Current state of the target account
/// * `request` - The proposed movement
/// * `limits` - Configured withdrawal limits
/// * `withdrawn_today` - Sum of today's COMPLETED withdrawals on the account;
///   only read when the daily cap is enabled
///
/// # Errors
///
/// The first failing rule, in the order listed in the module docs.
pub fn validate(
    account: &Account,
    request: &MovementRequest<'_>,
    limits: &LimitConfig,
    withdrawn_today: Decimal,
) -> Result<(), LedgerError> {
    check_active(account)?;
    check_account_type(account, request.tx_type)?;
    check_currency(account, request.currency)?;
    check_amount(request.amount)?;

    match request.tx_type {
        TransactionType::Withdrawal => {
            check_withdrawal_limit(request.amount, limits)?;
            check_sufficient_funds(account, request.amount)?;
            check_daily_limit(request.amount, limits, withdrawn_today)
        }
        TransactionType::LoanPayment => check_payment(account, request.amount),
        TransactionType::LoanDisbursement => check_disbursement(account, request.amount),
        TransactionType::Deposit => Ok(()),
    }
}

/// Account type an operation must target
pub fn required_account_type(tx_type: TransactionType) -> AccountType {
    match tx_type {
        TransactionType::Deposit | TransactionType::Withdrawal => AccountType::Checking,
        TransactionType::LoanDisbursement | TransactionType::LoanPayment => AccountType::Loan,
    }
}

pub fn check_active(account: &Account) -> Result<(), LedgerError> {
    if account.is_active() {
        Ok(())
    } else {
        Err(LedgerError::account_inactive(account.id, account.status))
    }
}

pub fn check_account_type(account: &Account, tx_type: TransactionType) -> Result<(), LedgerError> {
    let expected = required_account_type(tx_type);
    if account.account_type == expected {
        Ok(())
    } else {
        Err(LedgerError::invalid_account_type(
            &tx_type.to_string(),
            expected,
            account.account_type,
        ))
    }
}

pub fn check_currency(account: &Account, currency: &Currency) -> Result<(), LedgerError> {
    if &account.currency == currency {
        Ok(())
    } else {
        Err(LedgerError::currency_mismatch(&account.currency, currency))
    }
}

/// Positive, with at most two fractional digits
pub fn check_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(amount, "must be positive"));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(LedgerError::invalid_amount(
            amount,
            "at most two decimal places allowed",
        ));
    }
    Ok(())
}

pub fn check_withdrawal_limit(amount: Decimal, limits: &LimitConfig) -> Result<(), LedgerError> {
    if amount > limits.max_withdrawal {
        Err(LedgerError::TransactionLimitExceeded {
            limit: limits.max_withdrawal,
            requested: amount,
        })
    } else {
        Ok(())
    }
}

pub fn check_sufficient_funds(account: &Account, amount: Decimal) -> Result<(), LedgerError> {
    if account.balance < amount {
        Err(LedgerError::insufficient_funds(account.balance, amount))
    } else {
        Ok(())
    }
}

pub fn check_daily_limit(
    amount: Decimal,
    limits: &LimitConfig,
    withdrawn_today: Decimal,
) -> Result<(), LedgerError> {
    let Some(cap) = limits.daily_withdrawal_cap else {
        return Ok(());
    };

    let projected = withdrawn_today
        .checked_add(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("daily withdrawal total"))?;

    if projected > cap {
        Err(LedgerError::DailyLimitExceeded {
            limit: cap,
            withdrawn_today,
            requested: amount,
        })
    } else {
        Ok(())
    }
}

pub fn check_payment(account: &Account, amount: Decimal) -> Result<(), LedgerError> {
    let outstanding = account.outstanding();
    if amount > outstanding {
        Err(LedgerError::PaymentExceedsBalance {
            outstanding,
            requested: amount,
        })
    } else {
        Ok(())
    }
}

/// A disbursement debits the loan account; its balance must stay `<= 0`
pub fn check_disbursement(account: &Account, amount: Decimal) -> Result<(), LedgerError> {
    if account.balance > amount {
        return Err(LedgerError::invalid_amount(
            amount,
            "loan balance must not become positive",
        ));
    }
    Ok(())
}

/// Whether a posted entry can be reversed
///
/// Only COMPLETED deposits and withdrawals on an ACTIVE account qualify. A
/// deposit reversal debits the account, so the balance must still cover it.
pub fn check_reversal(account: &Account, original: &Transaction) -> Result<(), LedgerError> {
    if original.status != TransactionStatus::Completed {
        return Err(LedgerError::not_reversible(
            original.id,
            &format!("status is {}", original.status),
        ));
    }
    if !matches!(
        original.tx_type,
        TransactionType::Deposit | TransactionType::Withdrawal
    ) {
        return Err(LedgerError::not_reversible(
            original.id,
            &format!("{} entries cannot be reversed", original.tx_type),
        ));
    }
    if original.reverses.is_some() {
        return Err(LedgerError::not_reversible(
            original.id,
            "compensating entries cannot be reversed",
        ));
    }
    check_active(account)?;
    if original.tx_type == TransactionType::Deposit {
        check_sufficient_funds(account, original.amount)?;
    }
    Ok(())
}

/// Total of COMPLETED customer withdrawals in `journal` created on `day` (UTC)
///
/// Reversal offsets are not customer withdrawals and do not count.
pub fn withdrawn_on(journal: &[Transaction], day: NaiveDate) -> Decimal {
    journal
        .iter()
        .filter(|tx| {
            tx.tx_type == TransactionType::Withdrawal
                && tx.status == TransactionStatus::Completed
                && tx.reverses.is_none()
                && tx.created_at.date_naive() == day
        })
        .map(|tx| tx.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountStatus, TransactionId};
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};

    fn account(account_type: AccountType, balance: Decimal) -> Account {
        let mut account = Account::new(
            1,
            account_type,
            "CHK-0000000001".to_string(),
            Currency::usd(),
            Utc::now(),
        );
        account.balance = balance;
        account
    }

    #[fixture]
    fn limits() -> LimitConfig {
        LimitConfig::default()
    }

    fn request(tx_type: TransactionType, amount: Decimal, currency: &Currency) -> MovementRequest<'_> {
        MovementRequest {
            tx_type,
            amount,
            currency,
        }
    }

    #[rstest]
    fn test_deposit_to_active_checking_passes(limits: LimitConfig) {
        let usd = Currency::usd();
        let account = account(AccountType::Checking, Decimal::ZERO);

        let result = validate(
            &account,
            &request(TransactionType::Deposit, Decimal::new(10000, 2), &usd),
            &limits,
            Decimal::ZERO,
        );
        assert!(result.is_ok());
    }

    #[rstest]
    fn test_inactive_account_wins_over_everything(limits: LimitConfig) {
        let eur = Currency::new("EUR").unwrap();
        let mut account = account(AccountType::Loan, Decimal::ZERO);
        account.status = AccountStatus::Closed;

        // Wrong type, wrong currency and a bad amount too; status is reported first
        let result = validate(
            &account,
            &request(TransactionType::Withdrawal, Decimal::new(-1, 0), &eur),
            &limits,
            Decimal::ZERO,
        );
        assert!(matches!(result, Err(LedgerError::AccountInactive { .. })));
    }

    #[rstest]
    fn test_type_checked_before_currency(limits: LimitConfig) {
        let eur = Currency::new("EUR").unwrap();
        let account = account(AccountType::Loan, Decimal::ZERO);

        let result = validate(
            &account,
            &request(TransactionType::Deposit, Decimal::ONE, &eur),
            &limits,
            Decimal::ZERO,
        );
        assert!(matches!(
            result,
            Err(LedgerError::InvalidAccountType {
                expected: AccountType::Checking,
                actual: AccountType::Loan,
                ..
            })
        ));
    }

    #[rstest]
    fn test_currency_mismatch(limits: LimitConfig) {
        let eur = Currency::new("EUR").unwrap();
        let account = account(AccountType::Checking, Decimal::new(100, 0));

        let result = validate(
            &account,
            &request(TransactionType::Deposit, Decimal::ONE, &eur),
            &limits,
            Decimal::ZERO,
        );
        assert_eq!(
            result,
            Err(LedgerError::currency_mismatch(&Currency::usd(), &eur))
        );
    }

    #[rstest]
    #[case::zero(Decimal::ZERO)]
    #[case::negative(Decimal::new(-500, 2))]
    #[case::three_places(Decimal::new(1001, 3))]
    fn test_invalid_amounts(#[case] amount: Decimal) {
        assert!(matches!(
            check_amount(amount),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[rstest]
    #[case::whole(Decimal::new(5, 0))]
    #[case::two_places(Decimal::new(1234, 2))]
    #[case::trailing_zeros(Decimal::new(12000, 3))]
    fn test_valid_amounts(#[case] amount: Decimal) {
        assert!(check_amount(amount).is_ok());
    }

    #[rstest]
    fn test_withdrawal_limit_checked_before_funds(limits: LimitConfig) {
        let usd = Currency::usd();
        let account = account(AccountType::Checking, Decimal::new(100, 0));

        let result = validate(
            &account,
            &request(TransactionType::Withdrawal, Decimal::new(1000001, 2), &usd),
            &limits,
            Decimal::ZERO,
        );
        assert_eq!(
            result,
            Err(LedgerError::TransactionLimitExceeded {
                limit: Decimal::new(1000000, 2),
                requested: Decimal::new(1000001, 2),
            })
        );
    }

    #[rstest]
    fn test_withdrawal_at_exact_limit_passes(limits: LimitConfig) {
        let usd = Currency::usd();
        let account = account(AccountType::Checking, Decimal::new(20000, 0));

        let result = validate(
            &account,
            &request(TransactionType::Withdrawal, Decimal::new(1000000, 2), &usd),
            &limits,
            Decimal::ZERO,
        );
        assert!(result.is_ok());
    }

    #[rstest]
    fn test_insufficient_funds_reports_balance(limits: LimitConfig) {
        let usd = Currency::usd();
        let account = account(AccountType::Checking, Decimal::new(4000, 2));

        let result = validate(
            &account,
            &request(TransactionType::Withdrawal, Decimal::new(6000, 2), &usd),
            &limits,
            Decimal::ZERO,
        );
        assert_eq!(
            result,
            Err(LedgerError::insufficient_funds(
                Decimal::new(4000, 2),
                Decimal::new(6000, 2)
            ))
        );
    }

    #[rstest]
    #[case::disabled(None, Decimal::new(49000, 0), true)]
    #[case::under_cap(Some(Decimal::new(50000, 0)), Decimal::new(40000, 0), true)]
    #[case::exactly_cap(Some(Decimal::new(50000, 0)), Decimal::new(41000, 0), true)]
    #[case::over_cap(Some(Decimal::new(50000, 0)), Decimal::new(41001, 0), false)]
    fn test_daily_limit(
        #[case] cap: Option<Decimal>,
        #[case] withdrawn_today: Decimal,
        #[case] allowed: bool,
    ) {
        let limits = LimitConfig::new(Decimal::new(10000, 0), cap);
        let result = check_daily_limit(Decimal::new(9000, 0), &limits, withdrawn_today);
        assert_eq!(result.is_ok(), allowed);
    }

    #[rstest]
    fn test_payment_exceeding_outstanding(limits: LimitConfig) {
        let usd = Currency::usd();
        let loan = account(AccountType::Loan, Decimal::new(-10000, 2));

        let result = validate(
            &loan,
            &request(TransactionType::LoanPayment, Decimal::new(10001, 2), &usd),
            &limits,
            Decimal::ZERO,
        );
        assert_eq!(
            result,
            Err(LedgerError::PaymentExceedsBalance {
                outstanding: Decimal::new(10000, 2),
                requested: Decimal::new(10001, 2),
            })
        );
    }

    #[rstest]
    fn test_payment_of_full_balance_passes(limits: LimitConfig) {
        let usd = Currency::usd();
        let loan = account(AccountType::Loan, Decimal::new(-10000, 2));

        let result = validate(
            &loan,
            &request(TransactionType::LoanPayment, Decimal::new(10000, 2), &usd),
            &limits,
            Decimal::ZERO,
        );
        assert!(result.is_ok());
    }

    fn posted(
        tx_type: TransactionType,
        status: TransactionStatus,
        amount: Decimal,
        day: u32,
    ) -> Transaction {
        let at = Utc.with_ymd_and_hms(2026, 5, day, 12, 0, 0).unwrap();
        Transaction {
            id: TransactionId::new(),
            account: crate::types::AccountId::new(),
            tx_type,
            amount,
            currency: Currency::usd(),
            balance_after: Decimal::ZERO,
            status,
            reference: format!("TXN-202605{day:02}-AAAAAA"),
            description: None,
            reverses: None,
            created_at: at,
            processed_at: Some(at),
        }
    }

    #[test]
    fn test_withdrawn_on_counts_completed_withdrawals_of_that_day() {
        let journal = vec![
            posted(TransactionType::Withdrawal, TransactionStatus::Completed, Decimal::new(100, 0), 3),
            posted(TransactionType::Withdrawal, TransactionStatus::Completed, Decimal::new(250, 0), 3),
            posted(TransactionType::Withdrawal, TransactionStatus::Reversed, Decimal::new(900, 0), 3),
            posted(TransactionType::Deposit, TransactionStatus::Completed, Decimal::new(700, 0), 3),
            posted(TransactionType::Withdrawal, TransactionStatus::Completed, Decimal::new(50, 0), 2),
        ];
        let day = NaiveDate::from_ymd_opt(2026, 5, 3).unwrap();

        assert_eq!(withdrawn_on(&journal, day), Decimal::new(350, 0));
    }

    #[test]
    fn test_reversal_rules() {
        let checking = account(AccountType::Checking, Decimal::new(50, 0));

        let deposit = posted(TransactionType::Deposit, TransactionStatus::Completed, Decimal::new(80, 0), 1);
        assert!(matches!(
            check_reversal(&checking, &deposit),
            Err(LedgerError::InsufficientFunds { .. })
        ));

        let withdrawal = posted(TransactionType::Withdrawal, TransactionStatus::Completed, Decimal::new(80, 0), 1);
        assert!(check_reversal(&checking, &withdrawal).is_ok());

        let reversed = posted(TransactionType::Withdrawal, TransactionStatus::Reversed, Decimal::new(80, 0), 1);
        assert!(matches!(
            check_reversal(&checking, &reversed),
            Err(LedgerError::NotReversible { .. })
        ));

        let payment = posted(TransactionType::LoanPayment, TransactionStatus::Completed, Decimal::new(10, 0), 1);
        assert!(matches!(
            check_reversal(&checking, &payment),
            Err(LedgerError::NotReversible { .. })
        ));

        let mut offset = posted(TransactionType::Deposit, TransactionStatus::Completed, Decimal::new(80, 0), 1);
        offset.reverses = Some(withdrawal.id);
        assert!(matches!(
            check_reversal(&checking, &offset),
            Err(LedgerError::NotReversible { .. })
        ));
    }

    #[test]
    fn test_reversal_offsets_do_not_count_toward_daily_total() {
        let mut offset = posted(TransactionType::Withdrawal, TransactionStatus::Completed, Decimal::new(500, 0), 4);
        offset.reverses = Some(TransactionId::new());
        let journal = vec![
            posted(TransactionType::Withdrawal, TransactionStatus::Completed, Decimal::new(20, 0), 4),
            offset,
        ];
        let day = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();

        assert_eq!(withdrawn_on(&journal, day), Decimal::new(20, 0));
    }
}
