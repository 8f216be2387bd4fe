//! Property tests for ledger invariants
//!
//! Random sequences of deposits and withdrawals against one checking account
//! must keep the balance equal to the journal, never negative, and feed the
//! solvency formula exactly.

use ledger_engine::config::EngineConfig;
use ledger_engine::core::TransactionService;
use ledger_engine::types::{
    Currency, LedgerError, Principal, TransactionFilter, TransactionStatus,
};
use proptest::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

#[derive(Debug, Clone)]
enum Movement {
    Deposit(i64),
    Withdrawal(i64),
}

fn movement() -> impl Strategy<Value = Movement> {
    // Cents up to 12,000.00 so some withdrawals cross the 10,000.00 limit
    prop_oneof![
        (1i64..1_200_000).prop_map(Movement::Deposit),
        (1i64..1_200_000).prop_map(Movement::Withdrawal),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn balance_matches_journal(movements in prop::collection::vec(movement(), 1..40)) {
        let service = TransactionService::new(EngineConfig::default());
        let customer = Principal::customer(1);
        let account = service
            .open_account(&customer, 1, Currency::usd(), None)
            .unwrap();

        let mut expected = Decimal::ZERO;
        for movement in &movements {
            let result = match *movement {
                Movement::Deposit(cents) => service.deposit(
                    &customer, account.id, Decimal::new(cents, 2), Currency::usd(), None,
                ),
                Movement::Withdrawal(cents) => service.withdraw(
                    &customer, account.id, Decimal::new(cents, 2), Currency::usd(), None,
                ),
            };
            match result {
                Ok(tx) => {
                    expected += tx.signed_amount();
                    prop_assert_eq!(tx.balance_after, expected);
                }
                Err(LedgerError::InsufficientFunds { balance, .. }) => {
                    prop_assert_eq!(balance, expected);
                }
                Err(LedgerError::TransactionLimitExceeded { .. }) => {}
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
            prop_assert!(expected >= Decimal::ZERO);
        }

        let balance = service.account(&customer, account.id).unwrap().balance;
        prop_assert_eq!(balance, expected);

        let filter = TransactionFilter { limit: usize::MAX, ..TransactionFilter::default() };
        let history = service
            .account_transactions(&customer, account.id, &filter)
            .unwrap();
        let journal: Decimal = history
            .items
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Completed)
            .map(|tx| tx.signed_amount())
            .sum();
        prop_assert_eq!(journal, balance);
        prop_assert_eq!(history.total, history.items.len());
    }

    #[test]
    fn usable_funds_follow_movements(
        deposits in prop::collection::vec(1i64..1_000_000, 1..10),
        withdraw_share in 0u32..=100,
    ) {
        let config = EngineConfig::default();
        let service = TransactionService::new(config.clone());
        let customer = Principal::customer(7);
        let account = service
            .open_account(&customer, 7, Currency::usd(), None)
            .unwrap();

        let mut on_hand = config.bank.initial_capital;
        for cents in deposits {
            let amount = Decimal::new(cents, 2);
            service
                .deposit(&customer, account.id, amount, Currency::usd(), None)
                .unwrap();
            on_hand += amount;

            let withdrawal = (amount * Decimal::from(withdraw_share) / Decimal::from(100))
                .round_dp_with_strategy(2, RoundingStrategy::ToZero);
            if withdrawal > Decimal::ZERO {
                service
                    .withdraw(&customer, account.id, withdrawal, Currency::usd(), None)
                    .unwrap();
                on_hand -= withdrawal;
            }
        }

        let expected = (on_hand * config.bank.reserve_ratio)
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);
        prop_assert_eq!(service.usable_funds().unwrap(), expected);

        let position = service.bank_position(&Principal::admin()).unwrap();
        prop_assert_eq!(position.funds_on_hand, on_hand);
        prop_assert_eq!(
            position.customer_deposits,
            on_hand - config.bank.initial_capital
        );
    }
}
