/// Property-based tests for amount parsing and balance arithmetic
///
/// These tests verify that the two-decimal codec is lossless and that
/// applying a win followed by a matching loss restores the balance.
use balance_core::ledger::{LedgerError, TransactionState, calculate_new_balance};
use balance_core::{Amount, AmountError};
use proptest::prelude::*;

// Strategy to generate non-negative balances in cents, rendered as text
fn cents_strategy(max: u64) -> impl Strategy<Value = u64> {
    0u64..=max
}

fn render(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

fn from_cents(cents: u64) -> Amount {
    Amount::parse_balance(&render(cents)).unwrap()
}

proptest! {
    #[test]
    fn test_format_then_parse_is_identity(cents in cents_strategy(1_000_000_000_000)) {
        let amount = from_cents(cents);
        let text = amount.to_string();

        prop_assert_eq!(&text, &render(cents));
        prop_assert_eq!(Amount::parse_balance(&text).unwrap(), amount);
    }

    #[test]
    fn test_one_decimal_inputs_gain_trailing_zero(whole in 0u64..1_000_000, tenth in 0u64..10) {
        let amount = Amount::parse_balance(&format!("{whole}.{tenth}")).unwrap();
        prop_assert_eq!(amount.to_string(), format!("{whole}.{tenth}0"));
    }

    #[test]
    fn test_three_decimal_inputs_are_rejected(whole in 1u64..1_000_000, thousandths in 1u64..10) {
        let text = format!("{whole}.00{thousandths}");
        prop_assert_eq!(Amount::parse_transaction(&text), Err(AmountError::TooManyDecimalPlaces));
    }

    #[test]
    fn test_win_then_lose_restores_balance(
        balance in cents_strategy(10_000_000_000),
        delta in 1u64..=10_000_000_000,
    ) {
        let start = from_cents(balance);
        let amount = from_cents(delta);

        let after_win = calculate_new_balance(start, amount, TransactionState::Win).unwrap();
        prop_assert_eq!(after_win, from_cents(balance + delta));

        let after_lose = calculate_new_balance(after_win, amount, TransactionState::Lose).unwrap();
        prop_assert_eq!(after_lose, start);
    }

    #[test]
    fn test_lose_never_goes_negative(balance in cents_strategy(1_000_000), delta in 1u64..=2_000_000) {
        let result = calculate_new_balance(from_cents(balance), from_cents(delta), TransactionState::Lose);

        if delta > balance {
            let is_insufficient = matches!(result, Err(LedgerError::InsufficientBalance { .. }));
            prop_assert!(is_insufficient);
        } else {
            let new_balance = result.unwrap();
            prop_assert!(!new_balance.is_negative());
            prop_assert_eq!(new_balance, from_cents(balance - delta));
        }
    }
}
