//! Fixed-point monetary amounts with exactly two decimal places.
//!
//! Input strings are checked syntactically before any numeric conversion, so
//! `"10.123"` is rejected even though it would round to a valid two-digit
//! value. Formatting rounds half away from zero at the third digit.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reasons a monetary string is rejected.
///
/// The `Display` text is the client-facing sub-reason reported with
/// `invalid_amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is required")]
    Empty,

    #[error("invalid amount format")]
    InvalidFormat,

    #[error("amount must be positive")]
    NotPositive,

    #[error("amount cannot be negative")]
    Negative,

    #[error("amount can have at most 2 decimal places")]
    TooManyDecimalPlaces,

    #[error("amount exceeds the maximum supported value")]
    OutOfRange,
}

/// A monetary value held at scale 2.
///
/// # Examples
///
/// ```
/// use balance_core::Amount;
///
/// let amount = Amount::parse_transaction("5.5").unwrap();
/// assert_eq!(amount.to_string(), "5.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// Number of fractional digits every amount carries.
    pub const SCALE: u32 = 2;

    /// Integer digits a stored value may carry, matching `NUMERIC(20, 2)`.
    pub const MAX_INTEGER_DIGITS: usize = 18;

    pub const ZERO: Self = Amount(Decimal::ZERO);

    /// Parses a transaction amount: a numeric literal greater than zero with
    /// at most two fractional digits.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// empty, format, sign, precision, range.
    pub fn parse_transaction(text: &str) -> Result<Self, AmountError> {
        let literal = Literal::scan(text)?;
        if literal.negative || literal.is_zero() {
            return Err(AmountError::NotPositive);
        }
        literal.into_amount()
    }

    /// Parses a stored balance. Zero is allowed, negative values are not.
    pub fn parse_balance(text: &str) -> Result<Self, AmountError> {
        let literal = Literal::scan(text)?;
        if literal.negative && !literal.is_zero() {
            return Err(AmountError::Negative);
        }
        literal.into_amount()
    }

    /// Rounds an arbitrary decimal to two places, half away from zero.
    pub fn from_decimal(value: Decimal) -> Self {
        let mut rounded = value.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(Self::SCALE);
        if rounded.is_zero() {
            rounded.set_sign_positive(true);
        }
        Amount(rounded)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns `None` when the sum exceeds [`Amount::MAX_INTEGER_DIGITS`].
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self::from_decimal).filter(Amount::in_range)
    }

    /// Returns `None` when the difference exceeds [`Amount::MAX_INTEGER_DIGITS`].
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self::from_decimal).filter(Amount::in_range)
    }

    fn in_range(&self) -> bool {
        self.0.abs().trunc() < Decimal::from(10u64.pow(Self::MAX_INTEGER_DIGITS as u32))
    }
}

/// Renders a decimal with exactly two fractional digits.
///
/// `10.995` formats as `"11.00"` and `10.994` as `"10.99"`.
pub fn format_amount(value: Decimal) -> String {
    Amount::from_decimal(value).to_string()
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse_balance(s)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::parse_balance(&s).map_err(serde::de::Error::custom)
    }
}

/// A syntactically valid decimal literal, kept as the digits it was written
/// with so sign, precision and range are judged on the input text.
struct Literal<'a> {
    negative: bool,
    integer: &'a str,
    fraction: &'a str,
}

impl<'a> Literal<'a> {
    /// Accepts `[+-]digits[.digits]`, `[+-]digits.` and `[+-].digits`.
    fn scan(text: &'a str) -> Result<Self, AmountError> {
        if text.is_empty() {
            return Err(AmountError::Empty);
        }

        let (negative, unsigned) = match text.as_bytes()[0] {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };

        let (integer, fraction) = match unsigned.split_once('.') {
            Some((integer, fraction)) => (integer, fraction),
            None => (unsigned, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(integer) || !all_digits(fraction) || (integer.is_empty() && fraction.is_empty()) {
            return Err(AmountError::InvalidFormat);
        }

        Ok(Literal {
            negative,
            integer,
            fraction,
        })
    }

    fn is_zero(&self) -> bool {
        self.integer.bytes().chain(self.fraction.bytes()).all(|b| b == b'0')
    }

    fn into_amount(self) -> Result<Amount, AmountError> {
        if self.fraction.len() > Amount::SCALE as usize {
            return Err(AmountError::TooManyDecimalPlaces);
        }
        if self.integer.trim_start_matches('0').len() > Amount::MAX_INTEGER_DIGITS {
            return Err(AmountError::OutOfRange);
        }

        let canonical = format!(
            "{}{}.{}",
            if self.negative { "-" } else { "" },
            if self.integer.is_empty() { "0" } else { self.integer },
            if self.fraction.is_empty() { "0" } else { self.fraction },
        );
        let value = Decimal::from_str(&canonical).map_err(|_| AmountError::InvalidFormat)?;
        Ok(Amount::from_decimal(value))
    }
}
