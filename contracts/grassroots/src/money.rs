//! # Money
//!
//! Currency-tagged fixed-point amounts.
//!
//! A [`Money`] value is an integer count of the smallest unit of its
//! [`Currency`] (`units`), where the currency fixes how many of those digits
//! sit behind the decimal point. `25.0000 TLOS` is `250_000` units of
//! `4,TLOS`.
//!
//! Every binary operation checks that both operands carry the same currency
//! (code *and* precision) and fails with [`MoneyError::CurrencyMismatch`]
//! otherwise. Subtraction never produces a negative result.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest currency code accepted.
const MAX_CODE_LEN: usize = 7;

/// Largest precision accepted; keeps `10^precision` well inside `i128`.
const MAX_PRECISION: u8 = 18;

/// Errors raised by [`Money`] and [`Currency`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    #[error("arithmetic overflow")]
    Overflow,

    #[error("result would be negative: {0} - {1}")]
    Negative(Money, Money),

    #[error("malformed currency `{0}`")]
    MalformedCurrency(String),

    #[error("malformed amount `{0}`")]
    MalformedAmount(String),
}

/// A currency code plus its decimal precision, written `4,TLOS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency {
    code: [u8; MAX_CODE_LEN],
    len: u8,
    precision: u8,
}

impl Currency {
    /// Telos, four decimal places.
    pub const TLOS: Currency = Currency {
        code: *b"TLOS\0\0\0",
        len: 4,
        precision: 4,
    };

    pub fn new(code: &str, precision: u8) -> Result<Self, MoneyError> {
        let bytes = code.as_bytes();
        if bytes.is_empty()
            || bytes.len() > MAX_CODE_LEN
            || !bytes.iter().all(u8::is_ascii_uppercase)
            || precision > MAX_PRECISION
        {
            return Err(MoneyError::MalformedCurrency(format!("{precision},{code}")));
        }
        let mut buf = [0u8; MAX_CODE_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Currency {
            code: buf,
            len: bytes.len() as u8,
            precision,
        })
    }

    pub fn code(&self) -> &str {
        // Only ASCII uppercase bytes are ever stored.
        std::str::from_utf8(&self.code[..self.len as usize]).unwrap_or_default()
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    fn scale(&self) -> i128 {
        10i128.pow(u32::from(self.precision))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.precision, self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (precision, code) = s
            .split_once(',')
            .ok_or_else(|| MoneyError::MalformedCurrency(s.to_string()))?;
        let precision: u8 = precision
            .trim()
            .parse()
            .map_err(|_| MoneyError::MalformedCurrency(s.to_string()))?;
        Currency::new(code.trim(), precision)
    }
}

impl TryFrom<String> for Currency {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.to_string()
    }
}

/// A fixed-point amount of one [`Currency`], written `99.9000 TLOS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money {
    units: i128,
    currency: Currency,
}

impl Money {
    pub const fn new(units: i128, currency: Currency) -> Self {
        Money { units, currency }
    }

    pub const fn zero(currency: Currency) -> Self {
        Money { units: 0, currency }
    }

    /// Parse the canonical text form. The number of fractional digits must
    /// match the precision of `currency`.
    pub fn parse_in(text: &str, currency: Currency) -> Result<Self, MoneyError> {
        let money: Money = text.parse()?;
        money.ensure_currency(currency)?;
        Ok(money)
    }

    pub fn units(&self) -> i128 {
        self.units
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.units == 0
    }

    pub fn is_positive(&self) -> bool {
        self.units > 0
    }

    pub fn ensure_currency(&self, expected: Currency) -> Result<(), MoneyError> {
        if self.currency != expected {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: expected,
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        other.ensure_currency(self.currency)?;
        let units = self
            .units
            .checked_add(other.units)
            .ok_or(MoneyError::Overflow)?;
        Ok(Money::new(units, self.currency))
    }

    /// Subtract `other`, failing if the result would drop below zero.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        other.ensure_currency(self.currency)?;
        let units = self
            .units
            .checked_sub(other.units)
            .ok_or(MoneyError::Overflow)?;
        if units < 0 {
            return Err(MoneyError::Negative(*self, *other));
        }
        Ok(Money::new(units, self.currency))
    }

    /// `self >= other`, defined only for matching currencies.
    pub fn covers(&self, other: &Money) -> Result<bool, MoneyError> {
        other.ensure_currency(self.currency)?;
        Ok(self.units >= other.units)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = self.currency.scale();
        let sign = if self.units < 0 { "-" } else { "" };
        let abs = self.units.unsigned_abs();
        let whole = abs / scale as u128;
        let frac = abs % scale as u128;
        match self.currency.precision() {
            0 => write!(f, "{sign}{whole} {}", self.currency.code()),
            p => write!(
                f,
                "{sign}{whole}.{frac:0width$} {}",
                self.currency.code(),
                width = p as usize
            ),
        }
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MoneyError::MalformedAmount(s.to_string());

        let (amount, code) = s.trim().split_once(' ').ok_or_else(malformed)?;
        let (negative, amount) = match amount.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, amount),
        };
        let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
        if whole.is_empty()
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
            || (amount.contains('.') && frac.is_empty())
        {
            return Err(malformed());
        }

        let precision = u8::try_from(frac.len()).map_err(|_| malformed())?;
        let currency = Currency::new(code.trim(), precision)?;

        let digits = format!("{whole}{frac}");
        let mut units: i128 = digits.parse().map_err(|_| MoneyError::Overflow)?;
        if negative {
            units = -units;
        }
        Ok(Money::new(units, currency))
    }
}

impl TryFrom<String> for Money {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Money> for String {
    fn from(money: Money) -> Self {
        money.to_string()
    }
}
