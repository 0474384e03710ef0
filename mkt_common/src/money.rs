use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "usd";
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

const PERCENT_SCALE: i64 = 10_000;
const MONEY_DECIMALS: u32 = 2;
const PERCENT_DECIMALS: u32 = 4;

//--------------------------------------       Money         ---------------------------------------------------------
/// A fixed-point amount of money with two decimal places, stored as an integer number of minor units (cents).
///
/// Every computation that produces a fractional amount of minor units (percentages, parsing decimal strings with more
/// than two decimals) rounds half away from zero, so `round2(x)` is implicit in every `Money` value.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Value cannot be represented as an amount of money: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let major = abs / MINOR_UNITS_PER_MAJOR as u64;
        let minor = abs % MINOR_UNITS_PER_MAJOR as u64;
        write!(f, "{sign}{major}.{minor:02}")
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses a decimal string such as `"12"`, `"12.5"` or `"-0.125"`. Extra decimals are rounded half away from zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = parse_decimal(s)?;
        let minor = scale_to_integer(value, MONEY_DECIMALS, MINOR_UNITS_PER_MAJOR)
            .ok_or_else(|| MoneyConversionError(format!("{s} is out of range")))?;
        Ok(Self(minor))
    }
}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor_units(value: i64) -> Self {
        Self(value)
    }

    pub fn from_major_units(value: i64) -> Self {
        Self(value * MINOR_UNITS_PER_MAJOR)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Floors the amount at zero.
    pub fn non_negative(self) -> Self {
        if self.0 < 0 {
            Self::ZERO
        } else {
            self
        }
    }

    /// Clamps the amount into `[min, max]`. Unlike [`Ord::clamp`], this never panics; if `min > max` the lower bound
    /// wins.
    pub fn clamp_between(self, min: Money, max: Money) -> Self {
        if self < min {
            min
        } else if self > max {
            max.max(min)
        } else {
            self
        }
    }

    pub fn abs_diff(self, other: Money) -> Money {
        Self(self.0.abs_diff(other.0) as i64)
    }

    /// `round2(self * percent)`
    pub fn percent_of(self, percent: Percent) -> Money {
        let minor = self
            .to_decimal()
            .checked_mul(percent.to_decimal())
            .and_then(|product| scale_to_integer(product, MONEY_DECIMALS, MINOR_UNITS_PER_MAJOR))
            .unwrap_or(i64::MAX);
        Self(minor)
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, MONEY_DECIMALS)
    }

    pub fn checked_mul(self, quantity: i64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Self)
    }
}

//--------------------------------------      Percent        ---------------------------------------------------------
/// A fraction with four decimal places of precision, e.g. `0.10` for ten percent. Stored as parts per ten thousand.
#[derive(Debug, Clone, Copy, Default, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Percent(i64);

impl Percent {
    pub const fn from_basis_points(bps: i64) -> Self {
        Self(bps)
    }

    pub fn basis_points(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, PERCENT_DECIMALS)
    }
}

impl Display for Percent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}%", abs / 100, abs % 100)
    }
}

impl FromStr for Percent {
    type Err = MoneyConversionError;

    /// Accepts fractions (`"0.1"`) or percentages with a trailing `%` (`"10%"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let value = match s.strip_suffix('%') {
            Some(body) => parse_decimal(body)? / Decimal::ONE_HUNDRED,
            None => parse_decimal(s)?,
        };
        let bps = scale_to_integer(value, PERCENT_DECIMALS, PERCENT_SCALE)
            .ok_or_else(|| MoneyConversionError(format!("{s} is out of range")))?;
        Ok(Self(bps))
    }
}

//--------------------------------------      helpers        ---------------------------------------------------------

/// Rounds `value` half away from zero to `decimals` places and returns it as an integer count of `1 / scale` units.
/// Returns `None` if the result does not fit in an `i64`.
fn scale_to_integer(value: Decimal, decimals: u32, scale: i64) -> Option<i64> {
    value
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::from(scale))?
        .to_i64()
}

fn parse_decimal(s: &str) -> Result<Decimal, MoneyConversionError> {
    let s = s.trim();
    Decimal::from_str(s).map_err(|e| MoneyConversionError(format!("'{s}' is not a decimal number. {e}")))
}

#[cfg(test)]
mod test {
    use super::*;

    fn m(s: &str) -> Money {
        s.parse().expect("valid amount")
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(m("12").value(), 1200);
        assert_eq!(m("12.5").to_string(), "12.50");
        assert_eq!(m("0.07").to_string(), "0.07");
        assert_eq!(m("-3.10").to_string(), "-3.10");
        assert_eq!(m(" 7.25 ").value(), 725);
        assert!("abc".parse::<Money>().is_err());
        assert!("1.2.3".parse::<Money>().is_err());
        assert!("".parse::<Money>().is_err());
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(m("0.125").value(), 13);
        assert_eq!(m("-0.125").value(), -13);
        assert_eq!(m("0.124").value(), 12);
        // 2.675 is not representable as a binary float, but is exact here
        assert_eq!(m("2.675").value(), 268);
        assert_eq!(m("0.005").value(), 1);
        assert_eq!(m("-0.005").value(), -1);
        assert_eq!(m("0.0049").value(), 0);
        assert!("99999999999999999999.00".parse::<Money>().is_err());
    }

    #[test]
    fn percentages() {
        let ten: Percent = "0.10".parse().unwrap();
        assert_eq!(ten.basis_points(), 1000);
        assert_eq!("10%".parse::<Percent>().unwrap(), ten);
        assert_eq!(m("100.00").percent_of(ten), m("10.00"));
        let twenty: Percent = "0.2".parse().unwrap();
        assert_eq!(m("60").percent_of(twenty), m("12.00"));
        // 0.05 * 0.10 = 0.005 -> 0.01
        assert_eq!(m("0.05").percent_of(ten), m("0.01"));
        assert_eq!(m("0.04").percent_of(ten), Money::ZERO);
        assert_eq!(ten.to_string(), "10.00%");
        assert_eq!("12.5%".parse::<Percent>().unwrap().basis_points(), 1250);
        assert_eq!("0.33335".parse::<Percent>().unwrap().basis_points(), 3334);
        assert_eq!(m("100.00").percent_of(Percent::from_basis_points(1250)), m("12.50"));
        assert_eq!(Money::from_minor_units(i64::MAX).percent_of(Percent::from_basis_points(20_000)).value(), i64::MAX);
    }

    #[test]
    fn clamping() {
        let lo = m("10");
        let hi = m("100");
        assert_eq!(m("5").clamp_between(lo, hi), lo);
        assert_eq!(m("500").clamp_between(lo, hi), hi);
        assert_eq!(m("50").clamp_between(lo, hi), m("50"));
        // inverted bounds never panic
        assert_eq!(m("50").clamp_between(hi, lo), hi);
        assert_eq!(m("-1").non_negative(), Money::ZERO);
    }

    #[test]
    fn differences() {
        assert_eq!(m("1.00").abs_diff(m("3.50")), m("2.50"));
        assert_eq!(m("900.00").abs_diff(m("899.99")), Money::from_minor_units(1));
        assert_eq!(m("20.00").checked_mul(5), Some(m("100.00")));
        assert_eq!(Money::from_minor_units(i64::MAX).checked_mul(2), None);
    }

    #[test]
    fn serializes_as_minor_units() {
        let json = serde_json::to_string(&m("12.34")).unwrap();
        assert_eq!(json, "1234");
    }
}
