//! Value Objects for carts and orders

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// Money value object, stored as integer minor currency units (cents).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(amount: i64) -> Self { Self(amount) }
    pub fn minor(&self) -> i64 { self.0 }
    pub fn is_zero(&self) -> bool { self.0 == 0 }

    pub fn as_decimal(&self) -> Decimal { Decimal::from(self.0) }

    /// Truncates toward negative infinity to whole minor units.
    pub fn floor(amount: Decimal) -> Result<Self, MoneyError> {
        use rust_decimal::prelude::ToPrimitive;
        amount.floor().to_i64().map(Self).ok_or(MoneyError::Overflow)
    }

    pub fn checked_add(self, rhs: Money) -> Result<Money, MoneyError> {
        self.0.checked_add(rhs.0).map(Money).ok_or(MoneyError::Overflow)
    }

    pub fn multiply(&self, qty: i32) -> Result<Money, MoneyError> {
        self.0.checked_mul(i64::from(qty)).map(Money).ok_or(MoneyError::Overflow)
    }

    /// Integer division by a positive quantity, rounding down.
    pub fn per_unit(&self, qty: i32) -> Result<Money, MoneyError> {
        if qty <= 0 { return Err(MoneyError::InvalidDivisor); }
        Ok(Money(self.0.div_euclid(i64::from(qty))))
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0 + rhs.0) }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money { Money(self.0 - rhs.0) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, Add::add) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { Overflow, InvalidDivisor }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Overflow => write!(f, "Amount overflow"), Self::InvalidDivisor => write!(f, "Invalid divisor") }
    }
}

/// Percentage discount, 0 to 100 inclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "Decimal", into = "Decimal")]
#[sqlx(transparent)]
pub struct DiscountRate(Decimal);

impl DiscountRate {
    pub const NONE: DiscountRate = DiscountRate(Decimal::ZERO);

    pub fn new(percent: Decimal) -> Result<Self, RateError> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED { return Err(RateError::OutOfRange); }
        Ok(Self(percent))
    }
    pub fn percent(&self) -> Decimal { self.0 }

    /// Fraction of the price that remains after the discount.
    pub fn remaining(&self) -> Decimal { (Decimal::ONE_HUNDRED - self.0) / Decimal::ONE_HUNDRED }
}

impl TryFrom<Decimal> for DiscountRate {
    type Error = RateError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<DiscountRate> for Decimal {
    fn from(rate: DiscountRate) -> Decimal { rate.0 }
}

/// Tax rate as a non-negative fraction (0.18 is 18%).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaxRate(Decimal);

impl TaxRate {
    pub const ZERO: TaxRate = TaxRate(Decimal::ZERO);

    pub fn new(fraction: Decimal) -> Result<Self, RateError> {
        if fraction < Decimal::ZERO { return Err(RateError::OutOfRange); }
        Ok(Self(fraction))
    }
    pub fn fraction(&self) -> Decimal { self.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum RateError { OutOfRange }
impl std::error::Error for RateError {}
impl fmt::Display for RateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Rate out of range") }
}
