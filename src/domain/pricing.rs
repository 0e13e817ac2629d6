//! Cart aggregation: line totals, subtotal, discount, tax and total.
//!
//! All arithmetic is done on integer minor units. Percentages are applied through
//! [`rust_decimal::Decimal`] and the result is floored back to whole minor units, so the same
//! items always produce the same totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::CartItem;
use crate::domain::value_objects::{DiscountRate, Money, MoneyError, TaxRate};

/// Cart-level monetary aggregates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    /// Sum of `quantity * snapshot_price` before discounts.
    pub subtotal: Money,
    /// `subtotal` minus the sum of discounted line totals.
    pub discount: Money,
    pub tax: Money,
    /// `subtotal - discount + tax`.
    pub total: Money,
}

/// `floor(quantity * unit_price * (100 - discount_rate) / 100)`.
pub fn line_total(quantity: i32, unit_price: Money, rate: DiscountRate) -> Result<Money, MoneyError> {
    let gross = unit_price.multiply(quantity)?;
    let kept = Decimal::ONE_HUNDRED - rate.percent();
    let discounted = gross
        .as_decimal()
        .checked_mul(kept)
        .ok_or(MoneyError::Overflow)?
        / Decimal::ONE_HUNDRED;
    Money::floor(discounted)
}

/// Line total of an item as currently stored in the cart.
pub fn item_total(item: &CartItem) -> Result<Money, MoneyError> {
    line_total(item.quantity, item.snapshot_price, item.discount_rate)
}

/// Post-discount price of a single unit, rounded down.
///
/// `quantity * effective_unit_price` can fall short of [`item_total`] by less than one minor
/// unit per item; order totals are taken from the cart aggregates, which keep that remainder.
pub fn effective_unit_price(item: &CartItem) -> Result<Money, MoneyError> {
    item_total(item)?.per_unit(item.quantity)
}

/// Computes the aggregates of a set of cart lines.
pub fn aggregate(items: &[CartItem], tax_rate: TaxRate) -> Result<CartTotals, MoneyError> {
    let mut subtotal = Money::ZERO;
    let mut discounted = Money::ZERO;

    for item in items {
        subtotal = subtotal.checked_add(item.snapshot_price.multiply(item.quantity)?)?;
        discounted = discounted.checked_add(item_total(item)?)?;
    }

    let discount = subtotal - discounted;
    let taxable = subtotal - discount;
    let tax = Money::floor(
        taxable
            .as_decimal()
            .checked_mul(tax_rate.fraction())
            .ok_or(MoneyError::Overflow)?,
    )?;
    let total = taxable.checked_add(tax)?;

    Ok(CartTotals { subtotal, discount, tax, total })
}
