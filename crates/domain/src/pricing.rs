//! Order total computation.

use common::{Money, Order};
use rust_decimal::Decimal;

use crate::error::{DomainError, Result};

/// Largest difference tolerated between client-supplied and computed totals.
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Monetary fields of an order, derived from its line subtotals.
///
/// Tax is charged on the pre-discount sum; the discount only lowers
/// `total_price`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub before_discount: Money,
    pub discount: Money,
    pub total_price: Money,
    pub tax: Money,
    pub grand_total: Money,
}

impl OrderTotals {
    /// Computes the totals, or `None` if any figure overflows.
    pub fn from_subtotals<I>(subtotals: I, discount_in_percentage: Option<Decimal>) -> Option<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        let before_discount = Money::checked_sum(subtotals)?;
        let discount = match discount_in_percentage {
            Some(pct) => before_discount.percent(pct)?,
            None => Money::zero(),
        };
        let tax = before_discount.tax()?.round2();
        let total_price = before_discount.checked_sub(discount)?.round2();
        let grand_total = total_price.checked_add(tax)?.round2();

        Some(Self {
            before_discount,
            discount,
            total_price,
            tax,
            grand_total,
        })
    }

    /// Recomputes the totals of an order from its current lines and discount.
    pub fn for_order(order: &Order) -> Result<Self> {
        Self::from_subtotals(
            order.items.iter().map(|line| line.subtotal),
            order.discount_in_percentage,
        )
        .ok_or_else(|| DomainError::validation("items", "order amounts are too large"))
    }

    /// Writes the totals into an order.
    pub fn apply_to(&self, order: &mut Order) {
        order.total_price = self.total_price;
        order.tax = self.tax;
        order.grand_total = self.grand_total;
    }

    /// Names the first of `(totalPrice, tax, grandTotal)` that differs from
    /// this computation by more than [`MONEY_TOLERANCE`].
    pub fn first_mismatch(
        &self,
        total_price: Money,
        tax: Money,
        grand_total: Money,
    ) -> Option<(&'static str, Money)> {
        let tolerance = Money::new(MONEY_TOLERANCE);
        [
            ("totalPrice", total_price, self.total_price),
            ("tax", tax, self.tax),
            ("grandTotal", grand_total, self.grand_total),
        ]
        .into_iter()
        .find(|(_, supplied, computed)| !supplied.approx_eq(*computed, tolerance))
        .map(|(field, _, computed)| (field, computed))
    }
}
