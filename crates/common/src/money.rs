//! Monetary amounts.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Sales tax applied to the pre-discount item total (8%).
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

/// Money amount backed by a decimal to avoid floating point drift.
///
/// Intermediate values keep full precision; call [`Money::round2`] at the
/// points where a persisted figure is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a money amount from a decimal value.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Creates a money amount from an integer number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the underlying decimal.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Rounds half away from zero to two decimal places.
    pub fn round2(&self) -> Money {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Returns the sum, or `None` if it does not fit in a decimal.
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Returns the difference, or `None` if it does not fit in a decimal.
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Sums amounts, returning `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), Money::checked_add)
    }

    /// Returns `pct` percent of this amount, unrounded.
    pub fn percent(&self, pct: Decimal) -> Option<Money> {
        let rate = pct.checked_div(Decimal::ONE_HUNDRED)?;
        self.0.checked_mul(rate).map(Self)
    }

    /// Returns the tax owed on this amount, unrounded.
    pub fn tax(&self) -> Option<Money> {
        self.0.checked_mul(TAX_RATE).map(Self)
    }

    /// Returns true if the amounts differ by no more than `tolerance`.
    pub fn approx_eq(&self, other: Money, tolerance: Money) -> bool {
        self.0
            .checked_sub(other.0)
            .is_some_and(|diff| diff.abs() <= tolerance.0)
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.round2().0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}
