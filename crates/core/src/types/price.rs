//! Type-safe price representation using decimal arithmetic.
//!
//! The storefront API sends prices as decimal strings (`"1499.00"`) and
//! discounts as a whole-number percentage on the product's first offer.
//! Both are kept as [`Decimal`] so that discount arithmetic never goes
//! through floating point.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., pounds, not piastres).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price in the store's default currency.
    #[must_use]
    pub fn egp(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::EGP)
    }

    /// Apply a percentage discount, rounding half-up to two decimal places.
    ///
    /// A zero discount returns the price unchanged.
    #[must_use]
    pub fn discounted(self, discount: DiscountPercent) -> Self {
        if discount.is_zero() {
            return self;
        }

        let remaining = Decimal::ONE_HUNDRED - discount.value();
        let amount = (self.amount * remaining / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        Self {
            amount,
            currency_code: self.currency_code,
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency_code.code())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    EGP,
    USD,
    EUR,
}

impl CurrencyCode {
    /// The three-letter code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::EGP => "EGP",
            Self::USD => "USD",
            Self::EUR => "EUR",
        }
    }
}

/// A discount percentage, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DiscountPercent(Decimal);

impl DiscountPercent {
    /// No discount.
    pub const NONE: Self = Self(Decimal::ZERO);

    /// Build a discount, clamping the value into `0..=100`.
    #[must_use]
    pub fn clamped(value: Decimal) -> Self {
        Self(value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
    }

    /// The percentage value.
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }

    /// Whether this discount leaves the price unchanged.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for DiscountPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}
