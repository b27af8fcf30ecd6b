//! Integer money for card prices.
//!
//! All quote amounts are held as USD cents (currency minor units). Providers
//! report prices either as dollar floats (TCGplayer), euro floats (Cardmarket)
//! or integer cents (PriceCharting); conversion happens once, at extraction.
//!
//! ```rust
//! use card_arb_core::utils::money::Money;
//!
//! let buy = Money::from_dollars(8.00);
//! let sell = Money::from_cents(1000);
//! assert_eq!((sell - buy).cents(), 200);
//! assert_eq!((sell - buy).to_string(), "$2.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Money value stored as cents (i64).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Create from cents directly (no conversion)
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Create from dollars (rounds to nearest cent)
    #[inline]
    pub fn from_dollars(dollars: f64) -> Self {
        Self {
            cents: (dollars * 100.0).round() as i64,
        }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { cents: 0 }
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.cents
    }

    /// Value as dollars, for display and the API boundary only
    #[inline]
    pub fn as_dollars(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Convert into another currency at `rate` units per unit of this one,
    /// rounding to the nearest cent.
    ///
    /// Used for Cardmarket EUR prices: `eur.convert(1.10)` gives USD.
    pub fn convert(self, rate: f64) -> Self {
        Self {
            cents: (self.cents as f64 * rate).round() as i64,
        }
    }

    /// Apply a fractional fee, e.g. `0.15` keeps 85% of the value.
    pub fn less_fee(self, fee_rate: f64) -> Self {
        self.convert(1.0 - fee_rate)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            cents: self.cents + other.cents,
        }
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            cents: self.cents - other.cents,
        }
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            cents: -self.cents,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cents < 0 {
            write!(f, "-${:.2}", (-self.cents) as f64 / 100.0)
        } else {
            write!(f, "${:.2}", self.cents as f64 / 100.0)
        }
    }
}

/// Round a float to two decimals (dollars, or a percentage for display)
pub fn round_to_cents(dollars: f64) -> f64 {
    (dollars * 100.0).round() / 100.0
}

/// Profit as a percentage of cost (e.g. 25.0 for 25%).
pub fn margin_percentage(profit: Money, cost: Money) -> f64 {
    if cost.cents == 0 {
        return 0.0;
    }
    (profit.cents as f64 / cost.cents as f64) * 100.0
}
