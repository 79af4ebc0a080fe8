//! Money primitives. Amounts are i64 micro-units (10^-6 of a whole token)
//! so that split arithmetic stays exact; one micro-unit is the "minimal
//! unit" of the rounding invariants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// The closed set of settlement currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    QToken,
    Pi,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::QToken => "QToken",
            Currency::Pi => "PI",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A monetary amount in micro-units of its currency.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Amount(i64);

pub const MICROS_PER_UNIT: i64 = 1_000_000;

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Whole-unit constructor for configuration tables and tests.
    pub fn from_units(units: i64) -> Self {
        Self(units * MICROS_PER_UNIT)
    }

    /// Lossy decimal constructor; rounds half away from zero to the nearest
    /// micro-unit.
    pub fn from_f64(value: f64) -> Self {
        Self((value * MICROS_PER_UNIT as f64).round() as i64)
    }

    pub fn as_micros(&self) -> i64 {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / MICROS_PER_UNIT as f64
    }

    /// Whole units, truncated toward zero. Used by governance weight rules.
    pub fn whole_units(&self) -> i64 {
        self.0 / MICROS_PER_UNIT
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Multiply by a fraction, rounding half away from zero to the nearest
    /// micro-unit.
    pub fn mul_fraction(self, fraction: f64) -> Amount {
        let product = self.0 as f64 * fraction;
        Amount(product.round() as i64)
    }

    /// Absolute difference in micro-units, for rounding-tolerance checks.
    pub fn abs_diff(self, other: Amount) -> i64 {
        (self.0 - other.0).abs()
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / MICROS_PER_UNIT as u64;
        let frac = abs % MICROS_PER_UNIT as u64;
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let text = format!("{frac:06}");
            write!(f, "{sign}{whole}.{}", text.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_and_display() {
        assert_eq!(Amount::from_units(3).as_micros(), 3_000_000);
        assert_eq!(Amount::from_f64(2.5).as_micros(), 2_500_000);
        assert_eq!(Amount::from_f64(0.625).to_string(), "0.625");
        assert_eq!(Amount::from_units(-4).to_string(), "-4");
    }

    #[test]
    fn fraction_multiplication_rounds_to_micro() {
        let price = Amount::from_units(100);
        assert_eq!(price.mul_fraction(0.025), Amount::from_f64(2.5));
        assert_eq!(price.mul_fraction(0.65), Amount::from_units(65));
    }

    #[test]
    fn whole_units_truncate() {
        assert_eq!(Amount::from_f64(41.9).whole_units(), 41);
        assert_eq!(Amount::from_f64(0.2).whole_units(), 0);
    }

    #[test]
    fn checked_arithmetic_guards_overflow() {
        let max = Amount::from_micros(i64::MAX);
        assert!(max.checked_add(Amount::from_micros(1)).is_none());
        assert_eq!(
            Amount::from_units(5).checked_sub(Amount::from_units(2)),
            Some(Amount::from_units(3))
        );
    }
}
