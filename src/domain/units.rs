//! Base-unit arithmetic.
//!
//! Amounts travel through the crate as `U256` counts of the smallest
//! indivisible unit (wei, yoctoNEAR). Conversion from the human-facing
//! decimal form is exact string arithmetic; only fee multipliers and
//! cross-asset fee conversion go through `rust_decimal`.

use std::fmt;

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

use super::error::CurrencyError;

/// Smallest unit of a currency and its exponent relative to one whole unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseUnit {
    /// Unit name, e.g. "wei" or "yoctoNEAR".
    pub name: &'static str,
    /// Decimal exponent: one whole unit = 10^decimals base units.
    pub decimals: u8,
}

impl BaseUnit {
    pub const fn new(name: &'static str, decimals: u8) -> Self {
        Self { name, decimals }
    }

    /// Number of base units in one whole unit.
    pub fn factor(&self) -> U256 {
        U256::from(10u64).pow(U256::from(self.decimals))
    }

    /// Parse a decimal string ("1.5", "0.000001") into base units.
    ///
    /// Rejects negative values, more fractional digits than the unit
    /// supports, and anything that is not plain decimal notation.
    pub fn to_base_units(&self, amount: &str) -> Result<U256, CurrencyError> {
        let amount = amount.trim();
        let (whole, frac) = match amount.split_once('.') {
            Some((w, f)) => (w, f),
            None => (amount, ""),
        };

        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(CurrencyError::InvalidAmount(format!(
                "{amount:?} is not a decimal amount"
            )));
        }
        if frac.len() > self.decimals as usize {
            return Err(CurrencyError::InvalidAmount(format!(
                "{amount} has more than {} fractional digits ({})",
                self.decimals, self.name
            )));
        }

        let mut digits = String::with_capacity(whole.len() + self.decimals as usize);
        digits.push_str(whole);
        digits.push_str(frac);
        digits.extend(std::iter::repeat_n('0', self.decimals as usize - frac.len()));
        let digits = digits.trim_start_matches('0');
        if digits.is_empty() {
            return Ok(U256::ZERO);
        }

        U256::from_str_radix(digits, 10)
            .map_err(|e| CurrencyError::InvalidAmount(format!("{amount}: {e}")))
    }

    /// Render base units as a whole-unit decimal string without trailing zeros.
    pub fn format(&self, base_units: U256) -> String {
        let factor = self.factor();
        let whole = base_units / factor;
        let frac = base_units % factor;
        if frac.is_zero() {
            return whole.to_string();
        }
        let frac = format!("{:0>width$}", frac.to_string(), width = self.decimals as usize);
        format!("{whole}.{}", frac.trim_end_matches('0'))
    }
}

impl fmt::Display for BaseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (1e{})", self.name, self.decimals)
    }
}

/// Largest fee bump a configuration may ask for.
pub const MAX_FEE_BUMP: f64 = 10.0;

/// Scale a base-unit value by a positive multiplier, rounding up.
///
/// The multiplier is resolved to six decimal places, which is finer
/// than any fee bump a caller would configure.
pub fn apply_multiplier(value: U256, multiplier: f64) -> Result<U256, CurrencyError> {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(CurrencyError::InvalidAmount(format!(
            "fee multiplier must be positive, got {multiplier}"
        )));
    }
    let scaled = Decimal::from_f64(multiplier)
        .and_then(|m| m.checked_mul(Decimal::from(1_000_000u64)))
        .and_then(|m| m.round().to_u64())
        .ok_or_else(|| {
            CurrencyError::InvalidAmount(format!("fee multiplier {multiplier} out of range"))
        })?;

    let denom = U256::from(1_000_000u64);
    let numer = value
        .checked_mul(U256::from(scaled))
        .ok_or_else(|| CurrencyError::InvalidAmount("fee overflow".to_string()))?;
    Ok(numer.div_ceil(denom))
}

/// Convert a base-unit amount into a `Decimal` count of base units.
pub fn to_decimal(value: U256) -> Result<Decimal, CurrencyError> {
    Decimal::from_str(&value.to_string())
        .map_err(|e| CurrencyError::InvalidAmount(format!("{value} exceeds decimal range: {e}")))
}

/// Convert a non-negative `Decimal` back into base units, rounding up.
pub fn from_decimal(value: Decimal) -> Result<U256, CurrencyError> {
    if value.is_sign_negative() {
        return Err(CurrencyError::InvalidAmount(format!("negative amount {value}")));
    }
    let rounded = value.ceil().normalize();
    U256::from_str_radix(&rounded.to_string(), 10)
        .map_err(|e| CurrencyError::InvalidAmount(format!("{rounded}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const YOCTO: BaseUnit = BaseUnit::new("yoctoNEAR", 24);
    const WEI: BaseUnit = BaseUnit::new("wei", 18);

    #[test]
    fn test_one_unit_is_factor() {
        let one = YOCTO.to_base_units("1").unwrap();
        assert_eq!(one, U256::from(10u64).pow(U256::from(24u64)));
        assert_eq!(one, YOCTO.factor());
    }

    #[test]
    fn test_fractional_parse() {
        assert_eq!(
            WEI.to_base_units("0.5").unwrap(),
            U256::from(500_000_000_000_000_000u64)
        );
        assert_eq!(WEI.to_base_units(".25").unwrap(), U256::from(250_000_000_000_000_000u64));
        assert_eq!(WEI.to_base_units("0").unwrap(), U256::ZERO);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(WEI.to_base_units("-1").is_err());
        assert!(WEI.to_base_units("1e18").is_err());
        assert!(WEI.to_base_units("").is_err());
        assert!(WEI.to_base_units(".").is_err());
        assert!(BaseUnit::new("micro", 6).to_base_units("0.0000001").is_err());
    }

    #[test]
    fn test_format_trims_zeros() {
        assert_eq!(WEI.format(U256::from(1_500_000_000_000_000_000u64)), "1.5");
        assert_eq!(WEI.format(U256::from(1u64)), "0.000000000000000001");
        assert_eq!(WEI.format(U256::ZERO), "0");
    }

    #[test]
    fn test_apply_multiplier_rounds_up() {
        assert_eq!(apply_multiplier(U256::from(100u64), 1.5).unwrap(), U256::from(150u64));
        assert_eq!(apply_multiplier(U256::from(3u64), 1.1).unwrap(), U256::from(4u64));
        assert_eq!(apply_multiplier(U256::from(7u64), 1.0).unwrap(), U256::from(7u64));
        assert!(apply_multiplier(U256::from(7u64), 0.0).is_err());
        assert!(apply_multiplier(U256::from(7u64), f64::NAN).is_err());
    }

    #[test]
    fn test_huge_multiplier_is_out_of_range() {
        assert!(matches!(
            apply_multiplier(U256::from(100u64), 1e23),
            Err(CurrencyError::InvalidAmount(_))
        ));
        assert!(apply_multiplier(U256::from(100u64), f64::MAX).is_err());
    }

    #[test]
    fn test_decimal_round_trip_rounds_up() {
        let d = to_decimal(U256::from(42u64)).unwrap();
        assert_eq!(d, Decimal::from(42));
        let up = from_decimal(Decimal::new(4201, 2)).unwrap();
        assert_eq!(up, U256::from(43u64));
        assert!(from_decimal(Decimal::from(-1)).is_err());
    }
}
