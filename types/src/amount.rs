//! Token amount types.
//!
//! Amounts are fixed-point integers in the asset's smallest unit to avoid
//! floating-point errors. The native asset has 6 decimal places (1 ALGO =
//! 1_000_000 microAlgos).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypesError;

/// Native-asset amount in microAlgos.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MicroAlgos(u64);

impl MicroAlgos {
    pub const ZERO: Self = Self(0);

    /// Decimal places of the native asset.
    pub const DECIMALS: u32 = 6;

    /// Smallest transfer the network accepts (0.001 ALGO).
    pub const MIN_TRANSFER: Self = Self(1_000);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse a decimal ALGO string such as `"5"` or `"0.25"`.
    pub fn from_algos_str(s: &str) -> Result<Self, TypesError> {
        parse_decimal(s, Self::DECIMALS).map(Self)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for MicroAlgos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ALGO", format_decimal(self.0, Self::DECIMALS, Self::DECIMALS))
    }
}

/// A raw balance of an arbitrary asset together with its decimal places.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    pub raw: u64,
    pub decimals: u32,
}

impl AssetAmount {
    pub fn new(raw: u64, decimals: u32) -> Self {
        Self { raw, decimals }
    }

    /// Balance in whole units: `raw / 10^decimals`.
    pub fn as_units(&self) -> f64 {
        self.raw as f64 / 10f64.powi(self.decimals as i32)
    }

    /// Display string with at most two fraction digits.
    pub fn display(&self) -> String {
        format_decimal(self.raw, self.decimals, self.decimals.min(2))
    }
}

/// Parse a non-negative decimal string into an integer of `decimals` fixed places.
///
/// Accepts `"12"`, `"12.5"` and `".5"`. Signs, exponents, separators and empty
/// input are rejected.
pub fn parse_decimal(s: &str, decimals: u32) -> Result<u64, TypesError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TypesError::InvalidAmount("empty amount".to_string()));
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(TypesError::InvalidAmount(s.to_string()));
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TypesError::InvalidAmount(s.to_string()));
    }
    if frac_part.len() > decimals as usize {
        return Err(TypesError::TooManyDecimals { max: decimals });
    }

    let scale = 10u64
        .checked_pow(decimals)
        .ok_or_else(|| TypesError::InvalidAmount(format!("unsupported precision {decimals}")))?;
    let whole: u64 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| TypesError::InvalidAmount(s.to_string()))?
    };

    let mut frac: u64 = 0;
    if !frac_part.is_empty() {
        let padding = decimals as usize - frac_part.len();
        frac = frac_part
            .parse::<u64>()
            .map_err(|_| TypesError::InvalidAmount(s.to_string()))?
            * 10u64.pow(padding as u32);
    }

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| TypesError::InvalidAmount(format!("{s} is too large")))
}

/// Render `raw / 10^decimals` with exactly `shown` fraction digits (truncating).
pub fn format_decimal(raw: u64, decimals: u32, shown: u32) -> String {
    let shown = shown.min(decimals);
    // A scale past u128 exceeds any u64 amount, so both parts are zero.
    let (whole, frac) = match 10u128.checked_pow(decimals) {
        Some(scale) => {
            let raw = u128::from(raw);
            (raw / scale, raw % scale / 10u128.pow(decimals - shown))
        }
        None => (0, 0),
    };
    if shown == 0 {
        return whole.to_string();
    }
    format!("{}.{:0width$}", whole, frac, width = shown as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whole_and_fractional() {
        assert_eq!(parse_decimal("5", 6).unwrap(), 5_000_000);
        assert_eq!(parse_decimal("0.25", 6).unwrap(), 250_000);
        assert_eq!(parse_decimal(".5", 6).unwrap(), 500_000);
        assert_eq!(parse_decimal("1.000001", 6).unwrap(), 1_000_001);
        assert_eq!(parse_decimal(" 2 ", 6).unwrap(), 2_000_000);
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "   ", "abc", "-1", "+1", "1e3", "1.2.3", ".", "1,5", "NaN"] {
            assert!(parse_decimal(bad, 6).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn parse_rejects_excess_precision() {
        assert_eq!(
            parse_decimal("0.0000001", 6),
            Err(TypesError::TooManyDecimals { max: 6 })
        );
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!(parse_decimal("99999999999999999999", 6).is_err());
    }

    #[test]
    fn zero_parses_but_is_zero() {
        assert!(MicroAlgos::from_algos_str("0").unwrap().is_zero());
        assert!(MicroAlgos::from_algos_str("0.000").unwrap().is_zero());
    }

    #[test]
    fn format_handles_extreme_precision() {
        assert_eq!(format_decimal(u64::MAX, 19, 2), "1.84");
        assert_eq!(format_decimal(u64::MAX, 38, 2), "0.00");
        assert_eq!(format_decimal(1, 40, 2), "0.00");
        assert_eq!(AssetAmount::new(1, 40).display(), "0.00");
    }

    #[test]
    fn display_native() {
        assert_eq!(MicroAlgos::new(1_500_000).to_string(), "1.500000 ALGO");
    }

    #[test]
    fn asset_display_caps_fraction_digits() {
        assert_eq!(AssetAmount::new(12_345_678, 6).display(), "12.34");
        assert_eq!(AssetAmount::new(1_234, 1).display(), "123.4");
        assert_eq!(AssetAmount::new(42, 0).display(), "42");
    }

    #[test]
    fn asset_as_units() {
        let amount = AssetAmount::new(2_500_000, 6);
        assert!((amount.as_units() - 2.5).abs() < f64::EPSILON);
    }
}
