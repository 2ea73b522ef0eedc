//! Unit Conversion Utilities
//!
//! Fixed-point conversions between satoshis, BTC, ETH and wei.
//! All arithmetic is exact; nothing here goes through `f64`.

use alloy_primitives::U256;
use rust_decimal::Decimal;
use thiserror::Error;

/// Satoshis per Bitcoin
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Decimal places of a BTC amount
pub const BTC_DECIMALS: u32 = 8;

/// Decimal places of an ETH-style token amount (wei)
pub const WEI_DECIMALS: u32 = 18;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitError {
    #[error("negative amount: {0}")]
    Negative(Decimal),

    #[error("amount overflows 256 bits")]
    Overflow,

    #[error("value {0} does not fit a decimal")]
    OutOfRange(U256),
}

/// Convert satoshis to a BTC amount with 8-decimal scale
pub fn sats_to_btc(sats: u64) -> Decimal {
    // 21e14 sats always fits an i64 mantissa
    Decimal::from_i128_with_scale(sats as i128, BTC_DECIMALS)
}

/// Convert an ETH amount into wei, truncating anything below 1 wei
pub fn eth_to_wei(eth: Decimal) -> Result<U256, UnitError> {
    scale_decimal(eth, U256::from(1u8), WEI_DECIMALS)
}

/// Multiply an integer amount by a decimal rate, rounding down
pub fn apply_rate(amount: U256, rate: Decimal) -> Result<U256, UnitError> {
    scale_decimal(rate, amount, 0)
}

/// Convert a contract integer into a decimal
pub fn u256_to_decimal(value: U256) -> Result<Decimal, UnitError> {
    let small = u128::try_from(value)
        .ok()
        .and_then(|v| i128::try_from(v).ok())
        .ok_or(UnitError::OutOfRange(value))?;
    Decimal::try_from_i128_with_scale(small, 0).map_err(|_| UnitError::OutOfRange(value))
}

/// Computes `floor(value * factor * 10^shift)` without losing precision.
fn scale_decimal(value: Decimal, factor: U256, shift: u32) -> Result<U256, UnitError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(UnitError::Negative(value));
    }

    let mantissa = U256::from(value.mantissa().unsigned_abs());
    let scale = value.scale();

    let numerator = mantissa.checked_mul(factor).ok_or(UnitError::Overflow)?;

    if shift >= scale {
        let multiplier = U256::from(10u8).pow(U256::from(shift - scale));
        numerator.checked_mul(multiplier).ok_or(UnitError::Overflow)
    } else {
        let divisor = U256::from(10u8).pow(U256::from(scale - shift));
        Ok(numerator / divisor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_sats_to_btc() {
        assert_eq!(sats_to_btc(0), Decimal::ZERO);
        assert_eq!(sats_to_btc(1), Decimal::from_str("0.00000001").unwrap());
        assert_eq!(sats_to_btc(100_000_000), Decimal::ONE);
        assert_eq!(sats_to_btc(15_000), Decimal::from_str("0.00015").unwrap());
    }

    #[test]
    fn test_eth_to_wei() {
        assert_eq!(
            eth_to_wei(Decimal::from_str("0.0015").unwrap()).unwrap(),
            U256::from(1_500_000_000_000_000u64)
        );
        assert_eq!(
            eth_to_wei(Decimal::from(3)).unwrap(),
            U256::from(3_000_000_000_000_000_000u128)
        );
        // Anything below one wei is dropped
        assert_eq!(
            eth_to_wei(Decimal::from_str("0.0000000000000000019").unwrap()).unwrap(),
            U256::from(1u8)
        );
    }

    #[test]
    fn test_negative_rejected() {
        assert!(matches!(
            eth_to_wei(Decimal::from(-1)),
            Err(UnitError::Negative(_))
        ));
    }

    #[test]
    fn test_apply_rate() {
        let wei = U256::from(1_500_000_000_000_000u64);
        assert_eq!(
            apply_rate(wei, Decimal::from(5)).unwrap(),
            U256::from(7_500_000_000_000_000u64)
        );
        assert_eq!(
            apply_rate(U256::from(10u8), Decimal::from_str("0.25").unwrap()).unwrap(),
            U256::from(2u8)
        );
    }

    #[test]
    fn test_u256_to_decimal() {
        assert_eq!(u256_to_decimal(U256::from(5u8)).unwrap(), Decimal::from(5));
        assert!(u256_to_decimal(U256::MAX).is_err());
    }
}
