//! Fixed-point conversion between raw on-chain integers and `Decimal`.
//!
//! Every amount read from a contract is a base-unit integer. It must be
//! rescaled by that token's own decimal count before any arithmetic.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use thiserror::Error;

/// Largest scale `rust_decimal` can represent.
pub const MAX_SCALE: u32 = 28;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitsError {
    #[error("value {0} does not fit in a decimal even with all fractional digits dropped")]
    Overflow(U256),
    #[error("scale {0} exceeds the maximum decimal scale of {MAX_SCALE}")]
    ScaleTooLarge(u32),
}

/// Convert a raw base-unit amount into a decimal with `decimals` places.
///
/// Amounts wider than the 96-bit decimal mantissa lose their lowest
/// fractional digits (truncated) until they fit. Only whole-token values
/// above `Decimal::MAX` are an error.
pub fn to_decimal(raw: U256, decimals: u32) -> Result<Decimal, UnitsError> {
    if decimals > MAX_SCALE {
        return Err(UnitsError::ScaleTooLarge(decimals));
    }

    let max_mantissa = U256::from(Decimal::MAX.mantissa().unsigned_abs());
    let ten = U256::from(10u8);
    let mut mantissa = raw;
    let mut scale = decimals;
    while mantissa > max_mantissa {
        if scale == 0 {
            return Err(UnitsError::Overflow(raw));
        }
        mantissa /= ten;
        scale -= 1;
    }

    let mantissa = u128::try_from(mantissa)
        .ok()
        .and_then(|v| i128::try_from(v).ok())
        .ok_or(UnitsError::Overflow(raw))?;
    let mut value = Decimal::try_from_i128_with_scale(mantissa, scale)
        .map_err(|_| UnitsError::Overflow(raw))?;
    value.normalize_assign();
    Ok(value)
}

/// Convert a basis-point value (1/10000) into a fraction.
pub fn basis_points(raw: U256) -> Result<Decimal, UnitsError> {
    to_decimal(raw, 4)
}

/// `10^decimals` as a raw amount, i.e. one whole token.
pub fn one_token(decimals: u32) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

/// Narrow a raw word to `u64` (epoch counters, timestamps, block numbers).
pub fn to_u64(raw: U256) -> Result<u64, UnitsError> {
    u64::try_from(raw).map_err(|_| UnitsError::Overflow(raw))
}
