//! Lossless scaling between human-facing decimal amounts and token base
//! units.
//!
//! Deposits and withdrawals are entered as decimal USDC amounts but
//! submitted onchain as integer base units (6 decimals for USDC). Scaling
//! never rounds: excess fractional digits are an error, not a truncation.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount must be positive, got {amount}")]
    NotPositive { amount: Decimal },
    #[error("{amount} carries more than {decimals} fractional digits")]
    PrecisionLoss { amount: Decimal, decimals: u32 },
    #[error("{amount} overflows the token's base-unit range")]
    Overflow { amount: Decimal },
    #[error("base-unit value {units} exceeds the representable decimal range")]
    Unrepresentable { units: U256 },
}

/// Scale a positive decimal amount to integer base units.
///
/// `to_base_units(dec!(1.5), 6)` yields `1_500_000`.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<U256, AmountError> {
    if amount.is_sign_negative() || amount.is_zero() {
        return Err(AmountError::NotPositive { amount });
    }

    let normalized = amount.normalize();
    if normalized.scale() > decimals {
        return Err(AmountError::PrecisionLoss { amount, decimals });
    }

    let factor = 10i128
        .checked_pow(decimals - normalized.scale())
        .ok_or(AmountError::Overflow { amount })?;
    let units = normalized
        .mantissa()
        .checked_mul(factor)
        .ok_or(AmountError::Overflow { amount })?;
    let units = u128::try_from(units).map_err(|_| AmountError::Overflow { amount })?;

    Ok(U256::from(units))
}

/// Convert integer base units back to a decimal amount for display and
/// ledger bookkeeping.
pub fn from_base_units(units: U256, decimals: u32) -> Result<Decimal, AmountError> {
    let raw = u128::try_from(units).map_err(|_| AmountError::Unrepresentable { units })?;
    let raw = i128::try_from(raw).map_err(|_| AmountError::Unrepresentable { units })?;

    Decimal::try_from_i128_with_scale(raw, decimals)
        .map(|amount| amount.normalize())
        .map_err(|_| AmountError::Unrepresentable { units })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn scales_whole_and_fractional_usdc() {
        assert_eq!(to_base_units(dec("100"), 6).unwrap(), U256::from(100_000_000u64));
        assert_eq!(to_base_units(dec("1.5"), 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(to_base_units(dec("0.000001"), 6).unwrap(), U256::from(1u64));
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        assert_eq!(
            to_base_units(dec("1.5000000000"), 6).unwrap(),
            U256::from(1_500_000u64)
        );
    }

    #[test]
    fn rejects_sub_unit_precision() {
        let err = to_base_units(dec("0.0000001"), 6).unwrap_err();
        assert!(matches!(err, AmountError::PrecisionLoss { decimals: 6, .. }));
    }

    #[test]
    fn rejects_zero_and_negative() {
        assert!(matches!(
            to_base_units(Decimal::ZERO, 6),
            Err(AmountError::NotPositive { .. })
        ));
        assert!(matches!(
            to_base_units(dec("-3"), 6),
            Err(AmountError::NotPositive { .. })
        ));
    }

    #[test]
    fn base_units_round_trip_to_display_amount() {
        let units = to_base_units(dec("12.34"), 6).unwrap();
        assert_eq!(from_base_units(units, 6).unwrap(), dec("12.34"));
    }

    #[test]
    fn oversized_units_are_unrepresentable() {
        let err = from_base_units(U256::MAX, 6).unwrap_err();
        assert!(matches!(err, AmountError::Unrepresentable { .. }));
    }
}
