use alloy::primitives::{I256, U256};
use rust_decimal::Decimal;

const MAX_SCALE: u32 = 28;
const TEN: U256 = U256::from_limbs([10, 0, 0, 0]);

/// Convert a base-unit amount with `decimals` precision into a `Decimal`.
///
/// Digits beyond what a `Decimal` can hold are truncated from the least
/// significant end, so very large balances lose dust rather than failing.
/// Returns `None` only when the integer part alone overflows.
pub fn to_decimal(amount: U256, decimals: u8) -> Option<Decimal> {
    let mut value = amount;
    let mut scale = u32::from(decimals);

    while scale > MAX_SCALE {
        value /= TEN;
        scale -= 1;
    }

    loop {
        if let Ok(raw) = i128::try_from(value) {
            if let Ok(decimal) = Decimal::try_from_i128_with_scale(raw, scale) {
                return Some(decimal.normalize());
            }
        }
        if scale == 0 {
            return None;
        }
        value /= TEN;
        scale -= 1;
    }
}

/// Value of `amount` base units in USD given a per-whole-token rate.
pub fn to_usd(amount: U256, decimals: u8, rate_usd: Decimal) -> Option<Decimal> {
    to_decimal(amount, decimals)?.checked_mul(rate_usd)
}

/// Interpret a Chainlink-style feed answer. Non-positive answers are invalid.
pub fn feed_rate(answer: I256, feed_decimals: u8) -> Option<Decimal> {
    if answer <= I256::ZERO {
        return None;
    }
    to_decimal(answer.into_raw(), feed_decimals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn converts_eighteen_decimals() {
        let amount = U256::from_str("1500000000000000000").unwrap();
        assert_eq!(to_decimal(amount, 18), Some(Decimal::new(15, 1)));
    }

    #[test]
    fn converts_six_decimals() {
        let amount = U256::from(12_340_000u64);
        assert_eq!(to_decimal(amount, 6), Some(Decimal::new(1234, 2)));
    }

    #[test]
    fn truncates_precision_beyond_decimal_scale() {
        // 1 token with 36 decimals
        let amount = U256::from(10u64).pow(U256::from(36));
        assert_eq!(to_decimal(amount, 36), Some(Decimal::ONE));
    }

    #[test]
    fn large_amounts_shed_fractional_digits_instead_of_failing() {
        // 10^12 tokens at 18 decimals exceeds the 96-bit mantissa at full scale
        let amount = U256::from(10u64).pow(U256::from(30));
        assert_eq!(
            to_decimal(amount, 18),
            Some(Decimal::from(1_000_000_000_000u64))
        );
    }

    #[test]
    fn integer_overflow_is_none() {
        assert_eq!(to_decimal(U256::MAX, 0), None);
    }

    #[test]
    fn prices_amount_in_usd() {
        let amount = U256::from_str("2000000000000000000").unwrap();
        let rate = Decimal::from(3000);
        assert_eq!(to_usd(amount, 18, rate), Some(Decimal::from(6000)));
    }

    #[test]
    fn rejects_non_positive_feed_answers() {
        assert_eq!(feed_rate(I256::ZERO, 8), None);
        assert_eq!(feed_rate(I256::MINUS_ONE, 8), None);
        let answer = I256::try_from(250_012_345_678i64).unwrap();
        assert_eq!(feed_rate(answer, 8), Some(Decimal::new(250_012_345_678, 8)));
    }
}
