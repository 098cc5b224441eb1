//! TRX <-> sun conversion with fixed 6-decimal semantics.
//!
//! Parsing is done on the digits themselves. `"0.1"` is exactly 100_000 sun,
//! not whatever `0.1f64 * 1e6` rounds to today.

use crate::config::{SUN_PER_TRX, TRX_DECIMALS};
use crate::error::{PaymentError, PaymentResult};

/// Formats sun as TRX text: up to six fractional digits, trailing zeros
/// trimmed, `"0"` for zero.
///
/// ```
/// use trxsafe_protocol::codec::sun_to_trx;
///
/// assert_eq!(sun_to_trx(1_500_000), "1.5");
/// assert_eq!(sun_to_trx(1), "0.000001");
/// ```
pub fn sun_to_trx(sun: i64) -> String {
    let sign = if sun < 0 { "-" } else { "" };
    let abs = sun.unsigned_abs();
    let per = SUN_PER_TRX as u64;
    let whole = abs / per;
    let frac = abs % per;

    if frac == 0 {
        return format!("{sign}{whole}");
    }

    let frac = format!("{frac:06}");
    format!("{sign}{whole}.{}", frac.trim_end_matches('0'))
}

/// Parses decimal TRX text into sun.
///
/// Accepts `"1"`, `"1.5"`, `".5"`, `"5."` and surrounding whitespace.
/// Rejects signs, exponents, separators, and more than six fractional
/// digits with `InvalidAmount`; values beyond `i64` sun fail with `Overflow`.
pub fn trx_to_sun(input: &str) -> PaymentResult<i64> {
    let s = input.trim();
    let invalid = |reason: &str| PaymentError::InvalidAmount(format!("{input:?}: {reason}"));

    if s.is_empty() {
        return Err(invalid("empty"));
    }
    if s.contains(['e', 'E']) {
        return Err(invalid("scientific notation is not accepted"));
    }
    if s.starts_with(['-', '+']) {
        return Err(invalid("signs are not accepted"));
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("only digits and one decimal point are accepted"));
    }
    if frac.len() > TRX_DECIMALS {
        return Err(invalid("more than 6 fractional digits"));
    }

    let mut whole_sun: i64 = 0;
    for b in whole.bytes() {
        whole_sun = whole_sun
            .checked_mul(10)
            .and_then(|v| v.checked_add(i64::from(b - b'0')))
            .ok_or(PaymentError::Overflow)?;
    }

    let mut frac_sun: i64 = 0;
    for i in 0..TRX_DECIMALS {
        let digit = frac.as_bytes().get(i).map_or(0, |b| i64::from(b - b'0'));
        frac_sun = frac_sun * 10 + digit;
    }

    whole_sun
        .checked_mul(SUN_PER_TRX)
        .and_then(|v| v.checked_add(frac_sun))
        .ok_or(PaymentError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_and_a_half() {
        assert_eq!(trx_to_sun("1.5").unwrap(), 1_500_000);
        assert_eq!(sun_to_trx(1_500_000), "1.5");
    }

    #[test]
    fn seven_fraction_digits_rejected() {
        match trx_to_sun("1.0000001") {
            Err(PaymentError::InvalidAmount(_)) => {}
            other => panic!("expected InvalidAmount, got {:?}", other),
        }
    }

    #[test]
    fn formatting_trims_zeros() {
        assert_eq!(sun_to_trx(0), "0");
        assert_eq!(sun_to_trx(1), "0.000001");
        assert_eq!(sun_to_trx(10_000_000), "10");
        assert_eq!(sun_to_trx(10_100_000), "10.1");
        assert_eq!(sun_to_trx(i64::MAX), "9223372036854.775807");
    }

    #[test]
    fn loose_decimal_forms() {
        assert_eq!(trx_to_sun(".5").unwrap(), 500_000);
        assert_eq!(trx_to_sun("5.").unwrap(), 5_000_000);
        assert_eq!(trx_to_sun("  007.250 ").unwrap(), 7_250_000);
        assert_eq!(trx_to_sun("0").unwrap(), 0);
    }

    #[test]
    fn rejects_non_decimal_text() {
        for s in ["", ".", "1e6", "1E2", "-1", "+1", "1,5", "1.2.3", "abc", "0x10"] {
            assert!(
                matches!(trx_to_sun(s), Err(PaymentError::InvalidAmount(_))),
                "{s:?} should be rejected"
            );
        }
    }

    #[test]
    fn overflow_is_distinct_from_invalid() {
        assert_eq!(trx_to_sun("9223372036854.775807").unwrap(), i64::MAX);
        assert!(matches!(
            trx_to_sun("9223372036854.775808"),
            Err(PaymentError::Overflow)
        ));
        assert!(matches!(
            trx_to_sun("99999999999999999999999"),
            Err(PaymentError::Overflow)
        ));
    }

    #[test]
    fn formatting_then_parsing_is_identity() {
        for sun in [0, 1, 999_999, 1_000_000, 1_234_567, 15_000_000, i64::MAX] {
            assert_eq!(trx_to_sun(&sun_to_trx(sun)).unwrap(), sun);
        }
    }
}
