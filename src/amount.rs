//! Decimal amount translation between asset denominations.
//!
//! Amounts move through the system as decimal strings and are converted to
//! arbitrary-precision integers scaled by `10^precision` for the actual
//! arithmetic. No floating point touches the scaling path.

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use std::str::FromStr;

use crate::error::TranslateError;

/// Highest precision we accept. Public chains top out at 18; anything much
/// larger is a malformed config or payload.
pub const MAX_PRECISION: u32 = 36;

/// Translate a decimal amount string from one precision to another.
///
/// The amount is represented as a `BigInt` scaled by `10^from_precision`,
/// then rescaled to `10^to_precision`. Widening appends zero digits exactly;
/// narrowing truncates toward zero. Truncation is a deliberate policy: the
/// payout must never exceed what the source event carried.
///
/// The result is formatted with exactly `to_precision` fractional digits, so
/// `translate("0.00500000", 8, 18)` yields `"0.005000000000000000"`.
pub fn translate(
    amount: &str,
    from_precision: u32,
    to_precision: u32,
) -> Result<String, TranslateError> {
    if from_precision > MAX_PRECISION || to_precision > MAX_PRECISION {
        return Err(TranslateError::Overflow(
            amount.to_string(),
            from_precision.max(to_precision),
        ));
    }

    let units = scaled_units(amount, from_precision)?;

    let rescaled: BigInt = if to_precision >= from_precision {
        units * pow10(to_precision - from_precision)
    } else {
        units / pow10(from_precision - to_precision)
    };

    Ok(format_units(&rescaled, to_precision))
}

/// Parse a decimal amount into integer base units at the given precision.
///
/// Fractional digits beyond `precision` are truncated, never rounded up.
pub fn to_base_units(amount: &str, precision: u32) -> Result<u128, TranslateError> {
    let units = scaled_units(amount, precision)?;
    let (sign, digits) = units.to_u64_digits();
    match sign {
        Sign::NoSign => Ok(0),
        Sign::Minus => Err(TranslateError::InvalidAmount(amount.to_string())),
        Sign::Plus => {
            if digits.len() > 2 {
                return Err(TranslateError::Overflow(amount.to_string(), precision));
            }
            let lo = digits[0] as u128;
            let hi = digits.get(1).copied().unwrap_or(0) as u128;
            Ok((hi << 64) | lo)
        }
    }
}

/// Reject malformed or negative decimal input without converting it.
/// Used by the dispatcher before an idempotency claim is taken.
pub fn validate(amount: &str) -> Result<(), TranslateError> {
    parse_decimal(amount).map(|_| ())
}

/// The amount as a `BigInt` scaled by `10^precision`, truncating any
/// fractional digits the precision cannot represent.
fn scaled_units(amount: &str, precision: u32) -> Result<BigInt, TranslateError> {
    let decimal = parse_decimal(amount)?;
    let (units, exponent) = decimal.as_bigint_and_exponent();

    // exponent is the number of fractional digits in the parsed value.
    let target = precision as i64;
    let units = if exponent <= target {
        units * pow10((target - exponent) as u32)
    } else {
        units / pow10((exponent - target) as u32)
    };
    Ok(units)
}

fn parse_decimal(amount: &str) -> Result<BigDecimal, TranslateError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() || trimmed.starts_with('+') || trimmed.starts_with('-') {
        return Err(TranslateError::InvalidAmount(amount.to_string()));
    }
    // BigDecimal accepts exponent notation; the wire format does not.
    if !trimmed.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(TranslateError::InvalidAmount(amount.to_string()));
    }
    let decimal = BigDecimal::from_str(trimmed)
        .map_err(|_| TranslateError::InvalidAmount(amount.to_string()))?;
    if decimal.sign() == Sign::Minus {
        return Err(TranslateError::InvalidAmount(amount.to_string()));
    }
    Ok(decimal)
}

/// Render non-negative base units as a plain decimal string with exactly
/// `precision` fractional digits. `BigDecimal`'s `Display` switches to
/// scientific notation for small magnitudes, which the wire format forbids,
/// so the digits are split by hand.
fn format_units(units: &BigInt, precision: u32) -> String {
    let digits = units.to_str_radix(10);
    if precision == 0 {
        return digits;
    }
    let precision = precision as usize;
    let padded = format!("{digits:0>width$}", width = precision + 1);
    let split = padded.len() - precision;
    format!("{}.{}", &padded[..split], &padded[split..])
}

fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}
