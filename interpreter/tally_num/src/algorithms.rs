//! Decimal algorithms: square root, powers.
//!
//! Square root is a Newton iteration carried out a few guard digits past
//! the requested precision. Fractional powers of decimals go through an
//! `f64` bridge (deterministic, documented as approximate); integer
//! powers are exact squaring.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};

use crate::{int_pow, MathContext, NumError};

/// Guard digits used by iterative algorithms before the final rounding.
const GUARD_DIGITS: u64 = 6;

/// Square root by Newton iteration, rounded to the context.
pub fn dec_sqrt(value: &BigDecimal, ctx: MathContext) -> Result<BigDecimal, NumError> {
    if value.is_negative() {
        return Err(NumError::NotImplemented("square root of a negative value"));
    }
    if value.is_zero() {
        return Ok(BigDecimal::zero());
    }
    let work = MathContext::with_precision(ctx.divide_precision() + GUARD_DIGITS);

    // Initial guess: 10^(magnitude/2), refined from f64 when it fits.
    let mut x = match value.to_f64() {
        Some(f) if f.is_finite() && f > 0.0 => {
            BigDecimal::from_f64(f.sqrt()).unwrap_or_else(BigDecimal::one)
        }
        _ => {
            let (digits, scale) = value.normalized().into_bigint_and_exponent();
            let magnitude = i64::try_from(digits.to_string().len()).unwrap_or(0) - scale;
            BigDecimal::new(BigInt::one(), -(magnitude / 2))
        }
    };

    let two = BigDecimal::from(2);
    let mut previous = BigDecimal::zero();
    // Quadratic convergence: 64 iterations is far beyond any practical
    // precision; the loop exits as soon as the value stabilizes.
    for _ in 0..64 {
        x = work.div(&(&x + work.div(value, &x)), &two);
        if x == previous {
            break;
        }
        previous = x.clone();
    }
    Ok(ctx.round(&x))
}

/// Raise a decimal to a signed integer power.
pub fn dec_pow_int(
    base: &BigDecimal,
    exp: &BigInt,
    ctx: MathContext,
) -> Result<BigDecimal, NumError> {
    if exp.is_zero() {
        return Ok(BigDecimal::one());
    }
    if base.is_zero() && exp.is_negative() {
        return Err(NumError::ZeroToNegativePower);
    }
    let magnitude = exp.magnitude().to_u64().unwrap_or(u64::MAX);
    let (digits, scale) = base.normalized().into_bigint_and_exponent();
    let unscaled = int_pow(&digits, magnitude);
    let raised = BigDecimal::new(unscaled, scale.saturating_mul(i64::try_from(magnitude).unwrap_or(i64::MAX)));
    if exp.is_negative() {
        Ok(ctx.div(&BigDecimal::one(), &raised))
    } else {
        Ok(ctx.round(&raised))
    }
}

/// Generic decimal power. Integer exponents are exact; fractional
/// exponents bridge through `f64` and are rounded into the context.
pub fn dec_pow(
    base: &BigDecimal,
    exp: &BigDecimal,
    ctx: MathContext,
) -> Result<BigDecimal, NumError> {
    if exp.fractional_digit_count() <= 0 {
        let (digits, _) = exp.normalized().with_scale(0).into_bigint_and_exponent();
        return dec_pow_int(base, &digits, ctx);
    }
    if base.is_negative() {
        // The caller promotes to complex for a principal value.
        return Err(NumError::NotImplemented(
            "fractional power of a negative base",
        ));
    }
    let (Some(b), Some(e)) = (base.to_f64(), exp.to_f64()) else {
        return Err(NumError::NotImplemented("power out of f64 range"));
    };
    let raised = b.powf(e);
    if !raised.is_finite() {
        return Err(NumError::NotImplemented("power out of f64 range"));
    }
    let value = BigDecimal::from_f64(raised).unwrap_or_else(BigDecimal::zero);
    Ok(ctx.round(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        #[expect(clippy::unwrap_used, reason = "test literals are valid")]
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn sqrt_of_perfect_square() {
        let ctx = MathContext::with_precision(20);
        #[expect(clippy::unwrap_used, reason = "positive input")]
        let r = dec_sqrt(&dec("144"), ctx).unwrap();
        assert_eq!(r, dec("12"));
    }

    #[test]
    fn sqrt_of_two_to_precision() {
        let ctx = MathContext::with_precision(20);
        #[expect(clippy::unwrap_used, reason = "positive input")]
        let r = dec_sqrt(&dec("2"), ctx).unwrap();
        assert_eq!(r, dec("1.4142135623730950488"));
    }

    #[test]
    fn sqrt_rejects_negative() {
        assert!(dec_sqrt(&dec("-1"), MathContext::DEFAULT).is_err());
    }

    #[test]
    fn integer_powers_are_exact() {
        let ctx = MathContext::with_precision(0);
        #[expect(clippy::unwrap_used, reason = "valid exponent")]
        let r = dec_pow_int(&dec("1.5"), &BigInt::from(3), ctx).unwrap();
        assert_eq!(r, dec("3.375"));
    }

    #[test]
    fn negative_power_reciprocates() {
        let ctx = MathContext::with_precision(10);
        #[expect(clippy::unwrap_used, reason = "valid exponent")]
        let r = dec_pow_int(&dec("2"), &BigInt::from(-2), ctx).unwrap();
        assert_eq!(r, dec("0.25"));
    }

    #[test]
    fn zero_to_negative_power_fails() {
        assert!(dec_pow_int(&dec("0"), &BigInt::from(-1), MathContext::DEFAULT).is_err());
    }
}
