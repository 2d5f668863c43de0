//! High-precision constants: pi, e, phi.
//!
//! Pi uses Machin's formula `16·atan(1/5) - 4·atan(1/239)` with a
//! Gregory series per arctangent; e is the factorial series. Both run a
//! few guard digits past the requested precision and round at the end.
//! The evaluator's background worker calls these on precision changes
//! and publishes the results in a snapshot cell.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{One, Zero};

use crate::{dec_sqrt, MathContext, NumError};

const GUARD_DIGITS: u64 = 10;

/// `10^-digits`, the series cutoff.
fn epsilon(digits: u64) -> BigDecimal {
    BigDecimal::new(BigInt::one(), i64::try_from(digits).unwrap_or(i64::MAX))
}

/// Gregory series for `atan(1/x)` with integer `x > 1`.
fn atan_inverse(x: u64, work: MathContext) -> BigDecimal {
    let cutoff = epsilon(work.precision);
    let x_squared = BigInt::from(x) * BigInt::from(x);
    let one = BigDecimal::one();

    // Term k: 1 / ((2k+1) * x^(2k+1)), alternating sign.
    let mut power = BigInt::from(x);
    let mut k = 0u64;
    let mut sum = BigDecimal::zero();
    loop {
        let denom = BigInt::from(2 * k + 1) * &power;
        let term = work.div(&one, &BigDecimal::from(denom));
        if term < cutoff {
            break;
        }
        if k % 2 == 0 {
            sum += term;
        } else {
            sum -= term;
        }
        power *= &x_squared;
        k += 1;
    }
    sum
}

/// Pi to the context's precision (Machin's formula).
pub fn compute_pi(ctx: MathContext) -> BigDecimal {
    let work = MathContext::with_precision(ctx.divide_precision() + GUARD_DIGITS);
    let a = atan_inverse(5, work) * BigDecimal::from(16);
    let b = atan_inverse(239, work) * BigDecimal::from(4);
    ctx.round(&(a - b))
}

/// Euler's number to the context's precision (factorial series).
pub fn compute_e(ctx: MathContext) -> BigDecimal {
    let work = MathContext::with_precision(ctx.divide_precision() + GUARD_DIGITS);
    let cutoff = epsilon(work.precision);
    let mut sum = BigDecimal::from(2);
    let mut term = BigDecimal::one();
    let mut k = 2u64;
    loop {
        term = work.div(&term, &BigDecimal::from(k));
        if term < cutoff {
            break;
        }
        sum += &term;
        k += 1;
    }
    ctx.round(&sum)
}

/// The golden ratio `(1 + sqrt 5) / 2` to the context's precision.
pub fn compute_phi(ctx: MathContext) -> Result<BigDecimal, NumError> {
    let work = MathContext::with_precision(ctx.divide_precision() + GUARD_DIGITS);
    let root5 = dec_sqrt(&BigDecimal::from(5), work)?;
    Ok(ctx.round(&work.div(&(root5 + BigDecimal::one()), &BigDecimal::from(2))))
}

/// Fraction of pi used by trig range reduction: `pi * numer / denom`.
pub fn pi_fraction(pi: &BigDecimal, numer: u64, denom: u64, ctx: MathContext) -> BigDecimal {
    let scaled = pi * BigDecimal::from(numer);
    ctx.div(&scaled, &BigDecimal::from(denom))
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
    fn pi_to_thirty_digits() {
        let pi = compute_pi(MathContext::with_precision(30));
        assert_eq!(pi, dec("3.14159265358979323846264338328"));
    }

    #[test]
    fn e_to_twenty_digits() {
        let e = compute_e(MathContext::with_precision(20));
        assert_eq!(e, dec("2.7182818284590452354"));
    }

    #[test]
    fn phi_satisfies_its_identity() {
        let ctx = MathContext::with_precision(25);
        #[expect(clippy::unwrap_used, reason = "sqrt of positive")]
        let phi = compute_phi(ctx).unwrap();
        // phi^2 = phi + 1 to the working precision
        let lhs = ctx.round(&(&phi * &phi));
        let rhs = ctx.round(&(&phi + BigDecimal::one()));
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn pi_fraction_halves() {
        let ctx = MathContext::with_precision(20);
        let pi = compute_pi(ctx);
        let half = pi_fraction(&pi, 1, 2, ctx);
        assert_eq!(ctx.round(&(half * BigDecimal::from(2))), ctx.round(&compute_pi(ctx)));
    }

    #[test]
    fn epsilon_scale() {
        assert_eq!(epsilon(3), dec("0.001"));
    }
}
