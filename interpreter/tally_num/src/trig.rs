//! Trig functions on decimals, honoring the angle-units mode.
//!
//! Taylor series after range reduction into `[-pi, pi]`. The caller
//! supplies pi at (at least) the active precision: normally the
//! evaluator's background worker snapshot.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{One, Zero};

use crate::{MathContext, NumError, RoundingMode};

const GUARD_DIGITS: u64 = 8;

/// Angle units for trig inputs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TrigMode {
    Degrees,
    #[default]
    Radians,
    Grads,
}

impl TrigMode {
    pub fn name(self) -> &'static str {
        match self {
            TrigMode::Degrees => "degrees",
            TrigMode::Radians => "radians",
            TrigMode::Grads => "grads",
        }
    }

    /// Convert an angle in these units to radians.
    pub fn to_radians(self, angle: &BigDecimal, pi: &BigDecimal, ctx: MathContext) -> BigDecimal {
        match self {
            TrigMode::Radians => angle.clone(),
            TrigMode::Degrees => ctx.div(&(angle * pi), &BigDecimal::from(180)),
            TrigMode::Grads => ctx.div(&(angle * pi), &BigDecimal::from(200)),
        }
    }
}

/// Reduce `x` into `[-pi, pi]` by subtracting whole turns.
fn reduce(x: &BigDecimal, pi: &BigDecimal, work: MathContext) -> BigDecimal {
    let two_pi = pi * BigDecimal::from(2);
    let turns = work
        .div(x, &two_pi)
        .with_scale_round(0, RoundingMode::HalfEven);
    x - turns * two_pi
}

fn epsilon(digits: u64) -> BigDecimal {
    BigDecimal::new(BigInt::one(), i64::try_from(digits).unwrap_or(i64::MAX))
}

/// Shared Taylor loop: sin starts at term `x` (k=1), cos at `1` (k=0).
/// Successive terms multiply by `-x² / ((k+1)(k+2))`.
fn taylor(x: &BigDecimal, start_term: BigDecimal, mut k: u64, work: MathContext) -> BigDecimal {
    let cutoff = epsilon(work.precision);
    let x_squared = x * x;
    let mut term = start_term;
    let mut sum = BigDecimal::zero();
    loop {
        sum += &term;
        let divisor = BigDecimal::from((k + 1) * (k + 2));
        term = work.div(&(-(&term * &x_squared)), &divisor);
        k += 2;
        if term.abs() < cutoff {
            break;
        }
    }
    sum
}

/// Sine of an angle in the given units.
pub fn sin(angle: &BigDecimal, mode: TrigMode, pi: &BigDecimal, ctx: MathContext) -> BigDecimal {
    let work = MathContext::with_precision(ctx.divide_precision() + GUARD_DIGITS);
    let x = reduce(&mode.to_radians(angle, pi, work), pi, work);
    ctx.round(&taylor(&x, x.clone(), 1, work))
}

/// Cosine of an angle in the given units.
pub fn cos(angle: &BigDecimal, mode: TrigMode, pi: &BigDecimal, ctx: MathContext) -> BigDecimal {
    let work = MathContext::with_precision(ctx.divide_precision() + GUARD_DIGITS);
    let x = reduce(&mode.to_radians(angle, pi, work), pi, work);
    ctx.round(&taylor(&x, BigDecimal::one(), 0, work))
}

/// Tangent; fails where cosine vanishes at the working precision.
pub fn tan(
    angle: &BigDecimal,
    mode: TrigMode,
    pi: &BigDecimal,
    ctx: MathContext,
) -> Result<BigDecimal, NumError> {
    let work = MathContext::with_precision(ctx.divide_precision() + GUARD_DIGITS);
    let x = reduce(&mode.to_radians(angle, pi, work), pi, work);
    let s = taylor(&x, x.clone(), 1, work);
    let c = taylor(&x, BigDecimal::one(), 0, work);
    if c.is_zero() {
        return Err(NumError::DivideByZero);
    }
    Ok(ctx.round(&work.div(&s, &c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute_pi;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        #[expect(clippy::unwrap_used, reason = "test literals are valid")]
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn sin_of_90_degrees_is_one() {
        let ctx = MathContext::with_precision(20);
        let pi = compute_pi(ctx);
        let s = sin(&dec("90"), TrigMode::Degrees, &pi, ctx);
        assert_eq!(s, dec("1"));
    }

    #[test]
    fn cos_of_zero_is_one() {
        let ctx = MathContext::with_precision(20);
        let pi = compute_pi(ctx);
        assert_eq!(cos(&dec("0"), TrigMode::Radians, &pi, ctx), dec("1"));
    }

    #[test]
    fn sin_squared_plus_cos_squared() {
        let ctx = MathContext::with_precision(25);
        let pi = compute_pi(ctx);
        let angle = dec("0.7");
        let s = sin(&angle, TrigMode::Radians, &pi, ctx);
        let c = cos(&angle, TrigMode::Radians, &pi, ctx);
        let check = MathContext::with_precision(20);
        assert_eq!(check.round(&(&s * &s + &c * &c)), dec("1"));
    }

    #[test]
    fn tan_of_45_degrees() {
        let ctx = MathContext::with_precision(20);
        let pi = compute_pi(ctx);
        #[expect(clippy::unwrap_used, reason = "cos(45 deg) is non-zero")]
        let t = tan(&dec("45"), TrigMode::Degrees, &pi, ctx).unwrap();
        assert_eq!(t, dec("1"));
    }

    #[test]
    fn grads_quarter_turn() {
        let ctx = MathContext::with_precision(20);
        let pi = compute_pi(ctx);
        assert_eq!(sin(&dec("100"), TrigMode::Grads, &pi, ctx), dec("1"));
    }
}
