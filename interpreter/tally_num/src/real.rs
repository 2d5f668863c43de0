//! Mixed decimal/rational real component.
//!
//! Complex and quaternion components are either all decimal or all
//! rational depending on the active rational mode. `Real` is that
//! component type; mixed-flavor operations promote to `Fraction`
//! (lossless), and `to_decimal` divides under the supplied context.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;

use crate::{dec_sqrt, MathContext, NumError};

/// One real component: exact fraction or context-rounded decimal.
#[derive(Clone, Debug, PartialEq)]
pub enum Real {
    Decimal(BigDecimal),
    Fraction(BigRational),
}

impl Real {
    pub fn zero_decimal() -> Self {
        Real::Decimal(BigDecimal::zero())
    }

    pub fn zero_fraction() -> Self {
        Real::Fraction(BigRational::zero())
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Real::Decimal(d) => d.is_zero(),
            Real::Fraction(r) => r.is_zero(),
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Real::Decimal(d) => d.is_negative(),
            Real::Fraction(r) => r.is_negative(),
        }
    }

    /// Exact conversion to a fraction. Decimals are unscaled/10^scale.
    pub fn to_fraction(&self) -> BigRational {
        match self {
            Real::Fraction(r) => r.clone(),
            Real::Decimal(d) => decimal_to_fraction(d),
        }
    }

    /// Conversion to a decimal; fractions divide under the context.
    pub fn to_decimal(&self, ctx: MathContext) -> BigDecimal {
        match self {
            Real::Decimal(d) => d.clone(),
            Real::Fraction(r) => fraction_to_decimal(r, ctx),
        }
    }

    pub fn neg(&self) -> Real {
        match self {
            Real::Decimal(d) => Real::Decimal(-d),
            Real::Fraction(r) => Real::Fraction(-r),
        }
    }

    pub fn add(&self, other: &Real, ctx: MathContext) -> Real {
        match (self, other) {
            (Real::Decimal(a), Real::Decimal(b)) => Real::Decimal(ctx.round(&(a + b))),
            _ => Real::Fraction(self.to_fraction() + other.to_fraction()),
        }
    }

    pub fn sub(&self, other: &Real, ctx: MathContext) -> Real {
        match (self, other) {
            (Real::Decimal(a), Real::Decimal(b)) => Real::Decimal(ctx.round(&(a - b))),
            _ => Real::Fraction(self.to_fraction() - other.to_fraction()),
        }
    }

    pub fn mul(&self, other: &Real, ctx: MathContext) -> Real {
        match (self, other) {
            (Real::Decimal(a), Real::Decimal(b)) => Real::Decimal(ctx.round(&(a * b))),
            _ => Real::Fraction(self.to_fraction() * other.to_fraction()),
        }
    }

    pub fn div(&self, other: &Real, ctx: MathContext) -> Result<Real, NumError> {
        if other.is_zero() {
            return Err(NumError::DivideByZero);
        }
        Ok(match (self, other) {
            (Real::Decimal(a), Real::Decimal(b)) => Real::Decimal(ctx.div(a, b)),
            _ => Real::Fraction(self.to_fraction() / other.to_fraction()),
        })
    }

    /// Square root; rational inputs round through decimal.
    pub fn sqrt(&self, ctx: MathContext) -> Result<Real, NumError> {
        Ok(Real::Decimal(dec_sqrt(&self.to_decimal(ctx), ctx)?))
    }

    /// Total order. Mixed flavors compare exactly through fractions.
    pub fn compare(&self, other: &Real) -> Ordering {
        match (self, other) {
            (Real::Decimal(a), Real::Decimal(b)) => a.cmp(b),
            _ => self.to_fraction().cmp(&other.to_fraction()),
        }
    }

    /// Flip flavor to match the active rational mode.
    pub fn with_rational(&self, rational: bool, ctx: MathContext) -> Real {
        match (self, rational) {
            (Real::Fraction(_), true) | (Real::Decimal(_), false) => self.clone(),
            (_, true) => Real::Fraction(self.to_fraction()),
            (_, false) => Real::Decimal(self.to_decimal(ctx)),
        }
    }
}

impl fmt::Display for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Real::Decimal(d) => write!(f, "{}", d.normalized()),
            Real::Fraction(r) => {
                if r.denom().is_one() {
                    write!(f, "{}", r.numer())
                } else {
                    write!(f, "{}/{}", r.numer(), r.denom())
                }
            }
        }
    }
}

/// Exact decimal-to-fraction conversion.
pub fn decimal_to_fraction(d: &BigDecimal) -> BigRational {
    let (unscaled, scale) = d.normalized().into_bigint_and_exponent();
    if scale >= 0 {
        let denom = crate::int_pow(&BigInt::from(10), scale.unsigned_abs());
        BigRational::new(unscaled, denom)
    } else {
        let numer = unscaled * crate::int_pow(&BigInt::from(10), scale.unsigned_abs());
        BigRational::from_integer(numer)
    }
}

/// Fraction-to-decimal division under a context.
pub fn fraction_to_decimal(r: &BigRational, ctx: MathContext) -> BigDecimal {
    let numer = BigDecimal::from(r.numer().clone());
    let denom = BigDecimal::from(r.denom().clone());
    ctx.div(&numer, &denom)
}

/// Best-effort `f64` view of a real component, for transcendental bridges.
pub fn real_to_f64(r: &Real, ctx: MathContext) -> Option<f64> {
    r.to_decimal(ctx).to_f64().filter(|f| f.is_finite())
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

    fn frac(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn decimal_to_fraction_is_exact() {
        assert_eq!(decimal_to_fraction(&dec("0.5")), frac(1, 2));
        assert_eq!(decimal_to_fraction(&dec("-2.25")), frac(-9, 4));
        assert_eq!(decimal_to_fraction(&dec("300")), frac(300, 1));
    }

    #[test]
    fn mixed_addition_promotes_to_fraction() {
        let ctx = MathContext::DEFAULT;
        let sum = Real::Fraction(frac(1, 3)).add(&Real::Decimal(dec("0.5")), ctx);
        assert_eq!(sum, Real::Fraction(frac(5, 6)));
    }

    #[test]
    fn decimal_division_uses_context() {
        let ctx = MathContext::with_precision(4);
        #[expect(clippy::unwrap_used, reason = "non-zero divisor")]
        let q = Real::Decimal(dec("1"))
            .div(&Real::Decimal(dec("3")), ctx)
            .unwrap();
        assert_eq!(q, Real::Decimal(dec("0.3333")));
    }

    #[test]
    fn division_by_zero_fails() {
        let r = Real::Fraction(frac(1, 2)).div(&Real::zero_fraction(), MathContext::DEFAULT);
        assert_eq!(r, Err(NumError::DivideByZero));
    }

    #[test]
    fn compare_across_flavors() {
        let a = Real::Fraction(frac(1, 2));
        let b = Real::Decimal(dec("0.5"));
        assert_eq!(a.compare(&b), Ordering::Equal);
        assert_eq!(
            Real::Decimal(dec("0.4")).compare(&a),
            Ordering::Less
        );
    }
}
