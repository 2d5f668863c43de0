//! Quaternions over mixed decimal/rational components.
//!
//! Multiplication is Hamilton's product (non-commutative). Only integer
//! powers are defined; fractional powers raise `NotImplemented`.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::fmt;

use crate::{dec_sqrt, Complex, MathContext, NumError, Real};

/// Quaternion `a + bi + cj + dk`.
#[derive(Clone, Debug, PartialEq)]
pub struct Quaternion {
    pub a: Real,
    pub b: Real,
    pub c: Real,
    pub d: Real,
}

impl Quaternion {
    pub fn new(a: Real, b: Real, c: Real, d: Real) -> Self {
        Quaternion { a, b, c, d }
    }

    fn zero_like(x: &Real) -> Real {
        match x {
            Real::Decimal(_) => Real::zero_decimal(),
            Real::Fraction(_) => Real::zero_fraction(),
        }
    }

    /// Promote a complex value (quaternions win the promotion order).
    pub fn from_complex(z: &Complex) -> Self {
        let zero = Self::zero_like(&z.re);
        Quaternion {
            a: z.re.clone(),
            b: z.im.clone(),
            c: zero.clone(),
            d: zero,
        }
    }

    pub fn from_real(r: Real) -> Self {
        let zero = Self::zero_like(&r);
        Quaternion {
            a: r,
            b: zero.clone(),
            c: zero.clone(),
            d: zero,
        }
    }

    /// Purely scalar (b, c and d all zero).
    pub fn is_pure_scalar(&self) -> bool {
        self.b.is_zero() && self.c.is_zero() && self.d.is_zero()
    }

    pub fn add(&self, other: &Quaternion, ctx: MathContext) -> Quaternion {
        Quaternion {
            a: self.a.add(&other.a, ctx),
            b: self.b.add(&other.b, ctx),
            c: self.c.add(&other.c, ctx),
            d: self.d.add(&other.d, ctx),
        }
    }

    pub fn sub(&self, other: &Quaternion, ctx: MathContext) -> Quaternion {
        Quaternion {
            a: self.a.sub(&other.a, ctx),
            b: self.b.sub(&other.b, ctx),
            c: self.c.sub(&other.c, ctx),
            d: self.d.sub(&other.d, ctx),
        }
    }

    /// Hamilton product.
    pub fn mul(&self, o: &Quaternion, ctx: MathContext) -> Quaternion {
        let m = |x: &Real, y: &Real| x.mul(y, ctx);
        let a = m(&self.a, &o.a)
            .sub(&m(&self.b, &o.b), ctx)
            .sub(&m(&self.c, &o.c), ctx)
            .sub(&m(&self.d, &o.d), ctx);
        let b = m(&self.a, &o.b)
            .add(&m(&self.b, &o.a), ctx)
            .add(&m(&self.c, &o.d), ctx)
            .sub(&m(&self.d, &o.c), ctx);
        let c = m(&self.a, &o.c)
            .sub(&m(&self.b, &o.d), ctx)
            .add(&m(&self.c, &o.a), ctx)
            .add(&m(&self.d, &o.b), ctx);
        let d = m(&self.a, &o.d)
            .add(&m(&self.b, &o.c), ctx)
            .sub(&m(&self.c, &o.b), ctx)
            .add(&m(&self.d, &o.a), ctx);
        Quaternion { a, b, c, d }
    }

    pub fn conjugate(&self) -> Quaternion {
        Quaternion {
            a: self.a.clone(),
            b: self.b.neg(),
            c: self.c.neg(),
            d: self.d.neg(),
        }
    }

    /// Squared norm `a² + b² + c² + d²`.
    pub fn norm_squared(&self, ctx: MathContext) -> Real {
        self.a
            .mul(&self.a, ctx)
            .add(&self.b.mul(&self.b, ctx), ctx)
            .add(&self.c.mul(&self.c, ctx), ctx)
            .add(&self.d.mul(&self.d, ctx), ctx)
    }

    /// |q|, always decimal.
    pub fn magnitude(&self, ctx: MathContext) -> Result<BigDecimal, NumError> {
        dec_sqrt(&self.norm_squared(ctx).to_decimal(ctx), ctx)
    }

    /// Multiplicative inverse: conjugate over squared norm.
    pub fn inverse(&self, ctx: MathContext) -> Result<Quaternion, NumError> {
        let n = self.norm_squared(ctx);
        if n.is_zero() {
            return Err(NumError::DivideByZero);
        }
        let conj = self.conjugate();
        Ok(Quaternion {
            a: conj.a.div(&n, ctx)?,
            b: conj.b.div(&n, ctx)?,
            c: conj.c.div(&n, ctx)?,
            d: conj.d.div(&n, ctx)?,
        })
    }

    /// Right division `self * other⁻¹`.
    pub fn div(&self, other: &Quaternion, ctx: MathContext) -> Result<Quaternion, NumError> {
        Ok(self.mul(&other.inverse(ctx)?, ctx))
    }

    /// Integer power by squaring; negative exponents invert first.
    pub fn pow_int(&self, exp: &BigInt, ctx: MathContext) -> Result<Quaternion, NumError> {
        let one = Quaternion::from_real(match &self.a {
            Real::Decimal(_) => Real::Decimal(BigDecimal::from(1)),
            Real::Fraction(_) => Real::Fraction(num_rational::BigRational::from_integer(
                BigInt::from(1),
            )),
        });
        if exp.is_zero() {
            return Ok(one);
        }
        let base = if exp.is_negative() {
            self.inverse(ctx)?
        } else {
            self.clone()
        };
        let mut result = one;
        let mut square = base;
        let mut e = exp.magnitude().to_u64().unwrap_or(u64::MAX);
        while e > 0 {
            if e & 1 == 1 {
                result = result.mul(&square, ctx);
            }
            e >>= 1;
            if e > 0 {
                square = square.mul(&square, ctx);
            }
        }
        Ok(result)
    }
}

impl fmt::Display for Quaternion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "( {}, {}, {}, {} )", self.a, self.b, self.c, self.d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Real {
        #[expect(clippy::unwrap_used, reason = "test literals are valid")]
        Real::Decimal(BigDecimal::from_str(s).unwrap())
    }

    fn q(a: &str, b: &str, c: &str, d: &str) -> Quaternion {
        Quaternion::new(dec(a), dec(b), dec(c), dec(d))
    }

    #[test]
    fn ij_is_k_and_ji_is_minus_k() {
        let ctx = MathContext::DEFAULT;
        let i = q("0", "1", "0", "0");
        let j = q("0", "0", "1", "0");
        assert_eq!(i.mul(&j, ctx), q("0", "0", "0", "1"));
        assert_eq!(j.mul(&i, ctx), q("0", "0", "0", "-1"));
    }

    #[test]
    fn inverse_times_self_is_one() {
        let ctx = MathContext::with_precision(20);
        let v = q("1", "2", "3", "4");
        #[expect(clippy::unwrap_used, reason = "non-zero quaternion")]
        let product = v.mul(&v.inverse(ctx).unwrap(), ctx);
        assert!(product.a.compare(&dec("1")) == std::cmp::Ordering::Equal);
        assert!(product.is_pure_scalar());
    }

    #[test]
    fn negative_power_is_inverse_power() {
        let ctx = MathContext::with_precision(20);
        let v = q("0", "1", "0", "0");
        #[expect(clippy::unwrap_used, reason = "integer exponent")]
        let p = v.pow_int(&BigInt::from(-2), ctx).unwrap();
        assert_eq!(p, q("-1", "0", "0", "0"));
    }
}
