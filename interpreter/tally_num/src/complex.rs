//! Complex numbers over mixed decimal/rational components.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};
use std::fmt;

use crate::{dec_sqrt, real_to_f64, MathContext, NumError, Real};

/// Complex number; both parts share a flavor per the rational mode.
#[derive(Clone, Debug, PartialEq)]
pub struct Complex {
    pub re: Real,
    pub im: Real,
}

impl Complex {
    pub fn new(re: Real, im: Real) -> Self {
        Complex { re, im }
    }

    /// A complex with a zero imaginary part carrying the flavor of `re`.
    pub fn from_real(re: Real) -> Self {
        let im = match &re {
            Real::Decimal(_) => Real::zero_decimal(),
            Real::Fraction(_) => Real::zero_fraction(),
        };
        Complex { re, im }
    }

    pub fn is_pure_real(&self) -> bool {
        self.im.is_zero()
    }

    pub fn add(&self, other: &Complex, ctx: MathContext) -> Complex {
        Complex {
            re: self.re.add(&other.re, ctx),
            im: self.im.add(&other.im, ctx),
        }
    }

    pub fn sub(&self, other: &Complex, ctx: MathContext) -> Complex {
        Complex {
            re: self.re.sub(&other.re, ctx),
            im: self.im.sub(&other.im, ctx),
        }
    }

    pub fn mul(&self, other: &Complex, ctx: MathContext) -> Complex {
        // (a+bi)(c+di) = (ac-bd) + (ad+bc)i
        let ac = self.re.mul(&other.re, ctx);
        let bd = self.im.mul(&other.im, ctx);
        let ad = self.re.mul(&other.im, ctx);
        let bc = self.im.mul(&other.re, ctx);
        Complex {
            re: ac.sub(&bd, ctx),
            im: ad.add(&bc, ctx),
        }
    }

    pub fn div(&self, other: &Complex, ctx: MathContext) -> Result<Complex, NumError> {
        // (a+bi)/(c+di) = (a+bi)(c-di) / (c²+d²)
        let denom = other
            .re
            .mul(&other.re, ctx)
            .add(&other.im.mul(&other.im, ctx), ctx);
        if denom.is_zero() {
            return Err(NumError::DivideByZero);
        }
        let numer = self.mul(&other.conjugate(), ctx);
        Ok(Complex {
            re: numer.re.div(&denom, ctx)?,
            im: numer.im.div(&denom, ctx)?,
        })
    }

    pub fn neg(&self) -> Complex {
        Complex {
            re: self.re.neg(),
            im: self.im.neg(),
        }
    }

    pub fn conjugate(&self) -> Complex {
        Complex {
            re: self.re.clone(),
            im: self.im.neg(),
        }
    }

    /// |z| = sqrt(re² + im²), always decimal.
    pub fn magnitude(&self, ctx: MathContext) -> Result<BigDecimal, NumError> {
        let sum = self
            .re
            .mul(&self.re, ctx)
            .add(&self.im.mul(&self.im, ctx), ctx);
        dec_sqrt(&sum.to_decimal(ctx), ctx)
    }

    /// Integer power by squaring.
    pub fn pow_int(&self, exp: &BigInt, ctx: MathContext) -> Result<Complex, NumError> {
        let one = Complex::from_real(match &self.re {
            Real::Decimal(_) => Real::Decimal(BigDecimal::from(1)),
            Real::Fraction(_) => Real::Fraction(num_rational::BigRational::from_integer(
                BigInt::from(1),
            )),
        });
        if exp.is_zero() {
            return Ok(one);
        }
        let magnitude = exp.magnitude().to_u64().unwrap_or(u64::MAX);
        let mut result = one.clone();
        let mut square = self.clone();
        let mut e = magnitude;
        while e > 0 {
            if e & 1 == 1 {
                result = result.mul(&square, ctx);
            }
            e >>= 1;
            if e > 0 {
                square = square.mul(&square, ctx);
            }
        }
        if exp.is_negative() {
            one.div(&result, ctx)
        } else {
            Ok(result)
        }
    }

    /// Principal-value fractional power, computed in polar form through
    /// `f64` and carried back into the context.
    pub fn pow(&self, exp: &BigDecimal, ctx: MathContext) -> Result<Complex, NumError> {
        if exp.fractional_digit_count() <= 0 {
            let (digits, _) = exp.normalized().with_scale(0).into_bigint_and_exponent();
            return self.pow_int(&digits, ctx);
        }
        let (Some(re), Some(im), Some(e)) = (
            real_to_f64(&self.re, ctx),
            real_to_f64(&self.im, ctx),
            exp.to_f64(),
        ) else {
            return Err(NumError::NotImplemented("complex power out of f64 range"));
        };
        let r = re.hypot(im);
        let theta = im.atan2(re);
        let new_r = r.powf(e);
        let new_theta = theta * e;
        let out_re = new_r * new_theta.cos();
        let out_im = new_r * new_theta.sin();
        if !out_re.is_finite() || !out_im.is_finite() {
            return Err(NumError::NotImplemented("complex power out of f64 range"));
        }
        Ok(Complex {
            re: Real::Decimal(ctx.round(
                &BigDecimal::from_f64(out_re).unwrap_or_else(|| BigDecimal::from(0)),
            )),
            im: Real::Decimal(ctx.round(
                &BigDecimal::from_f64(out_im).unwrap_or_else(|| BigDecimal::from(0)),
            )),
        })
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "( {}, {} )", self.re, self.im)
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

    #[test]
    fn multiply_i_squared_is_minus_one() {
        let i = Complex::new(dec("0"), dec("1"));
        let ctx = MathContext::DEFAULT;
        let sq = i.mul(&i, ctx);
        assert_eq!(sq, Complex::new(dec("-1"), dec("0")));
    }

    #[test]
    fn divide_by_conjugate() {
        let ctx = MathContext::DEFAULT;
        let z = Complex::new(dec("3"), dec("4"));
        #[expect(clippy::unwrap_used, reason = "non-zero divisor")]
        let q = z.div(&z, ctx).unwrap();
        assert!(q.re.compare(&dec("1")) == std::cmp::Ordering::Equal);
        assert!(q.im.is_zero());
    }

    #[test]
    fn magnitude_of_three_four() {
        let ctx = MathContext::with_precision(10);
        let z = Complex::new(dec("3"), dec("4"));
        #[expect(clippy::unwrap_used, reason = "finite input")]
        let m = z.magnitude(ctx).unwrap();
        assert_eq!(m, BigDecimal::from(5));
    }

    #[test]
    fn integer_power_cycles() {
        let ctx = MathContext::DEFAULT;
        let i = Complex::new(dec("0"), dec("1"));
        #[expect(clippy::unwrap_used, reason = "integer exponent")]
        let p = i.pow_int(&BigInt::from(4), ctx).unwrap();
        assert_eq!(p, Complex::new(dec("1"), dec("0")));
    }
}
