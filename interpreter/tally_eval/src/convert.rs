//! Conversion and coercion between value kinds.
//!
//! Total for well-typed scalar inputs: every function either produces
//! the requested kind or fails with a structured error naming the
//! source kind. Collections never convert numerically.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use tally_num::{
    decimal_to_fraction, fraction_to_decimal, Complex, MathContext, Quaternion, Real,
};

use crate::errors::{conversion_error, null_value, ErrorKind, EvalError};
use crate::value::Value;

/// Convert to a decimal. Exact where the source is exact; a fraction
/// divides under the supplied context; a purely real complex (or
/// purely scalar quaternion) yields its real part, otherwise its
/// magnitude.
pub fn to_decimal(value: &Value, ctx: MathContext) -> Result<BigDecimal, EvalError> {
    match value {
        Value::Null => Err(null_value("numeric conversion")),
        Value::Boolean(b) => Ok(BigDecimal::from(u32::from(*b))),
        Value::Integer(n) => Ok(BigDecimal::from(n.clone())),
        Value::Decimal(d) => Ok(d.clone()),
        Value::Fraction(r) => Ok(fraction_to_decimal(r, ctx)),
        Value::ContinuedFraction(cf) => Ok(fraction_to_decimal(&cf.to_fraction(), ctx)),
        Value::Complex(z) => {
            if z.is_pure_real() {
                Ok(z.re.to_decimal(ctx))
            } else {
                Ok(z.magnitude(ctx)?)
            }
        }
        Value::Quaternion(q) => {
            if q.is_pure_scalar() {
                Ok(q.a.to_decimal(ctx))
            } else {
                Ok(q.magnitude(ctx)?)
            }
        }
        Value::Str(s) => BigDecimal::from_str(s.trim())
            .map_err(|_| conversion_error(&format!("string \"{s}\""), "decimal")),
        other => Err(conversion_error(other.type_name(), "decimal")),
    }
}

/// Convert to an exact fraction. Lossless for integer, decimal, and
/// fraction sources.
pub fn to_fraction(value: &Value) -> Result<BigRational, EvalError> {
    match value {
        Value::Null => Err(null_value("numeric conversion")),
        Value::Boolean(b) => Ok(BigRational::from_integer(BigInt::from(u32::from(*b)))),
        Value::Integer(n) => Ok(BigRational::from_integer(n.clone())),
        Value::Decimal(d) => Ok(decimal_to_fraction(d)),
        Value::Fraction(r) => Ok(r.clone()),
        Value::ContinuedFraction(cf) => Ok(cf.to_fraction()),
        Value::Str(s) => parse_fraction_text(s)
            .ok_or_else(|| conversion_error(&format!("string \"{s}\""), "fraction")),
        other => Err(conversion_error(other.type_name(), "fraction")),
    }
}

/// `"n/d"` or anything the decimal parser accepts.
fn parse_fraction_text(s: &str) -> Option<BigRational> {
    let s = s.trim();
    if let Some((n, d)) = s.split_once('/') {
        let numer = BigInt::from_str(n.trim()).ok()?;
        let denom = BigInt::from_str(d.trim()).ok()?;
        if denom.is_zero() {
            return None;
        }
        return Some(BigRational::new(numer, denom));
    }
    BigDecimal::from_str(s).ok().map(|d| decimal_to_fraction(&d))
}

/// Convert to an integer. Requires exactness: a nonzero fractional
/// remainder is an arithmetic error, not a truncation.
pub fn to_integer(value: &Value, ctx: MathContext) -> Result<BigInt, EvalError> {
    match value {
        Value::Null => Err(null_value("integer conversion")),
        Value::Boolean(b) => Ok(BigInt::from(u32::from(*b))),
        Value::Integer(n) => Ok(n.clone()),
        Value::Decimal(d) => whole_decimal(d),
        Value::Fraction(r) => {
            if r.is_integer() {
                Ok(r.to_integer())
            } else {
                Err(EvalError::new(
                    ErrorKind::Arithmetic,
                    format!("{r} has a fractional part"),
                ))
            }
        }
        Value::ContinuedFraction(cf) => {
            let r = cf.to_fraction();
            if r.is_integer() {
                Ok(r.to_integer())
            } else {
                Err(EvalError::new(
                    ErrorKind::Arithmetic,
                    "continued fraction has a fractional part",
                ))
            }
        }
        Value::Complex(_) | Value::Quaternion(_) => {
            let d = to_decimal(value, ctx)?;
            whole_decimal(&d)
        }
        Value::Str(s) => BigInt::from_str(s.trim())
            .map_err(|_| conversion_error(&format!("string \"{s}\""), "integer")),
        other => Err(conversion_error(other.type_name(), "integer")),
    }
}

fn whole_decimal(d: &BigDecimal) -> Result<BigInt, EvalError> {
    match tally_num::fixup(d) {
        tally_num::Canonical::Int(n) => Ok(n),
        tally_num::Canonical::Dec(d) => Err(EvalError::new(
            ErrorKind::Arithmetic,
            format!("{d} has a fractional part"),
        )),
    }
}

/// Truthiness. `Null` and empty strings/collections are false;
/// non-empty collections are true; strings go through the boolean
/// literal parser and default to true when non-empty but unparseable.
pub fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Boolean(b) => *b,
        Value::Integer(n) => !n.is_zero(),
        Value::Decimal(d) => !d.is_zero(),
        Value::Fraction(r) => !r.is_zero(),
        Value::ContinuedFraction(cf) => !cf.is_zero(),
        Value::Complex(z) => !(z.re.is_zero() && z.im.is_zero()),
        Value::Quaternion(q) => {
            !(q.a.is_zero() && q.b.is_zero() && q.c.is_zero() && q.d.is_zero())
        }
        Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => false,
            "false" | "f" | "no" | "n" | "off" | "0" => false,
            "true" | "t" | "yes" | "y" | "on" | "1" => true,
            _ => true,
        },
        Value::Array(a) => !a.borrow().is_empty(),
        Value::Object(o) => !o.borrow().is_empty(),
        Value::Set(s) => !s.borrow().is_empty(),
        Value::Function(_) => true,
    }
}

/// A real component for complex/quaternion arithmetic: fractions when
/// rational mode is active, decimals otherwise.
pub fn to_real(value: &Value, rational: bool, ctx: MathContext) -> Result<Real, EvalError> {
    if rational {
        Ok(Real::Fraction(to_fraction(value)?))
    } else {
        Ok(Real::Decimal(to_decimal(value, ctx)?))
    }
}

/// Promote to complex. Already-complex values pass through with their
/// components switched to the active component type.
pub fn to_complex(value: &Value, rational: bool, ctx: MathContext) -> Result<Complex, EvalError> {
    match value {
        Value::Complex(z) => Ok(Complex::new(
            z.re.with_rational(rational, ctx),
            z.im.with_rational(rational, ctx),
        )),
        Value::Quaternion(q) if q.is_pure_scalar() => {
            Ok(Complex::from_real(q.a.with_rational(rational, ctx)))
        }
        Value::Quaternion(_) => Err(conversion_error("quaternion", "complex")),
        other => Ok(Complex::from_real(to_real(other, rational, ctx)?)),
    }
}

/// Promote to quaternion. Any scalar numeric or complex value embeds.
pub fn to_quaternion(
    value: &Value,
    rational: bool,
    ctx: MathContext,
) -> Result<Quaternion, EvalError> {
    match value {
        Value::Quaternion(q) => Ok(Quaternion::new(
            q.a.with_rational(rational, ctx),
            q.b.with_rational(rational, ctx),
            q.c.with_rational(rational, ctx),
            q.d.with_rational(rational, ctx),
        )),
        Value::Complex(z) => Ok(Quaternion::from_complex(&Complex::new(
            z.re.with_rational(rational, ctx),
            z.im.with_rational(rational, ctx),
        ))),
        other => Ok(Quaternion::from_real(to_real(other, rational, ctx)?)),
    }
}

/// Resolve an index into a sequence of `len` elements. Negative
/// indexes count from the end.
pub fn to_index(value: &Value, len: usize, ctx: MathContext) -> Result<usize, EvalError> {
    let n = to_integer(value, ctx)?;
    let idx = if n.is_negative() {
        &n + BigInt::from(len)
    } else {
        n.clone()
    };
    idx.to_usize().filter(|&i| i < len).ok_or_else(|| {
        EvalError::new(
            ErrorKind::Arithmetic,
            format!("index {n} out of range for length {len}"),
        )
    })
}

/// Demote a complex to a simpler kind when its imaginary part is zero,
/// and a quaternion to complex when its j/k parts are zero.
pub fn demote(value: Value) -> Value {
    match value {
        Value::Complex(z) if z.is_pure_real() => real_to_value(&z.re),
        Value::Quaternion(q) if q.c.is_zero() && q.d.is_zero() => {
            if q.b.is_zero() {
                real_to_value(&q.a)
            } else {
                Value::Complex(Complex::new(q.a.clone(), q.b.clone()))
            }
        }
        Value::Decimal(d) => match tally_num::fixup(&d) {
            tally_num::Canonical::Int(n) => Value::Integer(n),
            tally_num::Canonical::Dec(d) => Value::Decimal(d),
        },
        Value::Fraction(r) if r.is_integer() => Value::Integer(r.to_integer()),
        other => other,
    }
}

/// A `Real` back into a `Value`, canonicalized.
pub fn real_to_value(r: &Real) -> Value {
    match r {
        Real::Decimal(d) => match tally_num::fixup(d) {
            tally_num::Canonical::Int(n) => Value::Integer(n),
            tally_num::Canonical::Dec(d) => Value::Decimal(d),
        },
        Real::Fraction(f) => {
            if f.is_integer() {
                Value::Integer(f.to_integer())
            } else {
                Value::Fraction(f.clone())
            }
        }
    }
}

/// Is this decimal (or integer/fraction) exactly one? Used by the
/// range shortcuts.
pub fn is_one(value: &Value) -> bool {
    match value {
        Value::Integer(n) => n.is_one(),
        Value::Decimal(d) => d == &BigDecimal::one(),
        Value::Fraction(r) => r.is_one(),
        _ => false,
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "panicking on bad test input is fine")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn decimal_conversion_is_exact_for_integers() {
        let v = Value::integer(7);
        assert_eq!(to_decimal(&v, MathContext::DEFAULT).unwrap().to_string(), "7");
    }

    #[test]
    fn integer_conversion_requires_exactness() {
        let v = Value::Decimal(dec("2.5"));
        assert!(to_integer(&v, MathContext::DEFAULT).is_err());
        let v = Value::Decimal(dec("2.000"));
        assert_eq!(to_integer(&v, MathContext::DEFAULT).unwrap(), BigInt::from(2));
    }

    #[test]
    fn null_is_rejected_not_coerced() {
        let err = to_decimal(&Value::Null, MathContext::DEFAULT);
        assert!(matches!(err, Err(e) if e.kind == ErrorKind::NullValue));
    }

    #[test]
    fn truthiness() {
        assert!(!to_boolean(&Value::Null));
        assert!(!to_boolean(&Value::string("")));
        assert!(!to_boolean(&Value::string("off")));
        assert!(to_boolean(&Value::string("banana")));
        assert!(!to_boolean(&Value::array(vec![])));
        assert!(to_boolean(&Value::array(vec![Value::Null])));
    }

    #[test]
    fn fraction_text_parses_both_forms() {
        let r = parse_fraction_text("3/6");
        assert_eq!(r, Some(BigRational::new(1.into(), 2.into())));
        let r = parse_fraction_text("0.25");
        assert_eq!(r, Some(BigRational::new(1.into(), 4.into())));
    }

    #[test]
    fn negative_index_counts_from_end() {
        let v = Value::integer(-1);
        assert_eq!(to_index(&v, 3, MathContext::DEFAULT).unwrap(), 2);
        let v = Value::integer(3);
        assert!(to_index(&v, 3, MathContext::DEFAULT).is_err());
    }

    #[test]
    fn demotion_collapses_pure_reals() {
        let z = Complex::from_real(Real::Decimal(dec("4.00")));
        assert!(matches!(demote(Value::Complex(z)), Value::Integer(n) if n == 4.into()));
    }
}
