//! Built-in functions.
//!
//! Dispatch happens after scope lookup misses, so a user definition of
//! the same name shadows the built-in.

use bigdecimal::{BigDecimal, Zero};
use num_rational::BigRational;
use num_traits::Signed;
use tally_num::{
    dec_sqrt, fraction_to_decimal, gcd, lcm, Complex, ContinuedFraction, MathContext, Real,
    TrigMode,
};

use crate::compare::{compare, CompareFlags};
use crate::convert::{demote, to_decimal, to_fraction, to_integer};
use crate::errors::{EvalError, EvalResult, ErrorKind};
use crate::value::Value;

/// Evaluation context the built-ins need.
pub struct BuiltinCtx {
    pub rational: bool,
    pub ignore_case: bool,
    pub ctx: MathContext,
    pub trig: TrigMode,
    pub pi: BigDecimal,
}

#[cold]
fn arity_error(name: &str, expected: &str, got: usize) -> EvalError {
    EvalError::new(
        ErrorKind::Conversion,
        format!("{name} expects {expected} argument(s), got {got}"),
    )
}

/// Call a built-in by name. `None` means the name is not a built-in
/// and lookup should fail as undefined.
pub fn call_builtin(name: &str, args: &[Value], bctx: &BuiltinCtx) -> Option<EvalResult> {
    let result = match name {
        "typeof" => one(name, args).map(|v| Value::string(v.type_name())),
        "length" => one(name, args).and_then(length),
        "scale" => one(name, args).and_then(|v| scale(v, bctx)),
        "abs" => one(name, args).and_then(|v| abs(v, bctx)),
        "sign" => one(name, args).and_then(sign),
        "sqrt" => one(name, args).and_then(|v| sqrt(v, bctx)),
        "gcd" => two(name, args).and_then(|(a, b)| {
            Ok(Value::Integer(gcd(&to_integer(a, bctx.ctx)?, &to_integer(b, bctx.ctx)?)))
        }),
        "lcm" => two(name, args).and_then(|(a, b)| {
            Ok(Value::Integer(lcm(&to_integer(a, bctx.ctx)?, &to_integer(b, bctx.ctx)?)))
        }),
        "min" => extremum(name, args, bctx, std::cmp::Ordering::Less),
        "max" => extremum(name, args, bctx, std::cmp::Ordering::Greater),
        "floor" => one(name, args).and_then(|v| Ok(Value::Integer(to_fraction(v)?.floor().to_integer()))),
        "ceil" => one(name, args).and_then(|v| Ok(Value::Integer(to_fraction(v)?.ceil().to_integer()))),
        "round" => round(name, args, bctx),
        "frac" => frac(name, args, bctx),
        "cf" => one(name, args).and_then(|v| {
            Ok(demote(Value::ContinuedFraction(ContinuedFraction::from_fraction(
                &to_fraction(v)?,
            ))))
        }),
        "dec" => one(name, args).and_then(|v| Ok(demote(Value::Decimal(to_decimal(v, bctx.ctx)?)))),
        "sin" => one(name, args).and_then(|v| {
            Ok(demote(Value::Decimal(tally_num::sin(
                &to_decimal(v, bctx.ctx)?,
                bctx.trig,
                &bctx.pi,
                bctx.ctx,
            ))))
        }),
        "cos" => one(name, args).and_then(|v| {
            Ok(demote(Value::Decimal(tally_num::cos(
                &to_decimal(v, bctx.ctx)?,
                bctx.trig,
                &bctx.pi,
                bctx.ctx,
            ))))
        }),
        "tan" => one(name, args).and_then(|v| {
            Ok(demote(Value::Decimal(tally_num::tan(
                &to_decimal(v, bctx.ctx)?,
                bctx.trig,
                &bctx.pi,
                bctx.ctx,
            )?)))
        }),
        _ => return None,
    };
    Some(result)
}

fn one<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, EvalError> {
    match args {
        [v] => Ok(v),
        _ => Err(arity_error(name, "1", args.len())),
    }
}

fn two<'a>(name: &str, args: &'a [Value]) -> Result<(&'a Value, &'a Value), EvalError> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(arity_error(name, "2", args.len())),
    }
}

fn length(v: &Value) -> EvalResult {
    let n = match v {
        Value::Null => 0,
        Value::Str(s) => s.chars().count(),
        Value::Array(a) => a.borrow().len(),
        Value::Set(s) => s.borrow().len(),
        Value::Object(o) => o.borrow().len(),
        other => {
            return Err(EvalError::new(
                ErrorKind::Conversion,
                format!("length is not defined for {}", other.type_name()),
            ))
        }
    };
    Ok(Value::integer(n as u64))
}

/// Digits after the decimal point; zero for whole values.
fn scale(v: &Value, bctx: &BuiltinCtx) -> EvalResult {
    match v {
        Value::Integer(_) | Value::Boolean(_) => Ok(Value::integer(0)),
        _ => {
            let d = to_decimal(v, bctx.ctx)?.normalized();
            Ok(Value::integer(d.fractional_digit_count().max(0) as u64))
        }
    }
}

fn abs(v: &Value, bctx: &BuiltinCtx) -> EvalResult {
    match v {
        Value::Integer(n) => Ok(Value::Integer(n.abs())),
        Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
        Value::Fraction(r) => Ok(Value::Fraction(r.abs())),
        Value::ContinuedFraction(cf) => {
            Ok(demote(Value::Fraction(cf.to_fraction().abs())))
        }
        Value::Complex(z) => Ok(demote(Value::Decimal(z.magnitude(bctx.ctx)?))),
        Value::Quaternion(q) => Ok(demote(Value::Decimal(q.magnitude(bctx.ctx)?))),
        Value::Boolean(b) => Ok(Value::integer(u32::from(*b))),
        other => Err(EvalError::new(
            ErrorKind::Conversion,
            format!("abs is not defined for {}", other.type_name()),
        )),
    }
}

fn sign(v: &Value) -> EvalResult {
    let r = to_fraction(v).map_err(|_| {
        EvalError::new(
            ErrorKind::Conversion,
            format!("sign is not defined for {}", v.type_name()),
        )
    })?;
    Ok(Value::integer(if r.is_zero() {
        0
    } else if r.is_negative() {
        -1
    } else {
        1
    }))
}

/// Square root; negative reals come back imaginary.
fn sqrt(v: &Value, bctx: &BuiltinCtx) -> EvalResult {
    if matches!(v, Value::Complex(_) | Value::Quaternion(_)) {
        return Err(EvalError::new(
            ErrorKind::Arithmetic,
            format!("sqrt is not defined for {}", v.type_name()),
        ));
    }
    let r = to_fraction(v)?;
    if r.is_negative() {
        let root = dec_sqrt(&fraction_to_decimal(&(-r), bctx.ctx), bctx.ctx)?;
        return Ok(Value::Complex(Complex::new(
            Real::zero_decimal(),
            Real::Decimal(root),
        )));
    }
    let root = Real::Fraction(r).sqrt(bctx.ctx)?;
    Ok(demote(Value::Decimal(root.to_decimal(bctx.ctx))))
}

fn extremum(
    name: &str,
    args: &[Value],
    bctx: &BuiltinCtx,
    keep: std::cmp::Ordering,
) -> EvalResult {
    // A single array argument spreads to its elements.
    let spread: Vec<Value> = match args {
        [Value::Array(a)] => a.borrow().clone(),
        _ => args.to_vec(),
    };
    let mut iter = spread.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(arity_error(name, "at least 1", 0));
    };
    let flags = CompareFlags {
        strict: false,
        allow_nulls: false,
        ignore_case: bctx.ignore_case,
        natural_order: false,
        equality: false,
    };
    for v in iter {
        if compare(&v, &best, flags, bctx.ctx)? == keep {
            best = v;
        }
    }
    Ok(best)
}

/// `round(x)` or `round(x, places)`.
fn round(name: &str, args: &[Value], bctx: &BuiltinCtx) -> EvalResult {
    let (v, places) = match args {
        [v] => (v, 0i64),
        [v, p] => {
            let p = to_integer(p, bctx.ctx)?;
            let p = i64::try_from(&p).map_err(|_| {
                EvalError::new(ErrorKind::Arithmetic, "rounding scale too large")
            })?;
            (v, p)
        }
        _ => return Err(arity_error(name, "1 or 2", args.len())),
    };
    let d = to_decimal(v, bctx.ctx)?;
    let rounded = d.with_scale_round(places, bigdecimal::RoundingMode::HalfUp);
    Ok(demote(Value::Decimal(rounded)))
}

/// `frac(n, d)` or `frac(x)`: always lands on the fraction kind
/// unless the value is whole.
fn frac(name: &str, args: &[Value], bctx: &BuiltinCtx) -> EvalResult {
    let r = match args {
        [v] => to_fraction(v)?,
        [n, d] => {
            let denom = to_integer(d, bctx.ctx)?;
            if denom.is_zero() {
                return Err(crate::errors::divide_by_zero());
            }
            BigRational::new(to_integer(n, bctx.ctx)?, denom)
        }
        _ => return Err(arity_error(name, "1 or 2", args.len())),
    };
    Ok(Value::Fraction(r))
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "panicking on bad test input is fine")]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;
    use tally_num::compute_pi;

    fn bctx() -> BuiltinCtx {
        BuiltinCtx {
            rational: false,
            ignore_case: false,
            ctx: MathContext::DEFAULT,
            trig: TrigMode::Radians,
            pi: compute_pi(MathContext::DEFAULT),
        }
    }

    fn call(name: &str, args: &[Value]) -> Value {
        call_builtin(name, args, &bctx()).unwrap().unwrap()
    }

    #[test]
    fn typeof_reports_kind_names() {
        assert!(matches!(call("typeof", &[Value::integer(1)]), Value::Str(s) if s == "integer"));
        assert!(matches!(
            call("typeof", &[Value::array(vec![])]),
            Value::Str(s) if s == "array"
        ));
    }

    #[test]
    fn unknown_names_are_not_builtins() {
        assert!(call_builtin("no_such", &[], &bctx()).is_none());
    }

    #[test]
    fn length_counts_chars_and_elements() {
        assert!(matches!(call("length", &[Value::string("héllo")]), Value::Integer(n) if n == 5.into()));
        assert!(matches!(
            call("length", &[Value::array(vec![Value::Null, Value::Null])]),
            Value::Integer(n) if n == 2.into()
        ));
    }

    #[test]
    fn sqrt_of_negative_goes_imaginary() {
        let v = call("sqrt", &[Value::integer(-4)]);
        let Value::Complex(z) = v else { panic!("expected complex") };
        assert!(z.re.is_zero());
        assert_eq!(z.im.to_decimal(MathContext::DEFAULT), BigDecimal::from(2));
    }

    #[test]
    fn sqrt_of_square_is_exact() {
        let v = call("sqrt", &[Value::integer(9)]);
        assert!(matches!(v, Value::Integer(n) if n == 3.into()));
    }

    #[test]
    fn min_max_spread_arrays() {
        let arr = Value::array(vec![Value::integer(4), Value::integer(1), Value::integer(9)]);
        assert!(matches!(call("min", &[arr.clone()]), Value::Integer(n) if n == 1.into()));
        assert!(matches!(call("max", &[arr]), Value::Integer(n) if n == 9.into()));
    }

    #[test]
    fn round_honors_places() {
        let v = call(
            "round",
            &[
                Value::Decimal(BigDecimal::from_str("2.347").unwrap()),
                Value::integer(2),
            ],
        );
        assert!(matches!(v, Value::Decimal(d) if d == BigDecimal::from_str("2.35").unwrap()));
    }

    #[test]
    fn floor_and_ceil_are_exact_on_fractions() {
        let third = Value::Fraction(BigRational::new((-1).into(), 3.into()));
        assert!(matches!(call("floor", &[third.clone()]), Value::Integer(n) if n == BigInt::from(-1)));
        assert!(matches!(call("ceil", &[third]), Value::Integer(n) if n == BigInt::from(0)));
    }

    #[test]
    fn frac_builds_fractions() {
        let v = call("frac", &[Value::integer(2), Value::integer(4)]);
        assert!(matches!(v, Value::Fraction(r) if r == BigRational::new(1.into(), 2.into())));
    }

    #[test]
    fn sin_of_zero() {
        let v = call("sin", &[Value::integer(0)]);
        assert!(matches!(v, Value::Integer(n) if n.is_zero()));
    }

    #[test]
    fn scale_counts_fraction_digits() {
        let v = call("scale", &[Value::Decimal(BigDecimal::from_str("1.250").unwrap())]);
        assert!(matches!(v, Value::Integer(n) if n == 2.into()));
    }
}
