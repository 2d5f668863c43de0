//! Binary and unary operator implementations.
//!
//! Short-circuiting `&&`/`||` and the `in` membership test live in the
//! interpreter (they need unevaluated operands); everything else is a
//! value-to-value function here.

use std::cmp::Ordering;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use tally_ir::{BinaryOp, UnaryOp};
use tally_num::{dec_pow, factorial, int_pow, MathContext, NumError};

use crate::compare::{compare, CompareFlags};
use crate::convert::{
    demote, to_boolean, to_complex, to_decimal, to_fraction, to_integer, to_quaternion,
};
use crate::errors::{divide_by_zero, invalid_operand, EvalError, EvalResult};
use crate::render::{render, RenderConfig};
use crate::value::Value;

/// Settings the operator engine needs from the session.
#[derive(Copy, Clone, Debug)]
pub struct OpSettings {
    pub rational: bool,
    pub ignore_case: bool,
    pub ctx: MathContext,
}

impl OpSettings {
    pub fn new(rational: bool, ignore_case: bool, ctx: MathContext) -> Self {
        OpSettings {
            rational,
            ignore_case,
            ctx,
        }
    }

    fn compare_flags(self, strict: bool, equality: bool) -> CompareFlags {
        CompareFlags {
            strict,
            allow_nulls: equality,
            ignore_case: self.ignore_case,
            natural_order: false,
            equality,
        }
    }
}

/// Dispatch a non-short-circuit binary operator.
pub fn binary_op(op: BinaryOp, a: &Value, b: &Value, opts: OpSettings) -> EvalResult {
    match op {
        BinaryOp::Add => add_op(a, b, opts),
        BinaryOp::Subtract => numeric_op(op, a, b, opts),
        BinaryOp::Multiply => numeric_op(op, a, b, opts),
        BinaryOp::Divide => divide_op(a, b, opts),
        BinaryOp::IntDivide => int_divide_op(a, b, opts),
        BinaryOp::Modulus => modulus_op(a, b, opts),
        BinaryOp::Power => power_op(a, b, opts),
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => bit_op(op, a, b, opts),
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight => shift_op(op, a, b, opts),
        BinaryOp::BoolXor => Ok(Value::Boolean(to_boolean(a) != to_boolean(b))),
        BinaryOp::Equal => equality(a, b, opts, false, false),
        BinaryOp::NotEqual => equality(a, b, opts, false, true),
        BinaryOp::StrictEqual => equality(a, b, opts, true, false),
        BinaryOp::StrictNotEqual => equality(a, b, opts, true, true),
        BinaryOp::Less => ordering(a, b, opts, &[Ordering::Less]),
        BinaryOp::LessEqual => ordering(a, b, opts, &[Ordering::Less, Ordering::Equal]),
        BinaryOp::Greater => ordering(a, b, opts, &[Ordering::Greater]),
        BinaryOp::GreaterEqual => ordering(a, b, opts, &[Ordering::Greater, Ordering::Equal]),
        BinaryOp::Spaceship => {
            let ord = compare(a, b, opts.compare_flags(false, false), opts.ctx)?;
            Ok(Value::integer(match ord {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            }))
        }
        // Handled by the interpreter.
        BinaryOp::And | BinaryOp::Or | BinaryOp::In => Err(EvalError::new(
            crate::errors::ErrorKind::UnknownOperator,
            format!("operator `{}` reached the value engine", op.as_symbol()),
        )),
    }
}

fn equality(a: &Value, b: &Value, opts: OpSettings, strict: bool, negate: bool) -> EvalResult {
    let ord = compare(a, b, opts.compare_flags(strict, true), opts.ctx)?;
    let equal = ord == Ordering::Equal;
    Ok(Value::Boolean(equal != negate))
}

fn ordering(a: &Value, b: &Value, opts: OpSettings, accept: &[Ordering]) -> EvalResult {
    let ord = compare(a, b, opts.compare_flags(false, false), opts.ctx)?;
    Ok(Value::Boolean(accept.contains(&ord)))
}

/// Is this an empty collection (the `{}` literal or any drained one)?
fn is_empty_collection(v: &Value) -> bool {
    match v {
        Value::Array(a) => a.borrow().is_empty(),
        Value::Object(o) => o.borrow().is_empty(),
        Value::Set(s) => s.borrow().is_empty(),
        _ => false,
    }
}

/// `+`: collection concatenation, string concatenation, or numeric
/// addition, in that order of preference. Always allocates fresh
/// collections.
pub fn add_op(a: &Value, b: &Value, opts: OpSettings) -> EvalResult {
    // An empty collection adopts the type of whatever it meets.
    if a.is_collection() && b.is_collection() {
        if is_empty_collection(a) && std::mem::discriminant(a) != std::mem::discriminant(b) {
            return copy_collection(b);
        }
        if is_empty_collection(b) && std::mem::discriminant(a) != std::mem::discriminant(b) {
            return copy_collection(a);
        }
    }

    match (a, b) {
        (Value::Array(x), _) => {
            let mut out: Vec<Value> = x.borrow().clone();
            match b {
                Value::Array(y) => out.extend(y.borrow().iter().cloned()),
                Value::Set(y) => out.extend(y.borrow().iter().cloned()),
                other => out.push(other.clone()),
            }
            Ok(Value::array(out))
        }
        (Value::Object(x), Value::Object(y)) => {
            let mut out = x.borrow().clone();
            for (k, v) in y.borrow().iter() {
                out.insert(k.clone(), v.clone(), opts.ignore_case);
            }
            Ok(Value::object(out))
        }
        (Value::Object(_), other) => Err(invalid_operand("+", other.type_name())),
        (Value::Set(x), _) => {
            let mut out: Vec<Value> = x.borrow().clone();
            let mut push_unique = |v: &Value| -> Result<(), EvalError> {
                for existing in &out {
                    if compare(existing, v, opts.compare_flags(false, true), opts.ctx)?
                        == Ordering::Equal
                    {
                        return Ok(());
                    }
                }
                out.push(v.clone());
                Ok(())
            };
            match b {
                Value::Set(y) => {
                    for v in y.borrow().iter() {
                        push_unique(v)?;
                    }
                }
                Value::Array(y) => {
                    for v in y.borrow().iter() {
                        push_unique(v)?;
                    }
                }
                other => push_unique(other)?,
            }
            Ok(Value::set(out))
        }
        (_, Value::Array(_) | Value::Object(_) | Value::Set(_)) => {
            Err(invalid_operand("+", a.type_name()))
        }
        (Value::Str(_), _) | (_, Value::Str(_)) => {
            let config = RenderConfig::plain();
            Ok(Value::string(format!(
                "{}{}",
                render(a, &config),
                render(b, &config)
            )))
        }
        _ => numeric_op(BinaryOp::Add, a, b, opts),
    }
}

fn copy_collection(v: &Value) -> EvalResult {
    match v {
        Value::Array(x) => Ok(Value::array(x.borrow().clone())),
        Value::Object(x) => Ok(Value::object(x.borrow().clone())),
        Value::Set(x) => Ok(Value::set(x.borrow().clone())),
        _ => Ok(v.clone()),
    }
}

/// `-` and `*` (and numeric `+`) through the promotion lattice.
fn numeric_op(op: BinaryOp, a: &Value, b: &Value, opts: OpSettings) -> EvalResult {
    let priority = promotion_priority(a, b, op)?;

    if priority == 7 {
        let qa = to_quaternion(a, opts.rational, opts.ctx)?;
        let qb = to_quaternion(b, opts.rational, opts.ctx)?;
        let q = match op {
            BinaryOp::Add => qa.add(&qb, opts.ctx),
            BinaryOp::Subtract => qa.sub(&qb, opts.ctx),
            BinaryOp::Multiply => qa.mul(&qb, opts.ctx),
            _ => unreachable!(),
        };
        return Ok(demote(Value::Quaternion(q)));
    }
    if priority == 6 {
        let za = to_complex(a, opts.rational, opts.ctx)?;
        let zb = to_complex(b, opts.rational, opts.ctx)?;
        let z = match op {
            BinaryOp::Add => za.add(&zb, opts.ctx),
            BinaryOp::Subtract => za.sub(&zb, opts.ctx),
            BinaryOp::Multiply => za.mul(&zb, opts.ctx),
            _ => unreachable!(),
        };
        return Ok(demote(Value::Complex(z)));
    }
    if priority >= 4 || opts.rational {
        let fa = to_fraction(a)?;
        let fb = to_fraction(b)?;
        let r = match op {
            BinaryOp::Add => fa + fb,
            BinaryOp::Subtract => fa - fb,
            BinaryOp::Multiply => fa * fb,
            _ => unreachable!(),
        };
        return Ok(demote(Value::Fraction(r)));
    }
    if priority == 3 {
        let da = to_decimal(a, opts.ctx)?;
        let db = to_decimal(b, opts.ctx)?;
        let d = match op {
            BinaryOp::Add => da + db,
            BinaryOp::Subtract => da - db,
            BinaryOp::Multiply => opts.ctx.round(&(da * db)),
            _ => unreachable!(),
        };
        return Ok(demote(Value::Decimal(d)));
    }
    let ia = to_integer(a, opts.ctx)?;
    let ib = to_integer(b, opts.ctx)?;
    Ok(Value::Integer(match op {
        BinaryOp::Add => ia + ib,
        BinaryOp::Subtract => ia - ib,
        BinaryOp::Multiply => ia * ib,
        _ => unreachable!(),
    }))
}

/// Common numeric priority for two operands; rejects collections.
fn promotion_priority(a: &Value, b: &Value, op: BinaryOp) -> Result<u8, EvalError> {
    let pa = a
        .numeric_priority()
        .ok_or_else(|| invalid_operand(op.as_symbol(), a.type_name()))?;
    let pb = b
        .numeric_priority()
        .ok_or_else(|| invalid_operand(op.as_symbol(), b.type_name()))?;
    Ok(pa.max(pb))
}

fn divide_op(a: &Value, b: &Value, opts: OpSettings) -> EvalResult {
    let priority = promotion_priority(a, b, BinaryOp::Divide)?;
    if priority == 7 {
        let qa = to_quaternion(a, opts.rational, opts.ctx)?;
        let qb = to_quaternion(b, opts.rational, opts.ctx)?;
        return Ok(demote(Value::Quaternion(qa.div(&qb, opts.ctx)?)));
    }
    if priority == 6 {
        let za = to_complex(a, opts.rational, opts.ctx)?;
        let zb = to_complex(b, opts.rational, opts.ctx)?;
        return Ok(demote(Value::Complex(za.div(&zb, opts.ctx)?)));
    }
    if priority >= 4 || opts.rational {
        let fa = to_fraction(a)?;
        let fb = to_fraction(b)?;
        if fb.is_zero() {
            return Err(divide_by_zero());
        }
        return Ok(demote(Value::Fraction(fa / fb)));
    }
    let da = to_decimal(a, opts.ctx)?;
    let db = to_decimal(b, opts.ctx)?;
    if db.is_zero() {
        return Err(divide_by_zero());
    }
    Ok(demote(Value::Decimal(opts.ctx.div(&da, &db))))
}

/// `\`: division truncated toward zero, always an integer.
fn int_divide_op(a: &Value, b: &Value, _opts: OpSettings) -> EvalResult {
    promotion_priority(a, b, BinaryOp::IntDivide)?;
    let fa = to_fraction(a)?;
    let fb = to_fraction(b)?;
    if fb.is_zero() {
        return Err(divide_by_zero());
    }
    Ok(Value::Integer((fa / fb).trunc().to_integer()))
}

/// `%`: remainder with the dividend's sign, exact for exact inputs.
fn modulus_op(a: &Value, b: &Value, opts: OpSettings) -> EvalResult {
    let priority = promotion_priority(a, b, BinaryOp::Modulus)?;
    if priority <= 2 && !opts.rational {
        let ia = to_integer(a, opts.ctx)?;
        let ib = to_integer(b, opts.ctx)?;
        if ib.is_zero() {
            return Err(divide_by_zero());
        }
        return Ok(Value::Integer(ia % ib));
    }
    let fa = to_fraction(a)?;
    let fb = to_fraction(b)?;
    if fb.is_zero() {
        return Err(divide_by_zero());
    }
    let quotient = (&fa / &fb).trunc();
    let result = fa - fb * quotient;
    if opts.rational {
        Ok(demote(Value::Fraction(result)))
    } else {
        Ok(demote(Value::Decimal(tally_num::fraction_to_decimal(
            &result, opts.ctx,
        ))))
    }
}

/// `**`: branches by operand kind; quaternions take integer exponents
/// only, complex handles fractional exponents by principal value, and
/// a negative real base with a fractional exponent promotes to
/// complex.
pub fn power_op(a: &Value, b: &Value, opts: OpSettings) -> EvalResult {
    let priority = promotion_priority(a, b, BinaryOp::Power)?;

    // Integer exponent fast paths, preserving exactness.
    if let Ok(exp) = to_integer(b, opts.ctx) {
        if priority == 7 || matches!(a, Value::Quaternion(_)) {
            let qa = to_quaternion(a, opts.rational, opts.ctx)?;
            return Ok(demote(Value::Quaternion(qa.pow_int(&exp, opts.ctx)?)));
        }
        if matches!(a, Value::Complex(_)) {
            let za = to_complex(a, opts.rational, opts.ctx)?;
            return Ok(demote(Value::Complex(za.pow_int(&exp, opts.ctx)?)));
        }
        if matches!(a, Value::Fraction(_) | Value::ContinuedFraction(_)) || opts.rational {
            return fraction_pow(&to_fraction(a)?, &exp);
        }
        if let Value::Integer(base) = a {
            return integer_pow(base, &exp, opts);
        }
        let da = to_decimal(a, opts.ctx)?;
        let db = BigDecimal::from(exp);
        return Ok(demote(Value::Decimal(dec_pow(&da, &db, opts.ctx)?)));
    }

    if matches!(a, Value::Quaternion(_)) {
        return Err(EvalError::new(
            crate::errors::ErrorKind::Arithmetic,
            "quaternion to a fractional power is not implemented",
        ));
    }

    let db = to_decimal(b, opts.ctx)?;
    if matches!(a, Value::Complex(_)) {
        let za = to_complex(a, false, opts.ctx)?;
        return Ok(demote(Value::Complex(za.pow(&db, opts.ctx)?)));
    }
    let da = to_decimal(a, opts.ctx)?;
    match dec_pow(&da, &db, opts.ctx) {
        Ok(d) => Ok(demote(Value::Decimal(d))),
        // Negative base, fractional exponent: principal complex value.
        Err(NumError::NotImplemented(_)) => {
            let za = to_complex(a, false, opts.ctx)?;
            Ok(demote(Value::Complex(za.pow(&db, opts.ctx)?)))
        }
        Err(e) => Err(e.into()),
    }
}

fn integer_pow(base: &BigInt, exp: &BigInt, opts: OpSettings) -> EvalResult {
    if let Some(e) = exp.to_u64() {
        return Ok(Value::Integer(int_pow(base, e)));
    }
    // Negative exponent: exact reciprocal.
    if base.is_zero() {
        return Err(EvalError::from(NumError::ZeroToNegativePower));
    }
    let e = exp
        .magnitude()
        .to_u64()
        .ok_or_else(|| EvalError::new(crate::errors::ErrorKind::Arithmetic, "exponent too large"))?;
    let denom = int_pow(base, e);
    let r = BigRational::new(BigInt::from(1), denom);
    if opts.rational {
        Ok(demote(Value::Fraction(r)))
    } else {
        Ok(demote(Value::Decimal(tally_num::fraction_to_decimal(
            &r, opts.ctx,
        ))))
    }
}

fn fraction_pow(base: &BigRational, exp: &BigInt) -> EvalResult {
    let e = exp.magnitude().to_u64().ok_or_else(|| {
        EvalError::new(crate::errors::ErrorKind::Arithmetic, "exponent too large")
    })?;
    let numer = int_pow(base.numer(), e);
    let denom = int_pow(base.denom(), e);
    if denom.is_zero() {
        return Err(divide_by_zero());
    }
    let r = BigRational::new(numer, denom);
    if exp.is_negative() {
        if r.is_zero() {
            return Err(EvalError::from(NumError::ZeroToNegativePower));
        }
        Ok(demote(Value::Fraction(r.recip())))
    } else {
        Ok(demote(Value::Fraction(r)))
    }
}

/// `& | ^`: set algebra on sets, the logic family on booleans,
/// bitwise on integers.
pub fn bit_op(op: BinaryOp, a: &Value, b: &Value, opts: OpSettings) -> EvalResult {
    if let (Value::Set(x), Value::Set(y)) = (a, b) {
        return set_algebra(op, &x.borrow(), &y.borrow(), opts);
    }
    if let (Value::Boolean(x), Value::Boolean(y)) = (a, b) {
        return Ok(Value::Boolean(match op {
            BinaryOp::BitAnd => *x && *y,
            BinaryOp::BitOr => *x || *y,
            BinaryOp::BitXor => x != y,
            _ => unreachable!(),
        }));
    }
    let ia = to_integer(a, opts.ctx)?;
    let ib = to_integer(b, opts.ctx)?;
    Ok(Value::Integer(match op {
        BinaryOp::BitAnd => ia & ib,
        BinaryOp::BitOr => ia | ib,
        BinaryOp::BitXor => ia ^ ib,
        _ => unreachable!(),
    }))
}

fn set_algebra(op: BinaryOp, x: &[Value], y: &[Value], opts: OpSettings) -> EvalResult {
    let flags = opts.compare_flags(false, true);
    let contains = |side: &[Value], v: &Value| -> Result<bool, EvalError> {
        for e in side {
            if compare(e, v, flags, opts.ctx)? == Ordering::Equal {
                return Ok(true);
            }
        }
        Ok(false)
    };
    let mut out = Vec::new();
    match op {
        BinaryOp::BitAnd => {
            for v in x {
                if contains(y, v)? {
                    out.push(v.clone());
                }
            }
        }
        BinaryOp::BitOr => {
            out.extend(x.iter().cloned());
            for v in y {
                if !contains(x, v)? {
                    out.push(v.clone());
                }
            }
        }
        BinaryOp::BitXor => {
            for v in x {
                if !contains(y, v)? {
                    out.push(v.clone());
                }
            }
            for v in y {
                if !contains(x, v)? {
                    out.push(v.clone());
                }
            }
        }
        _ => unreachable!(),
    }
    Ok(Value::set(out))
}

fn shift_op(op: BinaryOp, a: &Value, b: &Value, opts: OpSettings) -> EvalResult {
    let ia = to_integer(a, opts.ctx)?;
    let amount = to_integer(b, opts.ctx)?;
    let shift = amount.to_i64().ok_or_else(|| {
        EvalError::new(crate::errors::ErrorKind::Arithmetic, "shift amount too large")
    })?;
    if shift < 0 {
        return Err(EvalError::new(
            crate::errors::ErrorKind::Arithmetic,
            "negative shift amount",
        ));
    }
    let shift = shift.unsigned_abs() as usize;
    Ok(Value::Integer(match op {
        BinaryOp::ShiftLeft => ia << shift,
        BinaryOp::ShiftRight => ia >> shift,
        _ => unreachable!(),
    }))
}

/// Unary operators. Factorial requires a whole non-negative operand.
pub fn unary_op(op: UnaryOp, v: &Value, opts: OpSettings) -> EvalResult {
    match op {
        UnaryOp::Not => Ok(Value::Boolean(!to_boolean(v))),
        UnaryOp::BitNot => match v {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            _ => Ok(Value::Integer(!to_integer(v, opts.ctx)?)),
        },
        UnaryOp::Plus => match v {
            Value::Null => Err(crate::errors::null_value("unary `+`")),
            Value::Boolean(b) => Ok(Value::integer(u32::from(*b))),
            other if other.numeric_priority().is_some() => Ok(other.clone()),
            other => Err(invalid_operand("+", other.type_name())),
        },
        UnaryOp::Negate => negate(v),
        UnaryOp::Factorial => {
            let n = to_integer(v, opts.ctx)?;
            Ok(Value::Integer(factorial(&n)?))
        }
    }
}

fn negate(v: &Value) -> EvalResult {
    match v {
        Value::Null => Err(crate::errors::null_value("negation")),
        Value::Boolean(b) => Ok(Value::integer(-i32::from(*b))),
        Value::Integer(n) => Ok(Value::Integer(-n)),
        Value::Decimal(d) => Ok(Value::Decimal(-d)),
        Value::Fraction(r) => Ok(Value::Fraction(-r)),
        Value::ContinuedFraction(cf) => {
            Ok(demote(Value::Fraction(-cf.to_fraction())))
        }
        Value::Complex(z) => Ok(Value::Complex(z.neg())),
        Value::Quaternion(q) => Ok(Value::Quaternion(tally_num::Quaternion::new(
            q.a.neg(),
            q.b.neg(),
            q.c.neg(),
            q.d.neg(),
        ))),
        other => Err(invalid_operand("-", other.type_name())),
    }
}
