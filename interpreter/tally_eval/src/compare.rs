//! The single comparison primitive behind every relational operator,
//! sort, set membership, and `case` matching.

use std::cmp::Ordering;

use tally_num::MathContext;

use crate::convert::{to_decimal, to_fraction, to_quaternion};
use crate::errors::{null_value, ErrorKind, EvalError};
use crate::render::{render, RenderConfig};
use crate::value::Value;

/// Flags controlling one comparison.
#[derive(Copy, Clone, Debug, Default)]
pub struct CompareFlags {
    /// Identical runtime kinds required (whole decimals count as
    /// integers first).
    pub strict: bool,
    /// `Null` sorts before everything instead of being an error.
    pub allow_nulls: bool,
    pub ignore_case: bool,
    /// Natural/alphanumeric string ordering (digit runs compare
    /// numerically).
    pub natural_order: bool,
    /// Only equality is being asked; lets complex/quaternion compare
    /// structurally even though they have no ordering.
    pub equality: bool,
}

impl CompareFlags {
    pub fn equality() -> Self {
        CompareFlags {
            equality: true,
            ..CompareFlags::default()
        }
    }

    pub fn strict_equality() -> Self {
        CompareFlags {
            strict: true,
            equality: true,
            ..CompareFlags::default()
        }
    }
}

/// Compare two values. For complex/quaternion operands with
/// `equality` set, any non-equal result is reported as `Less`; only
/// `== Equal` is meaningful there.
pub fn compare(
    a: &Value,
    b: &Value,
    flags: CompareFlags,
    ctx: MathContext,
) -> Result<Ordering, EvalError> {
    // Rule 1: nulls.
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ok(Ordering::Equal),
        (true, false) if flags.allow_nulls => return Ok(Ordering::Less),
        (false, true) if flags.allow_nulls => return Ok(Ordering::Greater),
        (true, _) | (_, true) => return Err(null_value("comparison")),
        _ => {}
    }

    // Rule 2: strict kind check, after collapsing whole decimals.
    if flags.strict {
        let a_kind = strict_kind(a);
        let b_kind = strict_kind(b);
        if a_kind != b_kind {
            return Ok(if a_kind < b_kind {
                Ordering::Less
            } else {
                Ordering::Greater
            });
        }
    }

    // Rule 3: strings compare lexically.
    if matches!(a, Value::Str(_)) || matches!(b, Value::Str(_)) {
        let config = RenderConfig::plain();
        let sa = match a {
            Value::Str(s) => s.clone(),
            other => render(other, &config),
        };
        let sb = match b {
            Value::Str(s) => s.clone(),
            other => render(other, &config),
        };
        return Ok(compare_text(&sa, &sb, flags));
    }

    match (a, b) {
        // Rule 5: arrays by length, then element-wise.
        (Value::Array(x), Value::Array(y)) => {
            let x = x.borrow();
            let y = y.borrow();
            if x.len() != y.len() {
                return Ok(x.len().cmp(&y.len()));
            }
            for (ea, eb) in x.iter().zip(y.iter()) {
                let ord = compare(ea, eb, flags.with_nulls(), ctx)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            Ok(Ordering::Equal)
        }
        // Rule 6: objects by key sets, then values per matching key.
        (Value::Object(x), Value::Object(y)) => {
            let x = x.borrow();
            let y = y.borrow();
            let xk: Vec<Value> = x.keys().map(|k| Value::string(k.clone())).collect();
            let yk: Vec<Value> = y.keys().map(|k| Value::string(k.clone())).collect();
            let ord = compare_sets(&xk, &yk, flags, ctx)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
            for (key, va) in x.iter() {
                let vb = y
                    .get(key, flags.ignore_case)
                    .ok_or_else(|| EvalError::new(ErrorKind::Internal, "key set mismatch"))?;
                let ord = compare(va, vb, flags.with_nulls(), ctx)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            Ok(Ordering::Equal)
        }
        // Rule 7: sets by size, then by element (sorted unless strict).
        (Value::Set(x), Value::Set(y)) => {
            let x = x.borrow();
            let y = y.borrow();
            compare_sets(&x, &y, flags, ctx)
        }
        // Rule 4: numeric comparison at the higher-priority kind.
        _ => compare_numeric(a, b, flags, ctx),
    }
}

impl CompareFlags {
    /// Element comparisons inside collections tolerate nulls.
    fn with_nulls(self) -> Self {
        CompareFlags {
            allow_nulls: true,
            ..self
        }
    }
}

fn strict_kind(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Boolean(_) => 1,
        Value::Integer(_) => 2,
        // A whole-valued decimal counts as its integer equivalent.
        Value::Decimal(d) => match tally_num::fixup(d) {
            tally_num::Canonical::Int(_) => 2,
            tally_num::Canonical::Dec(_) => 3,
        },
        Value::Fraction(_) => 4,
        Value::ContinuedFraction(_) => 5,
        Value::Complex(_) => 6,
        Value::Quaternion(_) => 7,
        Value::Str(_) => 8,
        Value::Array(_) => 9,
        Value::Object(_) => 10,
        Value::Set(_) => 11,
        Value::Function(_) => 12,
    }
}

fn compare_numeric(
    a: &Value,
    b: &Value,
    flags: CompareFlags,
    ctx: MathContext,
) -> Result<Ordering, EvalError> {
    let pa = a.numeric_priority();
    let pb = b.numeric_priority();
    let (Some(pa), Some(pb)) = (pa, pb) else {
        // Functions and mixed collection/scalar pairs: only equality
        // is answerable.
        if flags.equality {
            return Ok(structural_fallback(a, b));
        }
        return Err(EvalError::new(
            ErrorKind::Conversion,
            format!("cannot order {} and {}", a.type_name(), b.type_name()),
        ));
    };
    let priority = pa.max(pb);

    // Complex and quaternion have no ordering; equality is structural.
    if priority >= 6 {
        if !flags.equality {
            return Err(EvalError::new(
                ErrorKind::Conversion,
                format!("cannot order {} and {}", a.type_name(), b.type_name()),
            ));
        }
        let qa = to_quaternion(a, false, ctx)?;
        let qb = to_quaternion(b, false, ctx)?;
        let diff = qa.sub(&qb, ctx);
        let equal = diff.a.is_zero() && diff.b.is_zero() && diff.c.is_zero() && diff.d.is_zero();
        return Ok(if equal { Ordering::Equal } else { Ordering::Less });
    }

    // Fractions and continued fractions compare exactly.
    if priority >= 4 {
        let fa = to_fraction(a)?;
        let fb = to_fraction(b)?;
        return Ok(fa.cmp(&fb));
    }

    let da = to_decimal(a, ctx)?;
    let db = to_decimal(b, ctx)?;
    Ok(da.cmp(&db))
}

/// Equality for kinds with no numeric interpretation: functions by
/// declaration identity, otherwise unequal.
fn structural_fallback(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Function(x), Value::Function(y)) => {
            if std::rc::Rc::ptr_eq(x, y) {
                Ordering::Equal
            } else {
                Ordering::Less
            }
        }
        _ => Ordering::Less,
    }
}

fn compare_sets(
    x: &[Value],
    y: &[Value],
    flags: CompareFlags,
    ctx: MathContext,
) -> Result<Ordering, EvalError> {
    if x.len() != y.len() {
        return Ok(x.len().cmp(&y.len()));
    }
    if flags.strict {
        for (ea, eb) in x.iter().zip(y.iter()) {
            let ord = compare(ea, eb, flags.with_nulls(), ctx)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        return Ok(Ordering::Equal);
    }
    // Order-insensitive: sort both sides independently first.
    let sorted = |side: &[Value]| -> Result<Vec<Value>, EvalError> {
        let mut v: Vec<Value> = side.to_vec();
        let mut failed = None;
        v.sort_by(|a, b| {
            compare(a, b, flags.with_nulls(), ctx).unwrap_or_else(|e| {
                failed.get_or_insert(e);
                Ordering::Equal
            })
        });
        match failed {
            Some(e) => Err(e),
            None => Ok(v),
        }
    };
    let xs = sorted(x)?;
    let ys = sorted(y)?;
    for (ea, eb) in xs.iter().zip(ys.iter()) {
        let ord = compare(ea, eb, flags.with_nulls(), ctx)?;
        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }
    Ok(Ordering::Equal)
}

fn compare_text(a: &str, b: &str, flags: CompareFlags) -> Ordering {
    if flags.natural_order {
        return natural_compare(a, b, flags.ignore_case);
    }
    if flags.ignore_case {
        let la = a.to_lowercase();
        let lb = b.to_lowercase();
        la.cmp(&lb)
    } else {
        a.cmp(b)
    }
}

/// Alphanumeric ordering: digit runs compare by numeric value, other
/// runs lexically.
fn natural_compare(a: &str, b: &str, ignore_case: bool) -> Ordering {
    let mut ca = a.chars().peekable();
    let mut cb = b.chars().peekable();
    loop {
        match (ca.peek().copied(), cb.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                if x.is_ascii_digit() && y.is_ascii_digit() {
                    let na = take_digits(&mut ca);
                    let nb = take_digits(&mut cb);
                    let ord = compare_digit_runs(&na, &nb);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                } else {
                    let (x, y) = if ignore_case {
                        (
                            x.to_lowercase().next().unwrap_or(x),
                            y.to_lowercase().next().unwrap_or(y),
                        )
                    } else {
                        (x, y)
                    };
                    let ord = x.cmp(&y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                    ca.next();
                    cb.next();
                }
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            digits.push(c);
            chars.next();
        } else {
            break;
        }
    }
    digits
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    if a.len() != b.len() {
        return a.len().cmp(&b.len());
    }
    a.cmp(b)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "panicking on bad test input is fine")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cmp(a: &Value, b: &Value, flags: CompareFlags) -> Ordering {
        compare(a, b, flags, MathContext::DEFAULT).unwrap()
    }

    #[test]
    fn antisymmetry_over_mixed_numerics() {
        use std::str::FromStr;
        let values = [
            Value::integer(2),
            Value::Decimal(bigdecimal::BigDecimal::from_str("2.5").unwrap()),
            Value::Fraction(num_rational::BigRational::new(5.into(), 2.into())),
            Value::Boolean(true),
        ];
        for a in &values {
            for b in &values {
                let ab = cmp(a, b, CompareFlags::default());
                let ba = cmp(b, a, CompareFlags::default());
                assert_eq!(ab, ba.reverse());
            }
            assert_eq!(cmp(a, a, CompareFlags::default()), Ordering::Equal);
        }
    }

    #[test]
    fn whole_decimal_equals_integer_strictly() {
        use std::str::FromStr;
        let d = Value::Decimal(bigdecimal::BigDecimal::from_str("3.000").unwrap());
        let n = Value::integer(3);
        assert_eq!(cmp(&d, &n, CompareFlags::strict_equality()), Ordering::Equal);
        let d = Value::Decimal(bigdecimal::BigDecimal::from_str("3.5").unwrap());
        assert_ne!(cmp(&d, &n, CompareFlags::strict_equality()), Ordering::Equal);
    }

    #[test]
    fn null_needs_allow_flag() {
        assert!(compare(
            &Value::Null,
            &Value::integer(1),
            CompareFlags::default(),
            MathContext::DEFAULT
        )
        .is_err());
        let flags = CompareFlags {
            allow_nulls: true,
            ..CompareFlags::default()
        };
        assert_eq!(cmp(&Value::Null, &Value::integer(1), flags), Ordering::Less);
    }

    #[test]
    fn string_comparison_renders_the_other_side() {
        let s = Value::string("10");
        let n = Value::integer(10);
        assert_eq!(cmp(&s, &n, CompareFlags::equality()), Ordering::Equal);
    }

    #[test]
    fn natural_order_compares_digit_runs_numerically() {
        let a = Value::string("file9");
        let b = Value::string("file10");
        let flags = CompareFlags {
            natural_order: true,
            ..CompareFlags::default()
        };
        assert_eq!(cmp(&a, &b, flags), Ordering::Less);
        assert_eq!(cmp(&a, &b, CompareFlags::default()), Ordering::Greater);
    }

    #[test]
    fn sets_compare_order_insensitively_unless_strict() {
        let x = Value::set(vec![Value::integer(1), Value::integer(2)]);
        let y = Value::set(vec![Value::integer(2), Value::integer(1)]);
        assert_eq!(cmp(&x, &y, CompareFlags::equality()), Ordering::Equal);
        assert_ne!(cmp(&x, &y, CompareFlags::strict_equality()), Ordering::Equal);
    }

    #[test]
    fn arrays_compare_by_length_first() {
        let x = Value::array(vec![Value::integer(9)]);
        let y = Value::array(vec![Value::integer(1), Value::integer(1)]);
        assert_eq!(cmp(&x, &y, CompareFlags::default()), Ordering::Less);
    }
}
