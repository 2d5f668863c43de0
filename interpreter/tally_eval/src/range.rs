//! Numeric dot ranges and their closed-form shortcuts.
//!
//! A dot range never materializes its values. Loops ask for the nth
//! element, `sumof` uses the arithmetic-series formula, `productof`
//! uses factorial identities for unit-step integer ranges, `lengthof`
//! is a count, and membership solves for the step index instead of
//! scanning. All of the math runs on exact rationals so the shortcuts
//! agree with element-by-element traversal.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use tally_num::{factorial, fraction_to_decimal, range_product, MathContext};

use crate::convert::{demote, to_fraction};
use crate::errors::{EvalError, EvalResult};
use crate::value::Value;

/// Which representation range elements take.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Lane {
    Integer,
    Decimal,
    Fraction,
}

#[derive(Clone, Debug)]
pub struct NumericRange {
    start: BigRational,
    stop: BigRational,
    step: BigRational,
    lane: Lane,
}

#[cold]
fn zero_step() -> EvalError {
    EvalError::new(
        crate::errors::ErrorKind::Arithmetic,
        "range step of zero would loop forever",
    )
}

fn is_integer_kind(v: &Value) -> bool {
    matches!(v, Value::Integer(_) | Value::Boolean(_))
}

impl NumericRange {
    /// Build a range from evaluated bounds.
    ///
    /// A lone bound `n` means `1..n` (or `-1..n` downward); `within`
    /// shifts that to `0..n-1`. An explicit missing step defaults to 1
    /// in the direction of the bounds.
    pub fn new(
        start: Option<&Value>,
        stop: &Value,
        step: Option<&Value>,
        within: bool,
        rational: bool,
    ) -> Result<NumericRange, EvalError> {
        let mut lane = if is_integer_kind(stop)
            && start.is_none_or(is_integer_kind)
            && step.is_none_or(is_integer_kind)
        {
            Lane::Integer
        } else if rational
            || matches!(stop, Value::Fraction(_) | Value::ContinuedFraction(_))
            || matches!(start, Some(Value::Fraction(_) | Value::ContinuedFraction(_)))
            || matches!(step, Some(Value::Fraction(_) | Value::ContinuedFraction(_)))
        {
            Lane::Fraction
        } else {
            Lane::Decimal
        };

        let stop_r = to_fraction(stop)?;
        let (start_r, stop_r) = match start {
            Some(v) => (to_fraction(v)?, stop_r),
            None if within => {
                // `within n` counts 0 .. n-1; nothing below zero.
                (BigRational::zero(), stop_r - BigRational::one())
            }
            None => {
                // `in n` counts 1 .. n, downward from -1 when n < 0.
                if stop_r.is_negative() {
                    (-BigRational::one(), stop_r)
                } else {
                    (BigRational::one(), stop_r)
                }
            }
        };

        let step_r = match step {
            Some(v) => {
                let s = to_fraction(v)?;
                if s.is_zero() {
                    return Err(zero_step());
                }
                s
            }
            None => {
                if stop_r < start_r {
                    -BigRational::one()
                } else {
                    BigRational::one()
                }
            }
        };

        // A fractional step demotes an integer range.
        if lane == Lane::Integer && !step_r.is_integer() {
            lane = if rational { Lane::Fraction } else { Lane::Decimal };
        }

        Ok(NumericRange {
            start: start_r,
            stop: stop_r,
            step: step_r,
            lane,
        })
    }

    /// Number of elements the range produces.
    pub fn count(&self) -> BigInt {
        let span = &self.stop - &self.start;
        // Wrong-direction bounds produce nothing.
        if (self.step.is_positive() && span.is_negative())
            || (self.step.is_negative() && span.is_positive())
        {
            return BigInt::zero();
        }
        (span / &self.step).floor().to_integer() + 1
    }

    pub fn is_empty(&self) -> bool {
        self.count().is_zero()
    }

    fn element(&self, index: &BigInt) -> BigRational {
        &self.start + &self.step * BigRational::from_integer(index.clone())
    }

    fn to_value(&self, r: BigRational, ctx: MathContext) -> Value {
        match self.lane {
            Lane::Integer => Value::Integer(r.to_integer()),
            Lane::Fraction => demote(Value::Fraction(r)),
            Lane::Decimal => demote(Value::Decimal(fraction_to_decimal(&r, ctx))),
        }
    }

    /// The nth element (0-based). Callers stay below `count()`.
    pub fn nth(&self, index: &BigInt, ctx: MathContext) -> Value {
        self.to_value(self.element(index), ctx)
    }

    /// `sumof` as an arithmetic series, `count * (first + last) / 2`.
    pub fn sum(&self, ctx: MathContext) -> Value {
        let count = self.count();
        if count.is_zero() {
            return Value::integer(0);
        }
        let last = self.element(&(&count - 1));
        let total = BigRational::from_integer(count) * (&self.start + last)
            / BigRational::from_integer(BigInt::from(2));
        self.to_value(total, ctx)
    }

    /// `productof`: factorial identities for unit-step integer ranges,
    /// exact stepping otherwise.
    pub fn product(&self, ctx: MathContext) -> EvalResult {
        let count = self.count();
        if count.is_zero() {
            return Ok(Value::integer(1));
        }
        if self.lane == Lane::Integer && self.step == BigRational::one() {
            let lo = self.start.to_integer();
            let hi = self.stop.floor().to_integer();
            if lo.is_one() {
                return Ok(Value::Integer(factorial(&hi)?));
            }
            // A range touching zero multiplies to zero.
            if lo.is_zero() || (lo.is_negative() && !hi.is_negative()) {
                return Ok(Value::integer(0));
            }
            if lo.is_positive() {
                return Ok(Value::Integer(range_product(&lo, &hi)));
            }
        }
        let mut acc = BigRational::one();
        let mut index = BigInt::zero();
        while index < count {
            let e = self.element(&index);
            if e.is_zero() {
                return Ok(Value::integer(0));
            }
            acc *= e;
            index += 1;
        }
        Ok(self.to_value(acc, ctx))
    }

    /// Membership without scanning: `v` is in the range when
    /// `(v - start) / step` is a whole number inside the count.
    pub fn contains(&self, value: &Value) -> Result<bool, EvalError> {
        let Ok(v) = to_fraction(value) else {
            // Non-numeric values are never range members.
            return Ok(false);
        };
        let k = (v - &self.start) / &self.step;
        if !k.is_integer() || k.is_negative() {
            return Ok(false);
        }
        Ok(k.to_integer() < self.count())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "panicking on bad test input is fine")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CTX: MathContext = MathContext::DEFAULT;

    fn int_range(start: i64, stop: i64, step: Option<i64>) -> NumericRange {
        NumericRange::new(
            Some(&Value::integer(start)),
            &Value::integer(stop),
            step.map(Value::integer).as_ref(),
            false,
            false,
        )
        .unwrap()
    }

    fn collect(r: &NumericRange) -> Vec<Value> {
        let mut out = Vec::new();
        let count = r.count();
        let mut i = BigInt::zero();
        while i < count {
            out.push(r.nth(&i, CTX));
            i += 1;
        }
        out
    }

    #[test]
    fn single_bound_counts_from_one() {
        let r = NumericRange::new(None, &Value::integer(3), None, false, false).unwrap();
        assert_eq!(collect(&r), vec![Value::integer(1), Value::integer(2), Value::integer(3)]);
    }

    #[test]
    fn within_counts_from_zero() {
        let r = NumericRange::new(None, &Value::integer(3), None, true, false).unwrap();
        assert_eq!(collect(&r), vec![Value::integer(0), Value::integer(1), Value::integer(2)]);
    }

    #[test]
    fn negative_single_bound_counts_down() {
        let r = NumericRange::new(None, &Value::integer(-3), None, false, false).unwrap();
        assert_eq!(
            collect(&r),
            vec![Value::integer(-1), Value::integer(-2), Value::integer(-3)]
        );
    }

    #[test]
    fn zero_single_bound_is_empty() {
        let r = NumericRange::new(None, &Value::integer(0), None, false, false).unwrap();
        assert!(r.is_empty());
    }

    #[test]
    fn wrong_direction_bounds_are_empty() {
        // Default step runs downward when stop < start.
        assert_eq!(int_range(5, 3, None).count(), BigInt::from(3));
        // An explicit upward step against downward bounds is empty.
        assert!(int_range(5, 3, Some(1)).is_empty());
    }

    #[test]
    fn zero_step_is_rejected() {
        let err = NumericRange::new(
            Some(&Value::integer(1)),
            &Value::integer(5),
            Some(&Value::integer(0)),
            false,
            false,
        );
        assert!(err.is_err());
    }

    #[test]
    fn sum_matches_traversal() {
        let r = int_range(3, 101, Some(7));
        let mut by_hand = BigInt::zero();
        for v in collect(&r) {
            let Value::Integer(n) = v else { panic!("integer range") };
            by_hand += n;
        }
        assert!(matches!(r.sum(CTX), Value::Integer(n) if n == by_hand));
    }

    #[test]
    fn product_of_one_to_n_is_factorial() {
        let r = int_range(1, 10, None);
        assert!(matches!(r.product(CTX).unwrap(), Value::Integer(n) if n == 3628800.into()));
    }

    #[test]
    fn product_spanning_zero_is_zero() {
        let r = int_range(-2, 2, None);
        assert!(matches!(r.product(CTX).unwrap(), Value::Integer(n) if n.is_zero()));
    }

    #[test]
    fn partial_product_uses_the_rising_factorial() {
        let r = int_range(5, 8, None);
        assert!(matches!(r.product(CTX).unwrap(), Value::Integer(n) if n == 1680.into()));
    }

    #[test]
    fn membership_solves_the_step_equation() {
        let r = int_range(3, 101, Some(7));
        assert!(r.contains(&Value::integer(3)).unwrap());
        assert!(r.contains(&Value::integer(10)).unwrap());
        assert!(r.contains(&Value::integer(101)).unwrap());
        assert!(!r.contains(&Value::integer(11)).unwrap());
        assert!(!r.contains(&Value::integer(108)).unwrap());
    }

    #[test]
    fn fractional_step_produces_decimals() {
        let r = NumericRange::new(
            Some(&Value::integer(0)),
            &Value::integer(1),
            Some(&Value::Decimal(bigdecimal::BigDecimal::new(25.into(), 2))),
            false,
            false,
        )
        .unwrap();
        assert_eq!(r.count(), BigInt::from(5));
        let values = collect(&r);
        assert!(matches!(&values[1], Value::Decimal(d) if d.to_string() == "0.25"));
        // Whole elements demote to integers.
        assert!(matches!(&values[0], Value::Integer(n) if n.is_zero()));
    }

    #[test]
    fn rational_mode_keeps_fraction_elements() {
        let r = NumericRange::new(
            Some(&Value::integer(0)),
            &Value::integer(1),
            Some(&Value::Fraction(BigRational::new(1.into(), 3.into()))),
            false,
            true,
        )
        .unwrap();
        let values = collect(&r);
        assert_eq!(values.len(), 4);
        assert!(matches!(&values[1], Value::Fraction(f) if *f == BigRational::new(1.into(), 3.into())));
    }
}
