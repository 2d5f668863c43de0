//! Decimal math context and result canonicalization.
//!
//! Every decimal operation runs under a [`MathContext`]: a significant
//! digit count plus a rounding mode. Precision `0` means unlimited
//! (exact where possible; division falls back to the divide precision).

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::Zero;
use std::num::NonZeroU64;

pub use bigdecimal::RoundingMode;

/// Precision used for division when the active precision is unlimited,
/// matching IEEE 754 decimal128.
pub const DIVIDE_PRECISION: u64 = 34;

/// Significant-digit precision plus rounding mode.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MathContext {
    /// Number of significant digits; `0` for unlimited.
    pub precision: u64,
    pub rounding: RoundingMode,
}

impl MathContext {
    /// Default context: decimal128 digits, half-up rounding.
    pub const DEFAULT: MathContext = MathContext {
        precision: DIVIDE_PRECISION,
        rounding: RoundingMode::HalfUp,
    };

    /// Create a context with the given precision and half-up rounding.
    pub fn with_precision(precision: u64) -> Self {
        MathContext {
            precision,
            rounding: RoundingMode::HalfUp,
        }
    }

    /// Whether this context is unlimited precision.
    pub fn is_unlimited(self) -> bool {
        self.precision == 0
    }

    /// Effective precision for operations that must terminate (division,
    /// series evaluation).
    pub fn divide_precision(self) -> u64 {
        if self.precision == 0 {
            DIVIDE_PRECISION
        } else {
            self.precision
        }
    }

    /// Round a value to this context's precision. Unlimited contexts
    /// only normalize.
    pub fn round(self, value: &BigDecimal) -> BigDecimal {
        match NonZeroU64::new(self.precision) {
            Some(digits) => value.with_precision_round(digits, self.rounding).normalized(),
            None => value.normalized(),
        }
    }

    /// Divide under this context. The caller has already checked for a
    /// zero divisor.
    pub fn div(self, lhs: &BigDecimal, rhs: &BigDecimal) -> BigDecimal {
        let digits = NonZeroU64::new(self.divide_precision())
            .unwrap_or(NonZeroU64::MIN);
        (lhs / rhs)
            .with_precision_round(digits, self.rounding)
            .normalized()
    }
}

impl Default for MathContext {
    fn default() -> Self {
        MathContext::DEFAULT
    }
}

/// A canonicalized decimal result: either a whole number or a decimal
/// with a genuine fractional part. No magnitude is representable as both.
#[derive(Clone, Debug, PartialEq)]
pub enum Canonical {
    Int(BigInt),
    Dec(BigDecimal),
}

/// Canonicalize a decimal result: strip trailing zero digits and demote
/// to an integer when there is no fractional remainder.
///
/// Idempotent: `fixup` of an already-canonical value returns it unchanged.
pub fn fixup(value: &BigDecimal) -> Canonical {
    let normalized = value.normalized();
    if normalized.is_zero() {
        return Canonical::Int(BigInt::from(0));
    }
    if normalized.fractional_digit_count() <= 0 {
        let (digits, _) = normalized.with_scale(0).into_bigint_and_exponent();
        Canonical::Int(digits)
    } else {
        Canonical::Dec(normalized)
    }
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
    fn fixup_strips_trailing_zeros() {
        assert_eq!(fixup(&dec("2.5000")), Canonical::Dec(dec("2.5")));
    }

    #[test]
    fn fixup_demotes_whole_decimals() {
        assert_eq!(fixup(&dec("42.000")), Canonical::Int(BigInt::from(42)));
        assert_eq!(fixup(&dec("1e3")), Canonical::Int(BigInt::from(1000)));
        assert_eq!(fixup(&dec("0.0")), Canonical::Int(BigInt::from(0)));
    }

    #[test]
    fn fixup_is_idempotent() {
        let first = fixup(&dec("3.1400"));
        let Canonical::Dec(d) = &first else {
            panic!("expected decimal");
        };
        assert_eq!(fixup(d), first);
    }

    #[test]
    fn division_rounds_to_context() {
        let ctx = MathContext::with_precision(5);
        let q = ctx.div(&dec("1"), &dec("3"));
        assert_eq!(q, dec("0.33333"));
    }

    #[test]
    fn unlimited_division_terminates() {
        let ctx = MathContext::with_precision(0);
        let q = ctx.div(&dec("1"), &dec("3"));
        assert_eq!(q.digits(), DIVIDE_PRECISION);
    }
}
