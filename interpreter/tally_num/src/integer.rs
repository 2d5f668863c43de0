//! Arbitrary-precision integer helpers.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::NumError;

/// Factorial of a non-negative integer.
pub fn factorial(n: &BigInt) -> Result<BigInt, NumError> {
    if n.is_negative() {
        return Err(NumError::InvalidFactorial(n.to_string()));
    }
    let Some(limit) = n.to_u64() else {
        return Err(NumError::InvalidFactorial(n.to_string()));
    };
    let mut acc = BigInt::one();
    for k in 2..=limit {
        acc *= k;
    }
    Ok(acc)
}

/// Product of the inclusive integer range `lo..=hi` with unit step.
///
/// The closed form behind the `Product` iteration purpose: `1..n` is
/// `n!`, and `m..n` is the falling product `n! / (m-1)!` computed
/// directly without the division.
pub fn range_product(lo: &BigInt, hi: &BigInt) -> BigInt {
    if lo > hi {
        return BigInt::one();
    }
    let mut acc = BigInt::one();
    let mut k = lo.clone();
    while &k <= hi {
        acc *= &k;
        k += 1;
    }
    acc
}

/// Integer power with a non-negative exponent, by squaring.
pub fn int_pow(base: &BigInt, exp: u64) -> BigInt {
    if exp == 0 {
        return BigInt::one();
    }
    let mut result = BigInt::one();
    let mut square = base.clone();
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result *= &square;
        }
        e >>= 1;
        if e > 0 {
            square = &square * &square;
        }
    }
    result
}

/// Greatest common divisor; `gcd(0, 0)` is `0`.
pub fn gcd(a: &BigInt, b: &BigInt) -> BigInt {
    a.gcd(b)
}

/// Least common multiple; `lcm(0, n)` is `0`.
pub fn lcm(a: &BigInt, b: &BigInt) -> BigInt {
    if a.is_zero() || b.is_zero() {
        return BigInt::zero();
    }
    a.lcm(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn small_factorials() {
        #[expect(clippy::unwrap_used, reason = "test values are non-negative")]
        {
            assert_eq!(factorial(&BigInt::from(0)).unwrap(), BigInt::from(1));
            assert_eq!(factorial(&BigInt::from(5)).unwrap(), BigInt::from(120));
            assert_eq!(factorial(&BigInt::from(20)).unwrap(), BigInt::from(2_432_902_008_176_640_000_u64));
        }
    }

    #[test]
    fn negative_factorial_fails() {
        assert!(factorial(&BigInt::from(-1)).is_err());
    }

    #[test]
    fn range_product_matches_factorial_tail() {
        // 5*6*7 = 7!/4!
        assert_eq!(
            range_product(&BigInt::from(5), &BigInt::from(7)),
            BigInt::from(210)
        );
        assert_eq!(
            range_product(&BigInt::from(1), &BigInt::from(6)),
            BigInt::from(720)
        );
        assert_eq!(
            range_product(&BigInt::from(3), &BigInt::from(2)),
            BigInt::from(1)
        );
    }

    #[test]
    fn powers_by_squaring() {
        assert_eq!(int_pow(&BigInt::from(2), 10), BigInt::from(1024));
        assert_eq!(int_pow(&BigInt::from(-3), 3), BigInt::from(-27));
        assert_eq!(int_pow(&BigInt::from(7), 0), BigInt::from(1));
    }

    #[test]
    fn gcd_lcm_edges() {
        assert_eq!(gcd(&BigInt::from(12), &BigInt::from(18)), BigInt::from(6));
        assert_eq!(lcm(&BigInt::from(4), &BigInt::from(6)), BigInt::from(12));
        assert_eq!(lcm(&BigInt::from(0), &BigInt::from(5)), BigInt::from(0));
    }
}
