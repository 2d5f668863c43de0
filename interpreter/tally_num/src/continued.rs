//! Simple continued fractions: `[a0; a1, a2, ...]`.
//!
//! Terms are arbitrary-precision integers. Arithmetic promotes through
//! the exact fraction form; only identity, comparison and rendering keep
//! the term sequence.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use std::fmt;

/// A simple continued fraction as its ordered term sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContinuedFraction {
    terms: Vec<BigInt>,
}

impl ContinuedFraction {
    /// Build from terms; an empty sequence denotes zero.
    pub fn new(terms: Vec<BigInt>) -> Self {
        ContinuedFraction { terms }
    }

    pub fn terms(&self) -> &[BigInt] {
        &self.terms
    }

    /// Expand an exact fraction via the Euclidean algorithm.
    ///
    /// The canonical form never ends in a term of 1 (except the sole
    /// term of the value 1 itself).
    pub fn from_fraction(value: &BigRational) -> Self {
        let mut terms = Vec::new();
        let mut numer = value.numer().clone();
        let mut denom = value.denom().clone();
        while !denom.is_zero() {
            let (q, r) = num_integer::Integer::div_mod_floor(&numer, &denom);
            terms.push(q);
            numer = denom;
            denom = r;
        }
        // Normalize a trailing 1: [.., a, 1] == [.., a+1]
        if terms.len() > 1 && terms.last().is_some_and(BigInt::is_one) {
            terms.pop();
            if let Some(last) = terms.last_mut() {
                *last += 1;
            }
        }
        ContinuedFraction { terms }
    }

    /// Collapse back to the exact fraction.
    pub fn to_fraction(&self) -> BigRational {
        let mut acc: Option<BigRational> = None;
        for term in self.terms.iter().rev() {
            let t = BigRational::from_integer(term.clone());
            acc = Some(match acc {
                None => t,
                Some(prev) => {
                    if prev.is_zero() {
                        t
                    } else {
                        t + prev.recip()
                    }
                }
            });
        }
        acc.unwrap_or_else(BigRational::zero)
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty() || self.to_fraction().is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.terms.first().is_some_and(Signed::is_negative)
    }
}

impl fmt::Display for ContinuedFraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, term) in self.terms.iter().enumerate() {
            match i {
                0 => write!(f, "{term}")?,
                1 => write!(f, "; {term}")?,
                _ => write!(f, ", {term}")?,
            }
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frac(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn expansion_of_golden_ratio_convergent() {
        // 13/8 = [1; 1, 1, 1, 1, 2]
        let cf = ContinuedFraction::from_fraction(&frac(13, 8));
        let expected: Vec<BigInt> = [1, 1, 1, 1, 1, 2].iter().map(|&t| BigInt::from(t)).collect();
        assert_eq!(cf.terms(), expected.as_slice());
    }

    #[test]
    fn round_trip_preserves_value() {
        for (n, d) in [(355, 113), (-7, 3), (22, 7), (1, 1)] {
            let v = frac(n, d);
            let cf = ContinuedFraction::from_fraction(&v);
            assert_eq!(cf.to_fraction(), v, "terms {cf}");
        }
    }

    #[test]
    fn display_uses_semicolon_then_commas() {
        let cf = ContinuedFraction::from_fraction(&frac(22, 7));
        assert_eq!(cf.to_string(), "[3; 7]");
    }
}
