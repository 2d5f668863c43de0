//! Tally Num - the numeric tower for the Tally interpreter.
//!
//! Arbitrary-precision integers (`num-bigint`), context-rounded decimals
//! (`bigdecimal`), exact fractions (`num-rational`), complex numbers and
//! quaternions over either, and simple continued fractions. Decimal
//! results are canonicalized by [`fixup`] so no magnitude is
//! representable as both an integer and a decimal.

mod algorithms;
mod complex;
mod context;
mod continued;
mod error;
mod integer;
mod pi;
mod quaternion;
mod real;
mod trig;

pub use algorithms::{dec_pow, dec_pow_int, dec_sqrt};
pub use complex::Complex;
pub use context::{fixup, Canonical, MathContext, RoundingMode, DIVIDE_PRECISION};
pub use continued::ContinuedFraction;
pub use error::NumError;
pub use integer::{factorial, gcd, int_pow, lcm, range_product};
pub use pi::{compute_e, compute_phi, compute_pi, pi_fraction};
pub use quaternion::Quaternion;
pub use real::{decimal_to_fraction, fraction_to_decimal, real_to_f64, Real};
pub use trig::{cos, sin, tan, TrigMode};

// Re-exports so downstream crates name one numeric stack.
pub use bigdecimal::BigDecimal;
pub use num_bigint::BigInt;
pub use num_rational::BigRational;
