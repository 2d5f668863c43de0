//! Numeric operation failures.

use std::fmt;

/// Failure raised by a numeric routine. The evaluator maps these onto
/// its arithmetic error category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NumError {
    DivideByZero,
    /// Factorial of a negative or fractional value.
    InvalidFactorial(String),
    ZeroToNegativePower,
    /// Integer conversion requested for a value with a fractional remainder.
    NotExact(String),
    /// Operation defined by the language but not supported for this
    /// operand combination (e.g. quaternion to a fractional power).
    NotImplemented(&'static str),
}

impl fmt::Display for NumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumError::DivideByZero => write!(f, "divide by zero"),
            NumError::InvalidFactorial(v) => {
                write!(f, "factorial is not defined for {v}")
            }
            NumError::ZeroToNegativePower => {
                write!(f, "zero cannot be raised to a negative power")
            }
            NumError::NotExact(v) => {
                write!(f, "{v} has a fractional part and cannot be an integer")
            }
            NumError::NotImplemented(what) => write!(f, "not implemented: {what}"),
        }
    }
}

impl std::error::Error for NumError {}
