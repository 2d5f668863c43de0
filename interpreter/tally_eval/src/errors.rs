//! Evaluation errors and control-flow signals.
//!
//! `leave` and `next` are not errors; they ride the same `Result` rail
//! as errors so that every intervening frame sees them in its return
//! type and can restore scopes and mode stacks while they propagate.
//! A signal that escapes every construct that could catch it is an
//! internal fault, surfaced by [`EvalError::into_diagnostic`].

use std::fmt;

use tally_diagnostic::{Category, Diagnostic};
use tally_ir::Span;
use tally_num::NumError;

use crate::value::Value;

/// Result of evaluating one node.
pub type EvalResult = Result<Value, EvalError>;

/// Non-local exit signals propagated through evaluation frames.
#[derive(Clone, Debug)]
pub enum ControlSignal {
    /// `leave [label] [value]`: unwinds to the matching loop, or to
    /// the enclosing function when unlabeled.
    Leave {
        label: Option<String>,
        value: Option<Value>,
    },
    /// `next`: ends the current iteration or falls through a `case`
    /// block.
    Next,
}

/// Error category, mapped onto the diagnostic taxonomy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Conversion,
    Arithmetic,
    NullValue,
    UnknownOperator,
    UndefinedName,
    Assertion,
    VersionMismatch,
    Io,
    Internal,
}

/// Evaluation error.
#[derive(Clone, Debug)]
pub struct EvalError {
    pub kind: ErrorKind,
    pub message: String,
    /// If this is a control-flow signal, holds the signal. Signal
    /// errors use `ErrorKind::Internal` so an escaped one reports as
    /// an internal fault.
    pub control_flow: Option<ControlSignal>,
    pub span: Option<Span>,
}

impl ErrorKind {
    /// Inverse of the `into_diagnostic` mapping, for errors that wrap
    /// a nested diagnostic without losing its category.
    pub fn from_category(category: Category) -> ErrorKind {
        match category {
            Category::Syntax => ErrorKind::Syntax,
            Category::Conversion => ErrorKind::Conversion,
            Category::Arithmetic => ErrorKind::Arithmetic,
            Category::NullValue => ErrorKind::NullValue,
            Category::UnknownOperator => ErrorKind::UnknownOperator,
            Category::UndefinedName => ErrorKind::UndefinedName,
            Category::Assertion => ErrorKind::Assertion,
            Category::VersionMismatch => ErrorKind::VersionMismatch,
            Category::Io => ErrorKind::Io,
            Category::Internal => ErrorKind::Internal,
        }
    }
}

impl EvalError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        EvalError {
            kind,
            message: message.into(),
            control_flow: None,
            span: None,
        }
    }

    /// Attach a source span if none is present yet. Inner frames win.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn is_control_flow(&self) -> bool {
        self.control_flow.is_some()
    }

    /// Convert for reporting. A control signal reaching this point
    /// escaped every loop and function, which is a propagation bug.
    pub fn into_diagnostic(self) -> Diagnostic {
        let category = match &self.control_flow {
            Some(signal) => {
                let what = match signal {
                    ControlSignal::Leave { .. } => "`leave`",
                    ControlSignal::Next => "`next`",
                };
                let d = Diagnostic::new(
                    Category::Internal,
                    format!("{what} signal escaped all enclosing constructs"),
                );
                return match self.span {
                    Some(span) => d.with_span(span),
                    None => d,
                };
            }
            None => match self.kind {
                ErrorKind::Syntax => Category::Syntax,
                ErrorKind::Conversion => Category::Conversion,
                ErrorKind::Arithmetic => Category::Arithmetic,
                ErrorKind::NullValue => Category::NullValue,
                ErrorKind::UnknownOperator => Category::UnknownOperator,
                ErrorKind::UndefinedName => Category::UndefinedName,
                ErrorKind::Assertion => Category::Assertion,
                ErrorKind::VersionMismatch => Category::VersionMismatch,
                ErrorKind::Io => Category::Io,
                ErrorKind::Internal => Category::Internal,
            },
        };
        let d = Diagnostic::new(category, self.message);
        match self.span {
            Some(span) => d.with_span(span),
            None => d,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EvalError {}

impl From<NumError> for EvalError {
    fn from(err: NumError) -> Self {
        EvalError::new(ErrorKind::Arithmetic, err.to_string())
    }
}

// Factory functions, one per error condition the evaluator raises in
// more than one place.

#[cold]
pub fn conversion_error(from: &str, to: &str) -> EvalError {
    EvalError::new(
        ErrorKind::Conversion,
        format!("cannot convert {from} to {to}"),
    )
}

#[cold]
pub fn null_value(context: &str) -> EvalError {
    EvalError::new(ErrorKind::NullValue, format!("null value in {context}"))
}

#[cold]
pub fn undefined_name(name: &str) -> EvalError {
    EvalError::new(ErrorKind::UndefinedName, format!("\"{name}\" is not defined"))
}

#[cold]
pub fn not_callable(type_name: &str) -> EvalError {
    EvalError::new(
        ErrorKind::Conversion,
        format!("{type_name} value is not callable"),
    )
}

#[cold]
pub fn invalid_operand(op: &str, type_name: &str) -> EvalError {
    EvalError::new(
        ErrorKind::Conversion,
        format!("operator `{op}` is not defined for {type_name}"),
    )
}

#[cold]
pub fn divide_by_zero() -> EvalError {
    EvalError::new(ErrorKind::Arithmetic, "divide by zero")
}

#[cold]
pub fn assertion_failed(message: &str) -> EvalError {
    EvalError::new(ErrorKind::Assertion, message.to_owned())
}

#[cold]
pub fn io_error(err: &std::io::Error, path: &str) -> EvalError {
    EvalError::new(ErrorKind::Io, format!("{path}: {err}"))
}

/// `leave` signal.
pub fn leave_signal(label: Option<String>, value: Option<Value>) -> EvalError {
    EvalError {
        kind: ErrorKind::Internal,
        message: "leave".to_owned(),
        control_flow: Some(ControlSignal::Leave { label, value }),
        span: None,
    }
}

/// `next` signal.
pub fn next_signal() -> EvalError {
    EvalError {
        kind: ErrorKind::Internal,
        message: "next".to_owned(),
        control_flow: Some(ControlSignal::Next),
        span: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn escaped_signal_reports_internal() {
        let err = leave_signal(Some("outer".into()), None);
        let diagnostic = err.into_diagnostic();
        assert_eq!(diagnostic.category, Category::Internal);
        assert!(diagnostic.message.contains("escaped"));
    }

    #[test]
    fn kinds_map_to_categories() {
        let err = conversion_error("object", "integer");
        assert_eq!(err.into_diagnostic().category, Category::Conversion);
        let err = EvalError::from(NumError::DivideByZero);
        assert_eq!(err.kind, ErrorKind::Arithmetic);
    }

    #[test]
    fn inner_span_wins() {
        let err = divide_by_zero()
            .with_span(Span::new(3, 5))
            .with_span(Span::new(0, 10));
        assert_eq!(err.span, Some(Span::new(3, 5)));
    }
}
