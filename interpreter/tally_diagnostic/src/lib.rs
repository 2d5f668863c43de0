//! Tally Diagnostic - error taxonomy and reporting.
//!
//! Every user-facing failure is a [`Diagnostic`]: a [`Category`], a
//! message, and an optional source span. Rendering produces the single
//! line of context-prefixed text the display sink expects, with an
//! optional caret indicator under the offending column.
//!
//! `leave`/`next` are control-flow signals, not diagnostics; they never
//! appear here.

mod line_index;

pub use line_index::LineIndex;

use tally_ir::Span;

/// Error category. Batch mode encodes the category in the exit code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// Malformed input from the parser front end. Fatal to the current
    /// unit of input.
    Syntax,
    /// A value could not be interpreted as the requested target kind.
    Conversion,
    /// Numeric-operation failure (divide by zero, non-exact truncation).
    Arithmetic,
    /// An operation that forbids `null` received one.
    NullValue,
    /// Should be unreachable given grammar constraints.
    UnknownOperator,
    /// Reference to an unbound required name.
    UndefinedName,
    /// User `:assert` failure.
    Assertion,
    /// `:require` compatibility check failure.
    VersionMismatch,
    /// File or process helper failure.
    Io,
    /// Internal inconsistency, e.g. a control signal escaping top level.
    Internal,
}

impl Category {
    /// Process exit code for batch mode.
    pub fn exit_code(self) -> i32 {
        match self {
            Category::Syntax => 2,
            Category::Conversion => 3,
            Category::Arithmetic => 4,
            Category::NullValue => 5,
            Category::UnknownOperator => 6,
            Category::UndefinedName => 7,
            Category::Assertion => 8,
            Category::VersionMismatch => 9,
            Category::Io => 10,
            Category::Internal => 70,
        }
    }

    /// Context prefix used when rendering.
    pub fn prefix(self) -> &'static str {
        match self {
            Category::Syntax => "syntax error",
            Category::Conversion => "conversion error",
            Category::Arithmetic => "arithmetic error",
            Category::NullValue => "null value error",
            Category::UnknownOperator => "unknown operator",
            Category::UndefinedName => "undefined name",
            Category::Assertion => "assertion failed",
            Category::VersionMismatch => "version mismatch",
            Category::Io => "i/o error",
            Category::Internal => "internal error",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A user-facing error: category, message, optional source location.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{category}: {message}")]
pub struct Diagnostic {
    pub category: Category,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    /// Create a diagnostic with no source location.
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Diagnostic {
            category,
            message: message.into(),
            span: None,
        }
    }

    /// Attach a source span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Render as a single line, annotated with the source line number
    /// when a span and line index are available.
    pub fn render(&self, lines: Option<&LineIndex>) -> String {
        match (self.span, lines) {
            (Some(span), Some(index)) => {
                let pos = index.position(span.start);
                format!(
                    "{} on line {}: {}",
                    self.category,
                    pos.line + 1,
                    self.message
                )
            }
            _ => format!("{}: {}", self.category, self.message),
        }
    }

    /// Render with a caret indicator reproduced from the reported offset.
    ///
    /// Produces the source line followed by a `^` under the column.
    /// Used by interactive front ends for syntax errors.
    pub fn render_with_caret(&self, source: &str, index: &LineIndex) -> String {
        let Some(span) = self.span else {
            return self.render(None);
        };
        let pos = index.position(span.start);
        let line_text = index.line_text(source, pos.line).unwrap_or_default();
        let mut out = self.render(Some(index));
        out.push('\n');
        out.push_str(line_text);
        out.push('\n');
        for _ in 0..pos.column {
            out.push(' ');
        }
        out.push('^');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn render_without_span() {
        let d = Diagnostic::new(Category::Arithmetic, "divide by zero");
        assert_eq!(d.render(None), "arithmetic error: divide by zero");
    }

    #[test]
    fn render_with_line_number() {
        let source = "a = 1\nb = a / 0\n";
        let index = LineIndex::new(source);
        let d = Diagnostic::new(Category::Arithmetic, "divide by zero")
            .with_span(Span::new(10, 15));
        assert_eq!(
            d.render(Some(&index)),
            "arithmetic error on line 2: divide by zero"
        );
    }

    #[test]
    fn caret_points_at_column() {
        let source = "x = @bad\n";
        let index = LineIndex::new(source);
        let d = Diagnostic::new(Category::Syntax, "unexpected character")
            .with_span(Span::new(4, 5));
        let rendered = d.render_with_caret(source, &index);
        let mut it = rendered.lines();
        assert_eq!(it.next(), Some("syntax error on line 1: unexpected character"));
        assert_eq!(it.next(), Some("x = @bad"));
        assert_eq!(it.next(), Some("    ^"));
    }

    #[test]
    fn categories_have_distinct_exit_codes() {
        let all = [
            Category::Syntax,
            Category::Conversion,
            Category::Arithmetic,
            Category::NullValue,
            Category::UnknownOperator,
            Category::UndefinedName,
            Category::Assertion,
            Category::VersionMismatch,
            Category::Io,
            Category::Internal,
        ];
        let mut codes: Vec<i32> = all.iter().map(|c| c.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
