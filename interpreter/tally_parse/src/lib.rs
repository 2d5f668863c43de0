//! Lexing and parsing for Tally.
//!
//! [`parse`] turns one unit of source text into a [`ParsedUnit`]: a
//! node arena plus the root statement block the evaluator walks.

mod lexer;
mod parser;

pub use lexer::{lex, Token, TokenKind};
pub use parser::{parse, ParsedUnit};
