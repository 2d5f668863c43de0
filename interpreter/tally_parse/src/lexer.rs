//! Lexer for Tally using logos.
//!
//! Produces a flat `Vec<Token>` the parser walks with a cursor. Numeric
//! literals are parsed into their arbitrary-precision representations
//! here so the parser never re-reads source text.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use logos::Logos;
use num_bigint::BigInt;
use num_traits::Num;
use tally_ir::Span;

/// Raw token from logos.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")] // Skip horizontal whitespace
enum RawToken {
    #[regex(r"//[^\n]*")]
    #[regex(r"#[^\n]*")]
    LineComment,

    #[token("\n")]
    Newline,

    #[regex(r"\\[ \t]*\n")]
    LineContinuation,

    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("loop")]
    Loop,
    #[token("in")]
    In,
    #[token("within")]
    Within,
    #[token("case")]
    Case,
    #[token("of")]
    Of,
    #[token("default")]
    Default,
    #[token("matches")]
    Matches,
    #[token("define")]
    Define,
    #[token("const")]
    Const,
    #[token("var")]
    Var,
    #[token("enum")]
    Enum,
    #[token("leave")]
    Leave,
    #[token("next")]
    Next,
    #[token("timethis")]
    TimeThis,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("sumof")]
    SumOf,
    #[token("productof")]
    ProductOf,
    #[token("arrayof")]
    ArrayOf,
    #[token("lengthof")]
    LengthOf,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token("..")]
    DotDot,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("?")]
    Question,
    #[token("...")]
    Ellipsis,

    #[token("**=")]
    StarStarEq,
    #[token("**")]
    StarStar,
    #[token("++")]
    PlusPlus,
    #[token("+=")]
    PlusEq,
    #[token("+")]
    Plus,
    #[token("--")]
    MinusMinus,
    #[token("-=")]
    MinusEq,
    #[token("-")]
    Minus,
    #[token("*=")]
    StarEq,
    #[token("*")]
    Star,
    #[token("/=")]
    SlashEq,
    #[token("/")]
    Slash,
    #[token("%=")]
    PercentEq,
    #[token("%")]
    Percent,
    #[token("\\=")]
    BackslashEq,
    #[token("\\")]
    Backslash,
    #[token("===")]
    EqEqEq,
    #[token("==")]
    EqEq,
    #[token("=")]
    Eq,
    #[token("!==")]
    BangEqEq,
    #[token("!=")]
    BangEq,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("<=>")]
    Spaceship,
    #[token("<<=")]
    ShlEq,
    #[token("<<")]
    Shl,
    #[token("<=")]
    LtEq,
    #[token("<")]
    Lt,
    #[token(">>=")]
    ShrEq,
    #[token(">>")]
    Shr,
    #[token(">=")]
    GtEq,
    #[token(">")]
    Gt,
    #[token("&&")]
    AmpAmp,
    #[token("&=")]
    AmpEq,
    #[token("&")]
    Amp,
    #[token("||")]
    PipePipe,
    #[token("|=")]
    PipeEq,
    #[token("|")]
    Pipe,
    #[token("^^")]
    CaretCaret,
    #[token("^=")]
    CaretEq,
    #[token("^")]
    Caret,

    // Hex / binary / octal integers
    #[regex(r"0[xX][0-9a-fA-F][0-9a-fA-F_]*", |lex| {
        BigInt::from_str_radix(&lex.slice()[2..].replace('_', ""), 16).ok()
    })]
    #[regex(r"0[bB][01][01_]*", |lex| {
        BigInt::from_str_radix(&lex.slice()[2..].replace('_', ""), 2).ok()
    })]
    #[regex(r"0[oO][0-7][0-7_]*", |lex| {
        BigInt::from_str_radix(&lex.slice()[2..].replace('_', ""), 8).ok()
    })]
    RadixInteger(BigInt),

    // Decimal integer
    #[regex(r"[0-9][0-9_]*", |lex| {
        BigInt::from_str(&lex.slice().replace('_', "")).ok()
    })]
    Integer(BigInt),

    // Decimal number, either with a fraction part or an exponent
    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*([eE][+-]?[0-9]+)?", |lex| {
        BigDecimal::from_str(&lex.slice().replace('_', "")).ok()
    })]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+", |lex| {
        BigDecimal::from_str(&lex.slice().replace('_', "")).ok()
    })]
    Decimal(BigDecimal),

    // Imaginary literal: number with a trailing `i`
    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?([eE][+-]?[0-9]+)?i", |lex| {
        let s = lex.slice();
        BigDecimal::from_str(&s[..s.len() - 1].replace('_', "")).ok()
    })]
    Imaginary(BigDecimal),

    // Double-quoted strings interpolate; single-quoted do not
    #[regex(r#""([^"\\\n\r]|\\.)*""#)]
    DoubleStr,
    #[regex(r"'([^'\\\n\r]|\\.)*'")]
    SingleStr,

    #[regex(r"\$\$[a-zA-Z_][a-zA-Z0-9_]*")]
    GlobalIdent,
    #[regex(r"\$[0-9]+", |lex| lex.slice()[1..].parse::<u32>().ok())]
    Positional(u32),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

/// Lexed token kind with literal payloads.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Newline,
    Eof,
    /// Byte the lexer could not match.
    Error,

    If,
    Else,
    While,
    Loop,
    In,
    Within,
    Case,
    Of,
    Default,
    Matches,
    Define,
    Const,
    Var,
    Enum,
    Leave,
    Next,
    TimeThis,
    True,
    False,
    Null,
    SumOf,
    ProductOf,
    ArrayOf,
    LengthOf,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    DotDot,
    Dot,
    Colon,
    Semicolon,
    Question,
    Ellipsis,

    Plus,
    PlusPlus,
    Minus,
    MinusMinus,
    Star,
    StarStar,
    Slash,
    Percent,
    Backslash,
    EqEq,
    EqEqEq,
    Eq,
    BangEq,
    BangEqEq,
    Bang,
    Tilde,
    Spaceship,
    Shl,
    Shr,
    LtEq,
    Lt,
    GtEq,
    Gt,
    AmpAmp,
    Amp,
    PipePipe,
    Pipe,
    CaretCaret,
    Caret,
    /// Compound assignment such as `+=`; payload names the base operator.
    CompoundAssign(tally_ir::BinaryOp),

    Integer(BigInt),
    Decimal(BigDecimal),
    Imaginary(BigDecimal),
    /// Double-quoted; re-scanned for `$name` / `${expr}` at eval time.
    InterpStr(String),
    /// Single-quoted; taken literally.
    Str(String),
    GlobalIdent(String),
    Positional(u32),
    Ident(String),
}

/// One lexed token with its source span.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

/// Lex source text into a token list terminated by `Eof`.
pub fn lex(source: &str) -> Vec<Token> {
    let mut result = Vec::new();
    let mut logos = RawToken::lexer(source);

    while let Some(token_result) = logos.next() {
        let span = Span::from_range(logos.span());
        let slice = logos.slice();

        match token_result {
            Ok(raw) => match raw {
                RawToken::LineComment | RawToken::LineContinuation => {}
                _ => result.push(Token::new(convert_token(raw, slice), span)),
            },
            Err(()) => result.push(Token::new(TokenKind::Error, span)),
        }
    }

    let eof_pos = u32::try_from(source.len()).unwrap_or(u32::MAX);
    result.push(Token::new(TokenKind::Eof, Span::new(eof_pos, eof_pos)));
    result
}

fn convert_token(raw: RawToken, slice: &str) -> TokenKind {
    use tally_ir::BinaryOp;

    match raw {
        RawToken::LineComment | RawToken::LineContinuation => unreachable!(),
        RawToken::Newline => TokenKind::Newline,

        RawToken::If => TokenKind::If,
        RawToken::Else => TokenKind::Else,
        RawToken::While => TokenKind::While,
        RawToken::Loop => TokenKind::Loop,
        RawToken::In => TokenKind::In,
        RawToken::Within => TokenKind::Within,
        RawToken::Case => TokenKind::Case,
        RawToken::Of => TokenKind::Of,
        RawToken::Default => TokenKind::Default,
        RawToken::Matches => TokenKind::Matches,
        RawToken::Define => TokenKind::Define,
        RawToken::Const => TokenKind::Const,
        RawToken::Var => TokenKind::Var,
        RawToken::Enum => TokenKind::Enum,
        RawToken::Leave => TokenKind::Leave,
        RawToken::Next => TokenKind::Next,
        RawToken::TimeThis => TokenKind::TimeThis,
        RawToken::True => TokenKind::True,
        RawToken::False => TokenKind::False,
        RawToken::Null => TokenKind::Null,
        RawToken::SumOf => TokenKind::SumOf,
        RawToken::ProductOf => TokenKind::ProductOf,
        RawToken::ArrayOf => TokenKind::ArrayOf,
        RawToken::LengthOf => TokenKind::LengthOf,

        RawToken::LParen => TokenKind::LParen,
        RawToken::RParen => TokenKind::RParen,
        RawToken::LBracket => TokenKind::LBracket,
        RawToken::RBracket => TokenKind::RBracket,
        RawToken::LBrace => TokenKind::LBrace,
        RawToken::RBrace => TokenKind::RBrace,
        RawToken::Comma => TokenKind::Comma,
        RawToken::DotDot => TokenKind::DotDot,
        RawToken::Dot => TokenKind::Dot,
        RawToken::Colon => TokenKind::Colon,
        RawToken::Semicolon => TokenKind::Semicolon,
        RawToken::Question => TokenKind::Question,
        RawToken::Ellipsis => TokenKind::Ellipsis,

        RawToken::Plus => TokenKind::Plus,
        RawToken::PlusPlus => TokenKind::PlusPlus,
        RawToken::Minus => TokenKind::Minus,
        RawToken::MinusMinus => TokenKind::MinusMinus,
        RawToken::Star => TokenKind::Star,
        RawToken::StarStar => TokenKind::StarStar,
        RawToken::Slash => TokenKind::Slash,
        RawToken::Percent => TokenKind::Percent,
        RawToken::Backslash => TokenKind::Backslash,
        RawToken::EqEq => TokenKind::EqEq,
        RawToken::EqEqEq => TokenKind::EqEqEq,
        RawToken::Eq => TokenKind::Eq,
        RawToken::BangEq => TokenKind::BangEq,
        RawToken::BangEqEq => TokenKind::BangEqEq,
        RawToken::Bang => TokenKind::Bang,
        RawToken::Tilde => TokenKind::Tilde,
        RawToken::Spaceship => TokenKind::Spaceship,
        RawToken::Shl => TokenKind::Shl,
        RawToken::Shr => TokenKind::Shr,
        RawToken::LtEq => TokenKind::LtEq,
        RawToken::Lt => TokenKind::Lt,
        RawToken::GtEq => TokenKind::GtEq,
        RawToken::Gt => TokenKind::Gt,
        RawToken::AmpAmp => TokenKind::AmpAmp,
        RawToken::Amp => TokenKind::Amp,
        RawToken::PipePipe => TokenKind::PipePipe,
        RawToken::Pipe => TokenKind::Pipe,
        RawToken::CaretCaret => TokenKind::CaretCaret,
        RawToken::Caret => TokenKind::Caret,

        RawToken::PlusEq => TokenKind::CompoundAssign(BinaryOp::Add),
        RawToken::MinusEq => TokenKind::CompoundAssign(BinaryOp::Subtract),
        RawToken::StarEq => TokenKind::CompoundAssign(BinaryOp::Multiply),
        RawToken::StarStarEq => TokenKind::CompoundAssign(BinaryOp::Power),
        RawToken::SlashEq => TokenKind::CompoundAssign(BinaryOp::Divide),
        RawToken::PercentEq => TokenKind::CompoundAssign(BinaryOp::Modulus),
        RawToken::BackslashEq => TokenKind::CompoundAssign(BinaryOp::IntDivide),
        RawToken::AmpEq => TokenKind::CompoundAssign(BinaryOp::BitAnd),
        RawToken::PipeEq => TokenKind::CompoundAssign(BinaryOp::BitOr),
        RawToken::CaretEq => TokenKind::CompoundAssign(BinaryOp::BitXor),
        RawToken::ShlEq => TokenKind::CompoundAssign(BinaryOp::ShiftLeft),
        RawToken::ShrEq => TokenKind::CompoundAssign(BinaryOp::ShiftRight),

        RawToken::RadixInteger(n) | RawToken::Integer(n) => TokenKind::Integer(n),
        RawToken::Decimal(d) => TokenKind::Decimal(d),
        RawToken::Imaginary(d) => TokenKind::Imaginary(d),
        RawToken::DoubleStr => {
            TokenKind::InterpStr(unescape(&slice[1..slice.len() - 1]))
        }
        RawToken::SingleStr => TokenKind::Str(unescape(&slice[1..slice.len() - 1])),
        RawToken::GlobalIdent => TokenKind::GlobalIdent(slice[2..].to_owned()),
        RawToken::Positional(n) => TokenKind::Positional(n),
        RawToken::Ident => TokenKind::Ident(slice.to_owned()),
    }
}

/// Process backslash escapes in a string literal body.
///
/// `\uXXXX` takes exactly four hex digits; anything else after a
/// backslash passes through unchanged so interpolation escapes like
/// `\$` survive to eval time as the bare character.
fn unescape(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(c) => result.push(c),
                    None => {
                        result.push_str("\\u");
                        result.push_str(&hex);
                    }
                }
            }
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_numbers() {
        assert_eq!(
            kinds("42 0x1f 1_000"),
            vec![
                TokenKind::Integer(BigInt::from(42)),
                TokenKind::Integer(BigInt::from(31)),
                TokenKind::Integer(BigInt::from(1000)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn decimal_and_imaginary() {
        let toks = kinds("2.5 3i 1.5i");
        assert_eq!(toks.len(), 4);
        assert!(matches!(toks[0], TokenKind::Decimal(_)));
        assert!(matches!(toks[1], TokenKind::Imaginary(_)));
        assert!(matches!(toks[2], TokenKind::Imaginary(_)));
    }

    #[test]
    fn exponent_is_decimal() {
        let toks = kinds("1e3");
        assert!(matches!(toks[0], TokenKind::Decimal(_)));
    }

    #[test]
    fn multichar_operators_win() {
        assert_eq!(
            kinds("a <=> b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Spaceship,
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("** ^^ ===")[..3].to_vec(), vec![
            TokenKind::StarStar,
            TokenKind::CaretCaret,
            TokenKind::EqEqEq,
        ]);
    }

    #[test]
    fn string_kinds() {
        assert_eq!(
            kinds(r#""a$b" 'c\n'"#),
            vec![
                TokenKind::InterpStr("a$b".into()),
                TokenKind::Str("c\n".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn globals_and_positionals() {
        assert_eq!(
            kinds("$$total $2"),
            vec![
                TokenKind::GlobalIdent("total".into()),
                TokenKind::Positional(2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_continuations_are_trivia() {
        assert_eq!(
            kinds("1 // note\n2 # also\n"),
            vec![
                TokenKind::Integer(BigInt::from(1)),
                TokenKind::Newline,
                TokenKind::Integer(BigInt::from(2)),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("1 + \\\n 2"),
            vec![
                TokenKind::Integer(BigInt::from(1)),
                TokenKind::Plus,
                TokenKind::Integer(BigInt::from(2)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unicode_escape() {
        assert_eq!(unescape(r"π"), "\u{3c0}");
        assert_eq!(unescape(r"pi π!"), "pi \u{3c0}!");
    }
}
