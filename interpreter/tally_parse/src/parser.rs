//! Recursive-descent parser producing `tally_ir` nodes.
//!
//! Statements are separated by newlines or semicolons. Newlines inside
//! parentheses and brackets are insignificant; the cursor skips them
//! automatically while any such group is open.

use tally_diagnostic::{Category, Diagnostic};
use tally_ir::{
    BinaryOp, CaseBlock, CaseSelector, CompareOp, Connective, Directive, ModeSetting, ModeValue,
    NodeArena, NodeId, NodeKind, Param, RangeSpec, ReductionOp, RegexFlags, Span, TrigUnits,
    UnaryOp,
};

use crate::lexer::{lex, Token, TokenKind};

/// A parsed input unit: the node arena plus the root block.
#[derive(Debug)]
pub struct ParsedUnit {
    pub arena: NodeArena,
    /// Always a `Block` of top-level statements.
    pub root: NodeId,
}

/// Parse one unit of source text (a line, a file, or a pasted block).
pub fn parse(source: &str) -> Result<ParsedUnit, Diagnostic> {
    let mut parser = Parser::new(lex(source));
    let root = parser.parse_unit()?;
    Ok(ParsedUnit {
        arena: parser.arena,
        root,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Open paren/bracket groups. Newlines are trivia while non-zero.
    group_depth: u32,
    arena: NodeArena,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            group_depth: 0,
            arena: NodeArena::new(),
        }
    }

    // ---- cursor ----

    fn peek_index(&self) -> usize {
        let mut i = self.pos;
        if self.group_depth > 0 {
            while matches!(self.tokens[i].kind, TokenKind::Newline) {
                i += 1;
            }
        }
        i
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.peek_index()].kind
    }

    /// Token kind after the current one, skipping newlines.
    fn peek2(&self) -> &TokenKind {
        let mut i = self.peek_index() + 1;
        while matches!(self.tokens[i].kind, TokenKind::Newline) {
            i += 1;
        }
        &self.tokens[i].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.peek_index()].span
    }

    fn advance(&mut self) -> Token {
        let i = self.peek_index();
        let token = self.tokens[i].clone();
        if !matches!(token.kind, TokenKind::Eof) {
            self.pos = i + 1;
        } else {
            self.pos = i;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span), Diagnostic> {
        match self.peek() {
            TokenKind::Ident(_) => {
                let token = self.advance();
                match token.kind {
                    TokenKind::Ident(name) => Ok((name, token.span)),
                    _ => unreachable!(),
                }
            }
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    fn error(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(Category::Syntax, message).with_span(self.peek_span())
    }

    /// Skip statement separators (newlines and semicolons).
    fn skip_separators(&mut self) {
        while matches!(self.peek(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    /// Skip newlines only, inside braced constructs.
    fn skip_newlines(&mut self) {
        while matches!(self.peek(), TokenKind::Newline) {
            self.advance();
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Newline
                | TokenKind::Semicolon
                | TokenKind::Eof
                | TokenKind::RBrace
        )
    }

    fn expect_statement_end(&mut self) -> Result<(), Diagnostic> {
        if self.at_statement_end() {
            Ok(())
        } else {
            Err(self.error("expected end of statement"))
        }
    }

    // ---- statements ----

    fn parse_unit(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.peek_span();
        let mut stmts = Vec::new();
        self.skip_separators();
        while !matches!(self.peek(), TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
            if !matches!(self.peek(), TokenKind::Eof) {
                self.expect_statement_end()?;
                self.skip_separators();
            }
        }
        let span = start.merge(self.peek_span());
        Ok(self.arena.alloc(NodeKind::Block(stmts), span))
    }

    fn parse_statement(&mut self) -> Result<NodeId, Diagnostic> {
        match self.peek() {
            TokenKind::Colon => self.parse_directive(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(None),
            TokenKind::Loop => self.parse_loop(None),
            TokenKind::Case => self.parse_case(),
            TokenKind::Define => self.parse_define(),
            TokenKind::Const => self.parse_decl(true),
            TokenKind::Var => self.parse_decl(false),
            TokenKind::Enum => self.parse_enum(),
            TokenKind::Leave => self.parse_leave(),
            TokenKind::Next => {
                let span = self.advance().span;
                Ok(self.arena.alloc(NodeKind::Next, span))
            }
            TokenKind::TimeThis => self.parse_timethis(),
            // Labeled loop: `name : loop` / `name : while`
            TokenKind::Ident(_)
                if matches!(self.peek2(), TokenKind::Colon)
                    && matches!(self.peek3_after_colon(), TokenKind::Loop | TokenKind::While) =>
            {
                let (label, _) = self.expect_ident("label")?;
                self.expect(&TokenKind::Colon, "`:`")?;
                match self.peek() {
                    TokenKind::Loop => self.parse_loop(Some(label)),
                    _ => self.parse_while(Some(label)),
                }
            }
            _ => self.parse_expr_or_assignment(),
        }
    }

    /// Kind after `ident :`, for label lookahead.
    fn peek3_after_colon(&self) -> &TokenKind {
        let mut i = self.peek_index() + 1;
        while matches!(self.tokens[i].kind, TokenKind::Newline) {
            i += 1;
        }
        if matches!(self.tokens[i].kind, TokenKind::Colon) {
            i += 1;
            while matches!(self.tokens[i].kind, TokenKind::Newline) {
                i += 1;
            }
        }
        &self.tokens[i].kind
    }

    fn parse_expr_or_assignment(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.peek_span();
        let expr = self.parse_expr()?;
        let op = match self.peek() {
            TokenKind::Eq => None,
            TokenKind::CompoundAssign(op) => Some(*op),
            _ => return Ok(expr),
        };
        self.advance();
        if !matches!(
            self.arena.kind(expr),
            NodeKind::Ident(_)
                | NodeKind::GlobalIdent(_)
                | NodeKind::Member { .. }
                | NodeKind::Index { .. }
        ) {
            return Err(Diagnostic::new(Category::Syntax, "invalid assignment target")
                .with_span(self.arena.span(expr)));
        }
        let rhs = self.parse_expr()?;
        let span = start.merge(self.arena.span(rhs));
        Ok(self.arena.alloc(
            NodeKind::Assign {
                target: expr,
                op,
                expr: rhs,
            },
            span,
        ))
    }

    /// `{ stmts }`, or a single statement treated as a one-entry block.
    fn parse_body(&mut self) -> Result<NodeId, Diagnostic> {
        if self.check(&TokenKind::LBrace) {
            self.parse_braced_block()
        } else {
            let stmt = self.parse_statement()?;
            let span = self.arena.span(stmt);
            Ok(self.arena.alloc(NodeKind::Block(vec![stmt]), span))
        }
    }

    fn parse_braced_block(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.expect(&TokenKind::LBrace, "`{`")?.span;
        let mut stmts = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::RBrace) {
            if matches!(self.peek(), TokenKind::Eof) {
                return Err(self.error("unterminated block"));
            }
            stmts.push(self.parse_statement()?);
            if !self.check(&TokenKind::RBrace) {
                self.expect_statement_end()?;
                self.skip_separators();
            }
        }
        let end = self.advance().span;
        Ok(self.arena.alloc(NodeKind::Block(stmts), start.merge(end)))
    }

    fn parse_if(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span;
        let cond = self.parse_expr()?;
        let then_block = self.parse_body()?;
        let else_block = if self.peek_past_newlines_is_else() {
            self.skip_newlines();
            self.advance(); // else
            Some(if self.check(&TokenKind::If) {
                self.parse_if()?
            } else {
                self.parse_body()?
            })
        } else {
            None
        };
        let end = else_block.unwrap_or(then_block);
        let span = start.merge(self.arena.span(end));
        Ok(self.arena.alloc(
            NodeKind::If {
                cond,
                then_block,
                else_block,
            },
            span,
        ))
    }

    /// `else` may sit on the line after the closing brace.
    fn peek_past_newlines_is_else(&self) -> bool {
        let mut i = self.peek_index();
        while matches!(self.tokens[i].kind, TokenKind::Newline) {
            i += 1;
        }
        matches!(self.tokens[i].kind, TokenKind::Else)
    }

    fn parse_while(&mut self, label: Option<String>) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span;
        let cond = self.parse_expr()?;
        let body = self.parse_body()?;
        let span = start.merge(self.arena.span(body));
        Ok(self.arena.alloc(NodeKind::While { label, cond, body }, span))
    }

    fn parse_loop(&mut self, label: Option<String>) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span;
        // `loop v in ...` / `loop v within ...` / `loop within ...` / `loop ...`
        let mut var = None;
        let mut within = false;
        if matches!(self.peek(), TokenKind::Ident(_))
            && matches!(self.peek2(), TokenKind::In | TokenKind::Within)
        {
            let (name, _) = self.expect_ident("loop variable")?;
            var = Some(name);
            within = matches!(self.advance().kind, TokenKind::Within);
        } else if self.eat(&TokenKind::Within) {
            within = true;
        } else {
            self.eat(&TokenKind::In);
        }
        let spec = self.parse_range_spec(true)?;
        let body = self.parse_body()?;
        let span = start.merge(self.arena.span(body));
        Ok(self.arena.alloc(
            NodeKind::Loop {
                label,
                var,
                spec,
                within,
                body,
            },
            span,
        ))
    }

    /// `[start ..] stop [, step]` or a comma-separated value list.
    ///
    /// `allow_list` enables the comma forms; membership tests and bare
    /// reductions parse a single expression or dot range only.
    fn parse_range_spec(&mut self, allow_list: bool) -> Result<RangeSpec, Diagnostic> {
        if self.eat(&TokenKind::DotDot) {
            let stop = self.parse_expr()?;
            let step = if allow_list && self.eat(&TokenKind::Comma) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            return Ok(RangeSpec::Dots {
                start: None,
                stop,
                step,
            });
        }
        let first = self.parse_expr()?;
        if self.eat(&TokenKind::DotDot) {
            let stop = self.parse_expr()?;
            let step = if allow_list && self.eat(&TokenKind::Comma) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            return Ok(RangeSpec::Dots {
                start: Some(first),
                stop,
                step,
            });
        }
        let mut exprs = vec![first];
        if allow_list {
            while self.eat(&TokenKind::Comma) {
                exprs.push(self.parse_expr()?);
            }
        }
        Ok(RangeSpec::Exprs(exprs))
    }

    fn parse_case(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span;
        let value = self.parse_expr()?;
        self.expect(&TokenKind::Of, "`of`")?;
        self.skip_newlines();
        self.expect(&TokenKind::LBrace, "`{`")?;
        let mut blocks = Vec::new();
        loop {
            self.skip_separators();
            if self.check(&TokenKind::RBrace) {
                break;
            }
            if matches!(self.peek(), TokenKind::Eof) {
                return Err(self.error("unterminated case statement"));
            }
            let mut selectors = vec![self.parse_case_selector()?];
            while self.eat(&TokenKind::Comma) {
                self.skip_newlines();
                selectors.push(self.parse_case_selector()?);
            }
            self.expect(&TokenKind::Colon, "`:` after case selector")?;
            self.skip_newlines();
            let body = self.parse_body()?;
            blocks.push(CaseBlock { selectors, body });
        }
        let end = self.advance().span;
        Ok(self
            .arena
            .alloc(NodeKind::Case { value, blocks }, start.merge(end)))
    }

    fn parse_case_selector(&mut self) -> Result<CaseSelector, Diagnostic> {
        match self.peek() {
            TokenKind::Default => {
                self.advance();
                Ok(CaseSelector::Default)
            }
            TokenKind::Matches => {
                self.advance();
                let pattern = match self.advance() {
                    Token {
                        kind: TokenKind::Str(s) | TokenKind::InterpStr(s),
                        ..
                    } => s,
                    _ => return Err(self.error("expected pattern string after `matches`")),
                };
                let flags = if let TokenKind::Ident(letters) = self.peek() {
                    let flags = parse_regex_flags(letters)
                        .ok_or_else(|| self.error("unknown regex flag"))?;
                    self.advance();
                    flags
                } else {
                    RegexFlags::default()
                };
                Ok(CaseSelector::Regex { pattern, flags })
            }
            TokenKind::DotDot => {
                self.advance();
                let stop = self.parse_expr()?;
                Ok(CaseSelector::Range {
                    start: None,
                    stop,
                    step: None,
                })
            }
            _ => {
                if let Some(op) = self.peek_compare_op() {
                    self.advance();
                    // Operands sit below `&&`/`||`/`^^` so the connective
                    // can join a second comparison.
                    let first = (op, self.parse_bit_or()?);
                    let second = match self.peek() {
                        TokenKind::AmpAmp | TokenKind::PipePipe | TokenKind::CaretCaret => {
                            let conn = match self.advance().kind {
                                TokenKind::AmpAmp => Connective::And,
                                TokenKind::PipePipe => Connective::Or,
                                _ => Connective::Xor,
                            };
                            let op = self
                                .peek_compare_op()
                                .ok_or_else(|| self.error("expected comparison operator"))?;
                            self.advance();
                            Some((conn, op, self.parse_bit_or()?))
                        }
                        _ => None,
                    };
                    return Ok(CaseSelector::Compare { first, second });
                }
                let expr = self.parse_expr()?;
                if self.eat(&TokenKind::DotDot) {
                    let stop = self.parse_expr()?;
                    Ok(CaseSelector::Range {
                        start: Some(expr),
                        stop,
                        step: None,
                    })
                } else {
                    Ok(CaseSelector::Value(expr))
                }
            }
        }
    }

    fn peek_compare_op(&self) -> Option<CompareOp> {
        match self.peek() {
            TokenKind::Lt => Some(CompareOp::Less),
            TokenKind::LtEq => Some(CompareOp::LessEqual),
            TokenKind::Gt => Some(CompareOp::Greater),
            TokenKind::GtEq => Some(CompareOp::GreaterEqual),
            TokenKind::EqEq => Some(CompareOp::Equal),
            TokenKind::BangEq => Some(CompareOp::NotEqual),
            _ => None,
        }
    }

    fn parse_define(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span;
        let (name, _) = self.expect_ident("function name")?;
        let mut params = Vec::new();
        if self.eat(&TokenKind::LParen) {
            self.group_depth += 1;
            if !self.check(&TokenKind::RParen) {
                loop {
                    params.push(self.parse_param()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.group_depth -= 1;
            self.expect(&TokenKind::RParen, "`)`")?;
        }
        let body = if self.eat(&TokenKind::Eq) {
            self.parse_expr()?
        } else {
            self.parse_braced_block()?
        };
        let span = start.merge(self.arena.span(body));
        Ok(self
            .arena
            .alloc(NodeKind::Define { name, params, body }, span))
    }

    fn parse_param(&mut self) -> Result<Param, Diagnostic> {
        if self.eat(&TokenKind::Ellipsis) {
            let (name, _) = self.expect_ident("rest parameter name")?;
            return Ok(Param {
                name,
                default: None,
                rest: true,
            });
        }
        let (name, _) = self.expect_ident("parameter name")?;
        let default = if self.eat(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Param {
            name,
            default,
            rest: false,
        })
    }

    fn parse_decl(&mut self, constant: bool) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span;
        let (name, _) = self.expect_ident("name")?;
        self.expect(&TokenKind::Eq, "`=`")?;
        let expr = self.parse_expr()?;
        let span = start.merge(self.arena.span(expr));
        let kind = if constant {
            NodeKind::ConstDecl { name, expr }
        } else {
            NodeKind::VarDecl { name, expr }
        };
        Ok(self.arena.alloc(kind, span))
    }

    fn parse_enum(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span;
        let mut names = Vec::new();
        let (first, mut end) = self.expect_ident("enum member name")?;
        names.push(first);
        while self.eat(&TokenKind::Comma) {
            let (name, span) = self.expect_ident("enum member name")?;
            names.push(name);
            end = span;
        }
        Ok(self
            .arena
            .alloc(NodeKind::EnumDecl(names), start.merge(end)))
    }

    fn parse_leave(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span;
        let mut label = None;
        // A bare identifier right after `leave` is a label, not a value,
        // unless an operator follows and makes it part of an expression.
        if matches!(self.peek(), TokenKind::Ident(_)) {
            let after = self.peek2();
            let is_label = matches!(
                after,
                TokenKind::Newline
                    | TokenKind::Semicolon
                    | TokenKind::Eof
                    | TokenKind::RBrace
            ) || starts_expression(after);
            if is_label {
                let (name, _) = self.expect_ident("label")?;
                label = Some(name);
            }
        }
        self.eat(&TokenKind::Comma);
        let value = if self.at_statement_end() {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let end = value.map_or(start, |v| self.arena.span(v));
        Ok(self
            .arena
            .alloc(NodeKind::Leave { label, value }, start.merge(end)))
    }

    fn parse_timethis(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span;
        let body = self.parse_body()?;
        let span = start.merge(self.arena.span(body));
        Ok(self.arena.alloc(NodeKind::TimeThis { body }, span))
    }

    // ---- directives ----

    fn parse_directive(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span; // `:`
        let (name, name_span) = self.expect_ident("directive name")?;
        let lower = name.to_ascii_lowercase();

        if let Some(setting) = ModeSetting::ALL.iter().find(|s| s.name() == lower) {
            let value = self.parse_mode_value()?;
            let block = if self.check(&TokenKind::LBrace) {
                Some(self.parse_braced_block()?)
            } else {
                None
            };
            return self.finish_directive(
                start,
                Directive::Mode {
                    setting: *setting,
                    value,
                    block,
                },
            );
        }

        match lower.as_str() {
            "precision" | "prec" => {
                let value = self.parse_mode_value()?;
                let block = if self.check(&TokenKind::LBrace) {
                    Some(self.parse_braced_block()?)
                } else {
                    None
                };
                self.finish_directive(start, Directive::Precision { value, block })
            }
            "degrees" | "deg" => self.finish_directive(start, Directive::TrigUnits(TrigUnits::Degrees)),
            "radians" | "rad" => self.finish_directive(start, Directive::TrigUnits(TrigUnits::Radians)),
            "grads" | "grad" => self.finish_directive(start, Directive::TrigUnits(TrigUnits::Grads)),
            "clear" => {
                let mut names = Vec::new();
                while matches!(self.peek(), TokenKind::Ident(_)) {
                    let (name, _) = self.expect_ident("name")?;
                    names.push(name);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.finish_directive(start, Directive::Clear(names))
            }
            "save" => {
                let path = self.parse_word_argument("file path")?;
                self.finish_directive(start, Directive::Save(path))
            }
            "open" => {
                let path = self.parse_word_argument("file path")?;
                self.finish_directive(start, Directive::Open(path))
            }
            "assert" => {
                let cond = self.parse_expr()?;
                let message = if self.eat(&TokenKind::Comma) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.finish_directive(start, Directive::Assert { cond, message })
            }
            "require" => {
                let version = self.parse_word_argument("version")?;
                self.finish_directive(start, Directive::Require(version))
            }
            "echo" => {
                let expr = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.finish_directive(start, Directive::Echo(expr))
            }
            "quit" | "exit" => self.finish_directive(start, Directive::Quit),
            _ => Err(Diagnostic::new(
                Category::Syntax,
                format!("unknown directive \":{name}\""),
            )
            .with_span(name_span)),
        }
    }

    fn finish_directive(&mut self, start: Span, directive: Directive) -> Result<NodeId, Diagnostic> {
        let span = start.merge(self.peek_span());
        Ok(self.arena.alloc(NodeKind::Directive(directive), span))
    }

    /// Mode directives with no argument mean "turn on".
    fn parse_mode_value(&mut self) -> Result<ModeValue, Diagnostic> {
        if self.at_statement_end() || self.check(&TokenKind::LBrace) {
            let span = self.peek_span();
            let on = self.arena.alloc(NodeKind::Bool(true), span);
            return Ok(ModeValue::Expr(on));
        }
        if let TokenKind::Ident(word) = self.peek() {
            match word.to_ascii_lowercase().as_str() {
                "pop" | "prev" | "previous" => {
                    self.advance();
                    return Ok(ModeValue::Pop);
                }
                "initial" => {
                    self.advance();
                    return Ok(ModeValue::Initial);
                }
                "on" | "yes" => {
                    let span = self.advance().span;
                    let on = self.arena.alloc(NodeKind::Bool(true), span);
                    return Ok(ModeValue::Expr(on));
                }
                "off" | "no" => {
                    let span = self.advance().span;
                    let off = self.arena.alloc(NodeKind::Bool(false), span);
                    return Ok(ModeValue::Expr(off));
                }
                _ => {}
            }
        }
        Ok(ModeValue::Expr(self.parse_expr()?))
    }

    /// Directive argument: a quoted string, or a run of bare tokens taken
    /// verbatim (so `:open results.tally` works without quotes).
    fn parse_word_argument(&mut self, what: &str) -> Result<String, Diagnostic> {
        match self.peek() {
            TokenKind::Str(_) | TokenKind::InterpStr(_) => {
                let token = self.advance();
                match token.kind {
                    TokenKind::Str(s) | TokenKind::InterpStr(s) => Ok(s),
                    _ => unreachable!(),
                }
            }
            _ => {
                let mut word = String::new();
                while !self.at_statement_end() {
                    let token = self.advance();
                    match token.kind {
                        TokenKind::Ident(s) | TokenKind::GlobalIdent(s) => word.push_str(&s),
                        TokenKind::Integer(n) => word.push_str(&n.to_string()),
                        TokenKind::Decimal(d) => word.push_str(&d.to_string()),
                        TokenKind::Dot => word.push('.'),
                        TokenKind::DotDot => word.push_str(".."),
                        TokenKind::Slash => word.push('/'),
                        TokenKind::Minus => word.push('-'),
                        _ => return Err(self.error(format!("expected {what}"))),
                    }
                }
                if word.is_empty() {
                    return Err(self.error(format!("expected {what}")));
                }
                Ok(word)
            }
        }
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<NodeId, Diagnostic> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<NodeId, Diagnostic> {
        let cond = self.parse_or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        let then_expr = self.parse_expr()?;
        self.expect(&TokenKind::Colon, "`:` in conditional expression")?;
        let else_expr = self.parse_ternary()?;
        let span = self.arena.span(cond).merge(self.arena.span(else_expr));
        Ok(self.arena.alloc(
            NodeKind::Ternary {
                cond,
                then_expr,
                else_expr,
            },
            span,
        ))
    }

    fn binary_level<F>(
        &mut self,
        mut next: F,
        table: &[(TokenKind, BinaryOp)],
    ) -> Result<NodeId, Diagnostic>
    where
        F: FnMut(&mut Self) -> Result<NodeId, Diagnostic>,
    {
        let mut lhs = next(self)?;
        'outer: loop {
            for (token, op) in table {
                if self.check(token) {
                    self.advance();
                    let rhs = next(self)?;
                    let span = self.arena.span(lhs).merge(self.arena.span(rhs));
                    lhs = self.arena.alloc(
                        NodeKind::Binary {
                            op: *op,
                            lhs,
                            rhs,
                        },
                        span,
                    );
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn parse_or(&mut self) -> Result<NodeId, Diagnostic> {
        self.binary_level(Self::parse_bool_xor, &[(TokenKind::PipePipe, BinaryOp::Or)])
    }

    fn parse_bool_xor(&mut self) -> Result<NodeId, Diagnostic> {
        self.binary_level(
            Self::parse_and,
            &[(TokenKind::CaretCaret, BinaryOp::BoolXor)],
        )
    }

    fn parse_and(&mut self) -> Result<NodeId, Diagnostic> {
        self.binary_level(Self::parse_bit_or, &[(TokenKind::AmpAmp, BinaryOp::And)])
    }

    fn parse_bit_or(&mut self) -> Result<NodeId, Diagnostic> {
        self.binary_level(Self::parse_bit_xor, &[(TokenKind::Pipe, BinaryOp::BitOr)])
    }

    fn parse_bit_xor(&mut self) -> Result<NodeId, Diagnostic> {
        self.binary_level(Self::parse_bit_and, &[(TokenKind::Caret, BinaryOp::BitXor)])
    }

    fn parse_bit_and(&mut self) -> Result<NodeId, Diagnostic> {
        self.binary_level(Self::parse_equality, &[(TokenKind::Amp, BinaryOp::BitAnd)])
    }

    fn parse_equality(&mut self) -> Result<NodeId, Diagnostic> {
        self.binary_level(
            Self::parse_relational,
            &[
                (TokenKind::EqEqEq, BinaryOp::StrictEqual),
                (TokenKind::BangEqEq, BinaryOp::StrictNotEqual),
                (TokenKind::EqEq, BinaryOp::Equal),
                (TokenKind::BangEq, BinaryOp::NotEqual),
                (TokenKind::Spaceship, BinaryOp::Spaceship),
            ],
        )
    }

    fn parse_relational(&mut self) -> Result<NodeId, Diagnostic> {
        let mut lhs = self.parse_shift()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinaryOp::Less,
                TokenKind::LtEq => BinaryOp::LessEqual,
                TokenKind::Gt => BinaryOp::Greater,
                TokenKind::GtEq => BinaryOp::GreaterEqual,
                TokenKind::In => BinaryOp::In,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = if op == BinaryOp::In {
                self.parse_membership_rhs()?
            } else {
                self.parse_shift()?
            };
            let span = self.arena.span(lhs).merge(self.arena.span(rhs));
            lhs = self.arena.alloc(NodeKind::Binary { op, lhs, rhs }, span);
        }
    }

    /// Right side of `in`: a plain expression or a bare dot range.
    fn parse_membership_rhs(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.peek_span();
        if self.eat(&TokenKind::DotDot) {
            let stop = self.parse_shift()?;
            let span = start.merge(self.arena.span(stop));
            return Ok(self.arena.alloc(
                NodeKind::Range(RangeSpec::Dots {
                    start: None,
                    stop,
                    step: None,
                }),
                span,
            ));
        }
        let first = self.parse_shift()?;
        if self.eat(&TokenKind::DotDot) {
            let stop = self.parse_shift()?;
            let span = self.arena.span(first).merge(self.arena.span(stop));
            return Ok(self.arena.alloc(
                NodeKind::Range(RangeSpec::Dots {
                    start: Some(first),
                    stop,
                    step: None,
                }),
                span,
            ));
        }
        Ok(first)
    }

    fn parse_shift(&mut self) -> Result<NodeId, Diagnostic> {
        self.binary_level(
            Self::parse_additive,
            &[
                (TokenKind::Shl, BinaryOp::ShiftLeft),
                (TokenKind::Shr, BinaryOp::ShiftRight),
            ],
        )
    }

    fn parse_additive(&mut self) -> Result<NodeId, Diagnostic> {
        self.binary_level(
            Self::parse_multiplicative,
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Subtract),
            ],
        )
    }

    fn parse_multiplicative(&mut self) -> Result<NodeId, Diagnostic> {
        self.binary_level(
            Self::parse_unary,
            &[
                (TokenKind::Star, BinaryOp::Multiply),
                (TokenKind::Slash, BinaryOp::Divide),
                (TokenKind::Percent, BinaryOp::Modulus),
                (TokenKind::Backslash, BinaryOp::IntDivide),
            ],
        )
    }

    fn parse_unary(&mut self) -> Result<NodeId, Diagnostic> {
        // Prefix `++x` / `--x` desugar to `x += 1` / `x -= 1`.
        if let Some(step) = match self.peek() {
            TokenKind::PlusPlus => Some(BinaryOp::Add),
            TokenKind::MinusMinus => Some(BinaryOp::Subtract),
            _ => None,
        } {
            let start = self.advance().span;
            let target = self.parse_unary()?;
            if !matches!(
                self.arena.kind(target),
                NodeKind::Ident(_)
                    | NodeKind::GlobalIdent(_)
                    | NodeKind::Member { .. }
                    | NodeKind::Index { .. }
            ) {
                return Err(
                    Diagnostic::new(Category::Syntax, "invalid increment target")
                        .with_span(self.arena.span(target)),
                );
            }
            let one = self.arena.alloc(NodeKind::Integer(1.into()), start);
            let span = start.merge(self.arena.span(target));
            return Ok(self.arena.alloc(
                NodeKind::Assign {
                    target,
                    op: Some(step),
                    expr: one,
                },
                span,
            ));
        }
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            _ => return self.parse_power(),
        };
        let start = self.advance().span;
        let expr = self.parse_unary()?;
        let span = start.merge(self.arena.span(expr));
        Ok(self.arena.alloc(NodeKind::Unary { op, expr }, span))
    }

    /// `**` is right-associative and binds tighter than unary minus on
    /// its left, looser than one on its right: `-2**2` is `-(2**2)`.
    fn parse_power(&mut self) -> Result<NodeId, Diagnostic> {
        let lhs = self.parse_postfix()?;
        if !self.eat(&TokenKind::StarStar) {
            return Ok(lhs);
        }
        let rhs = self.parse_unary()?;
        let span = self.arena.span(lhs).merge(self.arena.span(rhs));
        Ok(self.arena.alloc(
            NodeKind::Binary {
                op: BinaryOp::Power,
                lhs,
                rhs,
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> Result<NodeId, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    self.advance();
                    self.group_depth += 1;
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.group_depth -= 1;
                    let end = self.expect(&TokenKind::RParen, "`)`")?.span;
                    let span = self.arena.span(expr).merge(end);
                    expr = self
                        .arena
                        .alloc(NodeKind::Call { callee: expr, args }, span);
                }
                TokenKind::LBracket => {
                    self.advance();
                    self.group_depth += 1;
                    let index = self.parse_expr()?;
                    self.group_depth -= 1;
                    let end = self.expect(&TokenKind::RBracket, "`]`")?.span;
                    let span = self.arena.span(expr).merge(end);
                    expr = self.arena.alloc(
                        NodeKind::Index {
                            target: expr,
                            index,
                        },
                        span,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let (name, name_span) = self.expect_ident("member name")?;
                    let span = self.arena.span(expr).merge(name_span);
                    expr = self.arena.alloc(
                        NodeKind::Member {
                            target: expr,
                            name,
                        },
                        span,
                    );
                }
                TokenKind::Bang => {
                    let end = self.advance().span;
                    let span = self.arena.span(expr).merge(end);
                    expr = self.arena.alloc(
                        NodeKind::Unary {
                            op: UnaryOp::Factorial,
                            expr,
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<NodeId, Diagnostic> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Null => {
                self.advance();
                Ok(self.arena.alloc(NodeKind::Null, span))
            }
            TokenKind::True => {
                self.advance();
                Ok(self.arena.alloc(NodeKind::Bool(true), span))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.arena.alloc(NodeKind::Bool(false), span))
            }
            TokenKind::Integer(n) => {
                self.advance();
                Ok(self.arena.alloc(NodeKind::Integer(n), span))
            }
            TokenKind::Decimal(d) => {
                self.advance();
                Ok(self.arena.alloc(NodeKind::Decimal(d), span))
            }
            TokenKind::Imaginary(d) => {
                self.advance();
                Ok(self.arena.alloc(NodeKind::Imaginary(d), span))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(self.arena.alloc(NodeKind::Str(s), span))
            }
            TokenKind::InterpStr(s) => {
                self.advance();
                let kind = if s.contains('$') {
                    NodeKind::InterpStr(s)
                } else {
                    NodeKind::Str(s)
                };
                Ok(self.arena.alloc(kind, span))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(self.arena.alloc(NodeKind::Ident(name), span))
            }
            TokenKind::GlobalIdent(name) => {
                self.advance();
                Ok(self.arena.alloc(NodeKind::GlobalIdent(name), span))
            }
            TokenKind::Positional(n) => {
                self.advance();
                Ok(self.arena.alloc(NodeKind::Positional(n), span))
            }
            TokenKind::LParen => {
                self.advance();
                self.group_depth += 1;
                let expr = self.parse_expr()?;
                self.group_depth -= 1;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_brace_literal(),
            TokenKind::SumOf => self.parse_reduction(ReductionOp::SumOf),
            TokenKind::ProductOf => self.parse_reduction(ReductionOp::ProductOf),
            TokenKind::ArrayOf => self.parse_reduction(ReductionOp::ArrayOf),
            TokenKind::LengthOf => self.parse_reduction(ReductionOp::LengthOf),
            TokenKind::Error => Err(self.error("unrecognized character")),
            _ => Err(self.error("expected an expression")),
        }
    }

    fn parse_array_literal(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span;
        self.group_depth += 1;
        let mut elements = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                elements.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                // trailing comma
                if self.check(&TokenKind::RBracket) {
                    break;
                }
            }
        }
        self.group_depth -= 1;
        let end = self.expect(&TokenKind::RBracket, "`]`")?.span;
        Ok(self
            .arena
            .alloc(NodeKind::ArrayLit(elements), start.merge(end)))
    }

    /// `{}` is the typeless empty collection; `{ k: v }` an object;
    /// `{ a, b }` a set.
    fn parse_brace_literal(&mut self) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span;
        self.skip_newlines();
        if self.check(&TokenKind::RBrace) {
            let end = self.advance().span;
            return Ok(self.arena.alloc(NodeKind::EmptyCollection, start.merge(end)));
        }

        let is_object = matches!(
            (self.peek(), self.peek2()),
            (
                TokenKind::Ident(_) | TokenKind::Str(_) | TokenKind::InterpStr(_),
                TokenKind::Colon
            )
        );

        if is_object {
            let mut pairs = Vec::new();
            loop {
                self.skip_newlines();
                let key = match self.advance() {
                    Token {
                        kind: TokenKind::Ident(s) | TokenKind::Str(s) | TokenKind::InterpStr(s),
                        ..
                    } => s,
                    _ => return Err(self.error("expected object key")),
                };
                self.skip_newlines();
                self.expect(&TokenKind::Colon, "`:` after object key")?;
                self.skip_newlines();
                let value = self.parse_expr()?;
                pairs.push((key, value));
                self.skip_newlines();
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                self.skip_newlines();
                if self.check(&TokenKind::RBrace) {
                    break;
                }
            }
            self.skip_newlines();
            let end = self.expect(&TokenKind::RBrace, "`}`")?.span;
            return Ok(self.arena.alloc(NodeKind::ObjectLit(pairs), start.merge(end)));
        }

        let mut elements = Vec::new();
        loop {
            self.skip_newlines();
            elements.push(self.parse_expr()?);
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) {
                break;
            }
        }
        self.skip_newlines();
        let end = self.expect(&TokenKind::RBrace, "`}`")?.span;
        Ok(self.arena.alloc(NodeKind::SetLit(elements), start.merge(end)))
    }

    /// `sumof (range)` with the full comma syntax, or `sumof expr[..expr]`.
    fn parse_reduction(&mut self, op: ReductionOp) -> Result<NodeId, Diagnostic> {
        let start = self.advance().span;
        let spec;
        let end;
        if self.eat(&TokenKind::LParen) {
            self.group_depth += 1;
            spec = self.parse_range_spec(true)?;
            self.group_depth -= 1;
            end = self.expect(&TokenKind::RParen, "`)`")?.span;
        } else {
            spec = self.parse_range_spec(false)?;
            end = self.last_span_of(&spec);
        }
        Ok(self
            .arena
            .alloc(NodeKind::Reduction { op, spec }, start.merge(end)))
    }

    fn last_span_of(&self, spec: &RangeSpec) -> Span {
        match spec {
            RangeSpec::Exprs(exprs) => exprs
                .last()
                .map_or(Span::DUMMY, |&id| self.arena.span(id)),
            RangeSpec::Dots { step, stop, .. } => {
                self.arena.span(step.unwrap_or(*stop))
            }
        }
    }
}

/// Can this token begin an expression? Used for `leave label value`
/// disambiguation.
fn starts_expression(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Integer(_)
            | TokenKind::Decimal(_)
            | TokenKind::Imaginary(_)
            | TokenKind::Str(_)
            | TokenKind::InterpStr(_)
            | TokenKind::Ident(_)
            | TokenKind::GlobalIdent(_)
            | TokenKind::Positional(_)
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::SumOf
            | TokenKind::ProductOf
            | TokenKind::ArrayOf
            | TokenKind::LengthOf
    )
}

fn parse_regex_flags(letters: &str) -> Option<RegexFlags> {
    let mut flags = RegexFlags::default();
    for c in letters.chars() {
        match c {
            'i' => flags.case_insensitive = true,
            's' => flags.dot_all = true,
            'L' => flags.literal = true,
            'm' => flags.multiline = true,
            'u' => flags.unicode_case = true,
            'd' => flags.unix_lines = true,
            _ => return None,
        }
    }
    Some(flags)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "panicking on bad test input is fine")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_one(source: &str) -> (NodeArena, NodeId) {
        let unit = match parse(source) {
            Ok(unit) => unit,
            Err(e) => panic!("parse failed: {e}"),
        };
        let NodeKind::Block(stmts) = unit.arena.kind(unit.root) else {
            panic!("root is not a block");
        };
        assert_eq!(stmts.len(), 1, "expected one statement");
        let first = stmts[0];
        (unit.arena, first)
    }

    #[test]
    fn precedence_power_over_multiply() {
        let (arena, root) = parse_one("2 * 3 ** 4");
        let NodeKind::Binary { op, rhs, .. } = arena.kind(root) else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Multiply);
        assert!(matches!(
            arena.kind(*rhs),
            NodeKind::Binary {
                op: BinaryOp::Power,
                ..
            }
        ));
    }

    #[test]
    fn negate_binds_below_power() {
        let (arena, root) = parse_one("-2 ** 2");
        assert!(matches!(
            arena.kind(root),
            NodeKind::Unary {
                op: UnaryOp::Negate,
                ..
            }
        ));
    }

    #[test]
    fn postfix_factorial() {
        let (arena, root) = parse_one("5!");
        assert!(matches!(
            arena.kind(root),
            NodeKind::Unary {
                op: UnaryOp::Factorial,
                ..
            }
        ));
    }

    #[test]
    fn assignment_and_compound() {
        let (arena, root) = parse_one("x += 2");
        let NodeKind::Assign { op, .. } = arena.kind(root) else {
            panic!("expected assignment");
        };
        assert_eq!(*op, Some(BinaryOp::Add));
    }

    #[test]
    fn rejects_bad_assignment_target() {
        assert!(parse("1 + 2 = 3").is_err());
    }

    #[test]
    fn prefix_increment_desugars_to_compound_add() {
        let (arena, root) = parse_one("++count");
        let NodeKind::Assign { target, op, expr } = arena.kind(root) else {
            panic!("expected assignment");
        };
        assert_eq!(*op, Some(BinaryOp::Add));
        assert!(matches!(arena.kind(*target), NodeKind::Ident(name) if name == "count"));
        assert!(matches!(arena.kind(*expr), NodeKind::Integer(n) if *n == 1.into()));
    }

    #[test]
    fn prefix_decrement_requires_a_storable_target() {
        assert!(parse("--(1 + 2)").is_err());
    }

    #[test]
    fn loop_with_var_and_within() {
        let (arena, root) = parse_one("loop i within 5 { i }");
        let NodeKind::Loop {
            var, within, spec, ..
        } = arena.kind(root)
        else {
            panic!("expected loop");
        };
        assert_eq!(var.as_deref(), Some("i"));
        assert!(within);
        assert!(matches!(spec, RangeSpec::Exprs(v) if v.len() == 1));
    }

    #[test]
    fn loop_with_dot_range_and_step() {
        let (arena, root) = parse_one("loop i in 1..10, 2 { i }");
        let NodeKind::Loop { spec, .. } = arena.kind(root) else {
            panic!("expected loop");
        };
        assert!(matches!(
            spec,
            RangeSpec::Dots {
                start: Some(_),
                step: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn labeled_loop() {
        let (arena, root) = parse_one("outer: loop 3 { leave outer }");
        let NodeKind::Loop { label, .. } = arena.kind(root) else {
            panic!("expected loop");
        };
        assert_eq!(label.as_deref(), Some("outer"));
    }

    #[test]
    fn leave_with_label_and_value() {
        let (arena, root) = parse_one("loop 3 { leave done 42 }");
        let NodeKind::Loop { body, .. } = arena.kind(root) else {
            panic!("expected loop");
        };
        let NodeKind::Block(stmts) = arena.kind(*body) else {
            panic!("expected block");
        };
        let NodeKind::Leave { label, value } = arena.kind(stmts[0]) else {
            panic!("expected leave");
        };
        assert_eq!(label.as_deref(), Some("done"));
        assert!(value.is_some());
    }

    #[test]
    fn leave_with_expression_value_only() {
        let (arena, root) = parse_one("loop 3 { leave 1 + 2 }");
        let NodeKind::Loop { body, .. } = arena.kind(root) else {
            panic!("expected loop");
        };
        let NodeKind::Block(stmts) = arena.kind(*body) else {
            panic!("expected block");
        };
        let NodeKind::Leave { label, value } = arena.kind(stmts[0]) else {
            panic!("expected leave");
        };
        assert!(label.is_none());
        assert!(value.is_some());
    }

    #[test]
    fn case_selectors() {
        let (arena, root) = parse_one(
            "case x of { 1, 2: 'small'\n 3..10: 'mid'\n matches 'a.*' i: 'regex'\n < 0 && > -10: 'neg'\n default: 'other' }",
        );
        let NodeKind::Case { blocks, .. } = arena.kind(root) else {
            panic!("expected case");
        };
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[0].selectors.len(), 2);
        assert!(matches!(blocks[1].selectors[0], CaseSelector::Range { .. }));
        assert!(matches!(
            blocks[2].selectors[0],
            CaseSelector::Regex {
                flags: RegexFlags {
                    case_insensitive: true,
                    ..
                },
                ..
            }
        ));
        assert!(matches!(
            blocks[3].selectors[0],
            CaseSelector::Compare {
                second: Some((Connective::And, CompareOp::Greater, _)),
                ..
            }
        ));
        assert!(matches!(blocks[4].selectors[0], CaseSelector::Default));
    }

    #[test]
    fn define_with_defaults_and_rest() {
        let (arena, root) = parse_one("define f(a, b = 2, ...rest) = a + b");
        let NodeKind::Define { name, params, .. } = arena.kind(root) else {
            panic!("expected define");
        };
        assert_eq!(name, "f");
        assert_eq!(params.len(), 3);
        assert!(params[1].default.is_some());
        assert!(params[2].rest);
    }

    #[test]
    fn empty_braces_are_typeless() {
        let (arena, root) = parse_one("{}");
        assert!(matches!(arena.kind(root), NodeKind::EmptyCollection));
    }

    #[test]
    fn object_and_set_literals() {
        let (arena, root) = parse_one("{ a: 1, 'b c': 2 }");
        assert!(matches!(arena.kind(root), NodeKind::ObjectLit(p) if p.len() == 2));
        let (arena, root) = parse_one("{ 1, 2, 3 }");
        assert!(matches!(arena.kind(root), NodeKind::SetLit(e) if e.len() == 3));
    }

    #[test]
    fn membership_range() {
        let (arena, root) = parse_one("x in 1..10");
        let NodeKind::Binary { op, rhs, .. } = arena.kind(root) else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::In);
        assert!(matches!(arena.kind(*rhs), NodeKind::Range(_)));
    }

    #[test]
    fn reduction_forms() {
        let (arena, root) = parse_one("sumof 1..10");
        assert!(matches!(
            arena.kind(root),
            NodeKind::Reduction {
                op: ReductionOp::SumOf,
                spec: RangeSpec::Dots { .. },
            }
        ));
        let (arena, root) = parse_one("productof (1..5, 2)");
        assert!(matches!(
            arena.kind(root),
            NodeKind::Reduction {
                op: ReductionOp::ProductOf,
                spec: RangeSpec::Dots { step: Some(_), .. },
            }
        ));
    }

    #[test]
    fn mode_directive_with_block() {
        let (arena, root) = parse_one(":rational on { 1/3 }");
        let NodeKind::Directive(Directive::Mode {
            setting, block, ..
        }) = arena.kind(root)
        else {
            panic!("expected directive");
        };
        assert_eq!(*setting, ModeSetting::Rational);
        assert!(block.is_some());
    }

    #[test]
    fn bare_mode_directive_defaults_on() {
        let (arena, root) = parse_one(":timing");
        let NodeKind::Directive(Directive::Mode { value, .. }) = arena.kind(root) else {
            panic!("expected directive");
        };
        let ModeValue::Expr(id) = value else {
            panic!("expected expression value");
        };
        assert!(matches!(arena.kind(*id), NodeKind::Bool(true)));
    }

    #[test]
    fn pop_and_initial_mode_values() {
        let (arena, root) = parse_one(":precision pop");
        assert!(matches!(
            arena.kind(root),
            NodeKind::Directive(Directive::Precision {
                value: ModeValue::Pop,
                ..
            })
        ));
        let (arena, root) = parse_one(":quiet initial");
        assert!(matches!(
            arena.kind(root),
            NodeKind::Directive(Directive::Mode {
                value: ModeValue::Initial,
                ..
            })
        ));
    }

    #[test]
    fn unquoted_file_argument() {
        let (arena, root) = parse_one(":open results.tally");
        assert!(matches!(
            arena.kind(root),
            NodeKind::Directive(Directive::Open(p)) if p == "results.tally"
        ));
    }

    #[test]
    fn newlines_inside_parens_are_trivia() {
        let (arena, root) = parse_one("(1 +\n 2)");
        assert!(matches!(
            arena.kind(root),
            NodeKind::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn if_else_chain() {
        let (arena, root) = parse_one("if a { 1 } else if b { 2 } else { 3 }");
        let NodeKind::If { else_block, .. } = arena.kind(root) else {
            panic!("expected if");
        };
        let inner = else_block.unwrap();
        assert!(matches!(arena.kind(inner), NodeKind::If { .. }));
    }

    #[test]
    fn multiple_statements_per_line_with_semicolons() {
        let unit = parse("a = 1; b = 2; a + b").unwrap();
        let NodeKind::Block(stmts) = unit.arena.kind(unit.root) else {
            panic!("root is not a block");
        };
        assert_eq!(stmts.len(), 3);
    }

}
