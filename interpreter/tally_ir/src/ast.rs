//! Parse-tree node kinds.
//!
//! One variant per grammar production the evaluator dispatches on. The
//! parser is the only producer; the evaluator is the only consumer.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::NodeId;

/// Binary operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntDivide,
    Modulus,
    Power,
    // Boolean connectives (`&&`/`||` short-circuit; `^^` never does)
    And,
    Or,
    BoolXor,
    // Bitwise on integers, set algebra on sets, logic family on booleans
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    // Comparisons
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Spaceship,
    // Membership via the range protocol
    In,
}

impl BinaryOp {
    /// Source-text symbol, for error messages.
    pub fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::IntDivide => "\\",
            BinaryOp::Modulus => "%",
            BinaryOp::Power => "**",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BoolXor => "^^",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::StrictEqual => "===",
            BinaryOp::StrictNotEqual => "!==",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Spaceship => "<=>",
            BinaryOp::In => "in",
        }
    }
}

/// Unary operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
    BitNot,
    /// Postfix `!`.
    Factorial,
}

impl UnaryOp {
    /// Source-text symbol, for error messages.
    pub fn as_symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Factorial => "!",
        }
    }
}

/// Comparison operators usable in `case` selectors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// Boolean connective joining two chained `case` compare selectors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
    Xor,
}

/// Reduction operators driven by the range protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReductionOp {
    SumOf,
    ProductOf,
    ArrayOf,
    LengthOf,
}

/// The range or list being traversed by `loop`, `in`, a `case` range
/// selector, or a reduction operator.
#[derive(Clone, Debug, PartialEq)]
pub enum RangeSpec {
    /// Comma-separated expression list. A single entry can also denote a
    /// collection/string to enumerate or an implied `1..n` / `0..n-1`.
    Exprs(Vec<NodeId>),
    /// `[start ..] stop [, step]`.
    Dots {
        start: Option<NodeId>,
        stop: NodeId,
        step: Option<NodeId>,
    },
}

/// Formal function parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    /// Default-value expression, evaluated lazily for omitted arguments.
    pub default: Option<NodeId>,
    /// Trailing rest parameter collecting extra arguments as an array.
    pub rest: bool,
}

/// Regex selector flags for `case`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RegexFlags {
    pub case_insensitive: bool,
    pub dot_all: bool,
    pub literal: bool,
    pub multiline: bool,
    pub unicode_case: bool,
    pub unix_lines: bool,
}

/// One selector in a `case` block.
#[derive(Clone, Debug, PartialEq)]
pub enum CaseSelector {
    Default,
    /// Dot-range membership test.
    Range {
        start: Option<NodeId>,
        stop: NodeId,
        step: Option<NodeId>,
    },
    /// Regex match against the case value rendered as text.
    Regex { pattern: String, flags: RegexFlags },
    /// One or two chained compare tests.
    Compare {
        first: (CompareOp, NodeId),
        second: Option<(Connective, CompareOp, NodeId)>,
    },
    /// Plain value equality.
    Value(NodeId),
}

/// One block of a `case` statement: its selectors and body.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseBlock {
    pub selectors: Vec<CaseSelector>,
    pub body: NodeId,
}

/// Togglable evaluation mode named by a directive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModeSetting {
    Timing,
    Debug,
    Rational,
    Separators,
    IgnoreCase,
    QuoteStrings,
    SortKeys,
    Colors,
    ResultsOnly,
    Quiet,
    SilenceDirectives,
}

impl ModeSetting {
    /// Directive name as written in source.
    pub fn name(self) -> &'static str {
        match self {
            ModeSetting::Timing => "timing",
            ModeSetting::Debug => "debug",
            ModeSetting::Rational => "rational",
            ModeSetting::Separators => "separators",
            ModeSetting::IgnoreCase => "ignorecase",
            ModeSetting::QuoteStrings => "quotestrings",
            ModeSetting::SortKeys => "sortkeys",
            ModeSetting::Colors => "colors",
            ModeSetting::ResultsOnly => "resultsonly",
            ModeSetting::Quiet => "quiet",
            ModeSetting::SilenceDirectives => "silencedirectives",
        }
    }

    /// All settings, in directive order.
    pub const ALL: [ModeSetting; 11] = [
        ModeSetting::Timing,
        ModeSetting::Debug,
        ModeSetting::Rational,
        ModeSetting::Separators,
        ModeSetting::IgnoreCase,
        ModeSetting::QuoteStrings,
        ModeSetting::SortKeys,
        ModeSetting::Colors,
        ModeSetting::ResultsOnly,
        ModeSetting::Quiet,
        ModeSetting::SilenceDirectives,
    ];
}

/// Value supplied to a mode or precision directive.
#[derive(Clone, Debug, PartialEq)]
pub enum ModeValue {
    /// Expression evaluated to a truthy value (or digits for precision).
    Expr(NodeId),
    /// Pop the previous value from the setting's stack.
    Pop,
    /// Reset to the session's initial value.
    Initial,
}

/// Trig angle units.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrigUnits {
    Degrees,
    Radians,
    Grads,
}

/// Directive statements.
#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    /// `:mode value [ { block } ]`.
    Mode {
        setting: ModeSetting,
        value: ModeValue,
        block: Option<NodeId>,
    },
    /// `:precision n [ { block } ]`.
    Precision {
        value: ModeValue,
        block: Option<NodeId>,
    },
    /// `:degrees` / `:radians` / `:grads`.
    TrigUnits(TrigUnits),
    /// `:clear [names]`: empty list clears all non-predefined bindings.
    Clear(Vec<String>),
    /// `:save path`.
    Save(String),
    /// `:open path`: re-feed a saved variables file.
    Open(String),
    /// `:assert cond [, message]`.
    Assert {
        cond: NodeId,
        message: Option<NodeId>,
    },
    /// `:require version`.
    Require(String),
    /// `:echo [expr]`.
    Echo(Option<NodeId>),
    /// `:quit`.
    Quit,
}

/// Parse-tree node kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    // Literals
    Null,
    Bool(bool),
    Integer(BigInt),
    Decimal(BigDecimal),
    /// Imaginary literal such as `3i`.
    Imaginary(BigDecimal),
    Str(String),
    /// Double-quoted string re-scanned for `$name` / `${expr}` at eval.
    InterpStr(String),
    ArrayLit(Vec<NodeId>),
    ObjectLit(Vec<(String, NodeId)>),
    SetLit(Vec<NodeId>),
    /// `{}`: adopts the type of whatever it is combined with.
    EmptyCollection,

    // References
    Ident(String),
    /// `$$name`: resolved in the Global scope only.
    GlobalIdent(String),
    /// `$n` positional argument.
    Positional(u32),
    Member {
        target: NodeId,
        name: String,
    },
    Index {
        target: NodeId,
        index: NodeId,
    },
    Call {
        callee: NodeId,
        args: Vec<NodeId>,
    },

    // Operators
    Unary {
        op: UnaryOp,
        expr: NodeId,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Ternary {
        cond: NodeId,
        then_expr: NodeId,
        else_expr: NodeId,
    },
    Reduction {
        op: ReductionOp,
        spec: RangeSpec,
    },
    /// Bare dot range, as the right side of `in`.
    Range(RangeSpec),

    // Statements
    Block(Vec<NodeId>),
    If {
        cond: NodeId,
        then_block: NodeId,
        else_block: Option<NodeId>,
    },
    While {
        label: Option<String>,
        cond: NodeId,
        body: NodeId,
    },
    Loop {
        label: Option<String>,
        var: Option<String>,
        spec: RangeSpec,
        within: bool,
        body: NodeId,
    },
    Case {
        value: NodeId,
        blocks: Vec<CaseBlock>,
    },
    Define {
        name: String,
        params: Vec<Param>,
        body: NodeId,
    },
    ConstDecl {
        name: String,
        expr: NodeId,
    },
    VarDecl {
        name: String,
        expr: NodeId,
    },
    EnumDecl(Vec<String>),
    Assign {
        target: NodeId,
        op: Option<BinaryOp>,
        expr: NodeId,
    },
    Leave {
        label: Option<String>,
        value: Option<NodeId>,
    },
    Next,
    TimeThis {
        body: NodeId,
    },
    Directive(Directive),
}
