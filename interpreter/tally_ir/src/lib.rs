//! Tally IR - parse-tree types for the Tally interpreter.
//!
//! The parser (`tally_parse`) produces one [`NodeArena`] per unit of
//! input; the evaluator (`tally_eval`) walks it by [`NodeId`]. Nodes
//! carry a [`Span`] for line-annotated error reporting.

mod arena;
mod ast;
mod span;

pub use arena::{Node, NodeArena, NodeId};
pub use ast::{
    BinaryOp, CaseBlock, CaseSelector, CompareOp, Connective, Directive, ModeSetting, ModeValue,
    NodeKind, Param, RangeSpec, ReductionOp, RegexFlags, TrigUnits, UnaryOp,
};
pub use span::Span;
