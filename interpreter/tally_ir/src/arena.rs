//! Flat arena storage for parse-tree nodes.
//!
//! Nodes are appended during parsing and addressed by `NodeId`, a `u32`
//! index. The evaluator never mutates the tree; one arena per parsed unit
//! of input.

use crate::{NodeKind, Span};

/// Index of a node within its owning [`NodeArena`].
///
/// A `NodeId` is only meaningful together with the arena that produced it.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a node id from a raw index.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        NodeId(raw)
    }

    /// The raw index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// One parse-tree node: a kind tag plus its source span.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

/// Arena owning all nodes of one parsed unit of input.
#[derive(Default, Debug, PartialEq)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        NodeArena { nodes: Vec::new() }
    }

    /// Append a node, returning its id.
    #[inline]
    pub fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = u32::try_from(self.nodes.len()).unwrap_or(u32::MAX);
        self.nodes.push(Node { kind, span });
        NodeId(id)
    }

    /// Fetch a node by id.
    ///
    /// # Panics
    /// Panics if `id` did not come from this arena.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    /// The kind of a node.
    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0 as usize].kind
    }

    /// The span of a node.
    #[inline]
    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.0 as usize].span
    }

    /// Number of nodes allocated.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no nodes have been allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_fetch() {
        let mut arena = NodeArena::new();
        let id = arena.alloc(NodeKind::Null, Span::new(0, 4));
        assert!(matches!(arena.kind(id), NodeKind::Null));
        assert_eq!(arena.span(id), Span::new(0, 4));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn ids_are_sequential() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(NodeKind::Null, Span::DUMMY);
        let b = arena.alloc(NodeKind::Bool(true), Span::DUMMY);
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
    }
}
