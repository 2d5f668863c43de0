//! The runtime value model.
//!
//! One closed enum; every conversion and operator is an exhaustive
//! match over it. Scalars are immutable once produced. Collections are
//! reference-like: index and member assignment mutate in place, while
//! operators that produce a collection always allocate a fresh one.

use std::cell::RefCell;
use std::rc::Rc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_rational::BigRational;
use tally_ir::{NodeArena, NodeId, Param, Span};
use tally_num::{Complex, ContinuedFraction, Quaternion};

/// A runtime value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(BigInt),
    Decimal(BigDecimal),
    /// Always reduced, canonical sign on the numerator.
    Fraction(BigRational),
    Complex(Complex),
    Quaternion(Quaternion),
    ContinuedFraction(ContinuedFraction),
    Str(String),
    Array(ArrayRef),
    Object(ObjectRef),
    Set(SetRef),
    Function(Rc<FunctionDecl>),
}

/// Shared handle to a mutable array.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Shared handle to a mutable object.
pub type ObjectRef = Rc<RefCell<ObjectMap>>;

/// Shared handle to a mutable set.
pub type SetRef = Rc<RefCell<Vec<Value>>>;

/// A user-defined function. The body lives in the arena of the input
/// unit that defined it, which the declaration keeps alive.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub body: NodeId,
    pub arena: Rc<NodeArena>,
    /// Source of the unit that declared the function, for `:save`.
    pub source: Rc<str>,
    /// Span of the whole `define` statement within `source`.
    pub decl_span: Span,
}

impl FunctionDecl {
    /// `name(a, b, ...)` for introspection and rendering.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                if p.rest {
                    format!("...{}", p.name)
                } else {
                    p.name.clone()
                }
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }

    /// The `define` statement as written, for persisting variables.
    pub fn declaration_text(&self) -> &str {
        let start = self.decl_span.start as usize;
        let end = (self.decl_span.end as usize).min(self.source.len());
        self.source.get(start..end).unwrap_or("")
    }
}

/// Insertion-ordered string-keyed map with optional case-insensitive
/// lookup. Linear scan; objects are small and order is load-bearing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectMap {
    entries: Vec<(String, Value)>,
}

impl ObjectMap {
    pub fn new() -> Self {
        ObjectMap::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str, ignore_case: bool) -> Option<usize> {
        self.entries.iter().position(|(k, _)| {
            if ignore_case {
                k.eq_ignore_ascii_case(key)
            } else {
                k == key
            }
        })
    }

    pub fn get(&self, key: &str, ignore_case: bool) -> Option<&Value> {
        self.position(key, ignore_case).map(|i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str, ignore_case: bool) -> bool {
        self.position(key, ignore_case).is_some()
    }

    /// Insert or overwrite, preserving the original position on
    /// overwrite.
    pub fn insert(&mut self, key: String, value: Value, ignore_case: bool) {
        match self.position(&key, ignore_case) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str, ignore_case: bool) -> Option<Value> {
        self.position(key, ignore_case)
            .map(|i| self.entries.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Sort entries by key. Applied at construction when the sort-keys
    /// setting is on; never maintained afterwards.
    pub fn sort_by_key_name(&mut self) {
        self.entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    }
}

impl Value {
    pub fn array(values: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn object(map: ObjectMap) -> Value {
        Value::Object(Rc::new(RefCell::new(map)))
    }

    pub fn set(values: Vec<Value>) -> Value {
        Value::Set(Rc::new(RefCell::new(values)))
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    pub fn integer(n: impl Into<BigInt>) -> Value {
        Value::Integer(n.into())
    }

    /// Type name used by `typeof` and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Fraction(_) => "fraction",
            Value::Complex(_) => "complex",
            Value::Quaternion(_) => "quaternion",
            Value::ContinuedFraction(_) => "continued fraction",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Set(_) => "set",
            Value::Function(_) => "function",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_) | Value::Set(_))
    }

    /// Numeric promotion priority; higher wins. Non-numeric kinds have
    /// none.
    pub fn numeric_priority(&self) -> Option<u8> {
        match self {
            Value::Boolean(_) => Some(1),
            Value::Integer(_) => Some(2),
            Value::Decimal(_) => Some(3),
            Value::Fraction(_) => Some(4),
            Value::ContinuedFraction(_) => Some(5),
            Value::Complex(_) => Some(6),
            Value::Quaternion(_) => Some(7),
            _ => None,
        }
    }
}

/// Metadata attached to a stored value in a scope; transparent to
/// reads, visible to assignment, `:clear`, and enumeration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BindingKind {
    Normal,
    Constant,
    EnumMember,
    Parameter,
    Predefined,
    /// Recomputed on every read (`pi`, `e`, `phi`, `today`, `now`).
    SystemBacked(SystemVar),
}

impl BindingKind {
    /// Predefined and system bindings reject reassignment and are
    /// excluded from `:clear` and listing.
    pub fn is_protected(self) -> bool {
        matches!(self, BindingKind::Predefined | BindingKind::SystemBacked(_))
    }
}

/// System-backed names resolved at read time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SystemVar {
    Pi,
    E,
    Phi,
    Today,
    Now,
}

/// One scope entry.
#[derive(Clone, Debug)]
pub struct Binding {
    pub value: Value,
    pub kind: BindingKind,
}

impl Binding {
    pub fn normal(value: Value) -> Self {
        Binding {
            value,
            kind: BindingKind::Normal,
        }
    }

    pub fn of_kind(value: Value, kind: BindingKind) -> Self {
        Binding { value, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn object_map_preserves_insertion_order() {
        let mut map = ObjectMap::new();
        map.insert("b".into(), Value::integer(1), false);
        map.insert("a".into(), Value::integer(2), false);
        map.insert("b".into(), Value::integer(3), false);
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert!(matches!(map.get("b", false), Some(Value::Integer(n)) if *n == 3.into()));
    }

    #[test]
    fn object_map_ignore_case_lookup() {
        let mut map = ObjectMap::new();
        map.insert("Total".into(), Value::integer(10), false);
        assert!(map.get("total", true).is_some());
        assert!(map.get("total", false).is_none());
    }

    #[test]
    fn collections_share_mutation() {
        let array = Value::array(vec![Value::integer(1)]);
        let alias = array.clone();
        if let Value::Array(cells) = &array {
            cells.borrow_mut().push(Value::integer(2));
        }
        if let Value::Array(cells) = &alias {
            assert_eq!(cells.borrow().len(), 2);
        }
    }
}
