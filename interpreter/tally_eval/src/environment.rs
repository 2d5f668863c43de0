//! Lexical scope stack.
//!
//! Scopes form a stack rather than a tree: function calls push a
//! function scope, block constructs push their own kind, and lookup
//! walks outward from the innermost scope. Assignment to a name not
//! yet defined anywhere creates it in the current scope.

use rustc_hash::FxHashMap;

use crate::value::{Binding, BindingKind, Value};

/// What construct opened a scope. Function scopes stop the outward
/// walk for `leave` label resolution but not for name lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Loop,
    While,
    If,
    Case,
    Block,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    names: FxHashMap<String, Binding>,
    /// Insertion order, for listing globals in a stable order.
    order: Vec<String>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Scope {
            kind,
            names: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    fn resolve_key(&self, name: &str, ignore_case: bool) -> Option<String> {
        if self.names.contains_key(name) {
            return Some(name.to_owned());
        }
        if ignore_case {
            // Identifiers are ASCII, so fold the same way object keys
            // and loop labels do.
            for key in &self.order {
                if key.eq_ignore_ascii_case(name) {
                    return Some(key.clone());
                }
            }
        }
        None
    }

    pub fn get(&self, name: &str, ignore_case: bool) -> Option<&Binding> {
        let key = self.resolve_key(name, ignore_case)?;
        self.names.get(&key)
    }

    pub fn set(&mut self, name: &str, binding: Binding, ignore_case: bool) {
        if let Some(key) = self.resolve_key(name, ignore_case) {
            self.names.insert(key, binding);
        } else {
            self.order.push(name.to_owned());
            self.names.insert(name.to_owned(), binding);
        }
    }

    pub fn remove(&mut self, name: &str, ignore_case: bool) -> bool {
        if let Some(key) = self.resolve_key(name, ignore_case) {
            self.names.remove(&key);
            self.order.retain(|k| *k != key);
            true
        } else {
            false
        }
    }

    /// Drop every non-protected binding. Used by `:clear` and when a
    /// loop scope resets between iterations.
    pub fn clear_plain(&mut self) {
        let names = &mut self.names;
        self.order.retain(|key| {
            let keep = names.get(key).is_some_and(|b| b.kind.is_protected());
            if !keep {
                names.remove(key);
            }
            keep
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.order.iter().filter_map(|k| Some((k, self.names.get(k)?)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// The full scope stack. The global scope at index 0 is never popped.
#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            scopes: vec![Scope::new(ScopeKind::Global)],
        }
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    pub fn pop(&mut self) {
        // Global scope stays.
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Pop scopes until the stack is `depth` deep again. Restores the
    /// stack after an error unwinds past intervening scopes.
    pub fn truncate(&mut self, depth: usize) {
        while self.scopes.len() > depth.max(1) {
            self.scopes.pop();
        }
    }

    pub fn current_mut(&mut self) -> &mut Scope {
        // Invariant: scopes is never empty.
        #[expect(clippy::unwrap_used, reason = "the global scope is never popped")]
        self.scopes.last_mut().unwrap()
    }

    pub fn current(&self) -> &Scope {
        #[expect(clippy::unwrap_used, reason = "the global scope is never popped")]
        self.scopes.last().unwrap()
    }

    pub fn global_mut(&mut self) -> &mut Scope {
        &mut self.scopes[0]
    }

    pub fn global(&self) -> &Scope {
        &self.scopes[0]
    }

    /// Walk outward from the innermost scope.
    pub fn lookup(&self, name: &str, ignore_case: bool) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get(name, ignore_case))
    }

    pub fn is_defined(&self, name: &str, ignore_case: bool) -> bool {
        self.lookup(name, ignore_case).is_some()
    }

    /// Assign to the nearest scope that already holds the name, or
    /// create it in the current scope.
    pub fn assign(&mut self, name: &str, value: Value, ignore_case: bool) -> Result<(), String> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(key) = scope.resolve_key(name, ignore_case) {
                let binding = scope
                    .names
                    .get_mut(&key)
                    .ok_or_else(|| format!("binding for `{key}` vanished"))?;
                if binding.kind.is_protected() || binding.kind == BindingKind::Constant {
                    return Err(format!("`{key}` is not assignable"));
                }
                binding.value = value;
                return Ok(());
            }
        }
        self.current_mut().set(name, Binding::normal(value), ignore_case);
        Ok(())
    }

    /// Define in the current scope regardless of outer bindings.
    pub fn define_local(&mut self, name: &str, binding: Binding, ignore_case: bool) {
        self.current_mut().set(name, binding, ignore_case);
    }

    /// Define at global scope (predefined values, `define` bodies).
    pub fn define_global(&mut self, name: &str, binding: Binding, ignore_case: bool) {
        self.global_mut().set(name, binding, ignore_case);
    }

    /// Assign at global scope. Unlike [`define_global`](Self::define_global)
    /// this refuses protected and constant bindings, matching `assign`.
    pub fn assign_global(&mut self, name: &str, value: Value, ignore_case: bool) -> Result<(), String> {
        let scope = self.global_mut();
        if let Some(key) = scope.resolve_key(name, ignore_case) {
            let binding = scope
                .names
                .get_mut(&key)
                .ok_or_else(|| format!("binding for `{key}` vanished"))?;
            if binding.kind.is_protected() || binding.kind == BindingKind::Constant {
                return Err(format!("`{key}` is not assignable"));
            }
            binding.value = value;
            return Ok(());
        }
        scope.set(name, Binding::normal(value), ignore_case);
        Ok(())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "panicking on bad test input is fine")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn assignment_updates_the_defining_scope() {
        let mut env = Environment::new();
        env.assign("x", Value::integer(1), false).unwrap();
        env.push(ScopeKind::If);
        env.assign("x", Value::integer(2), false).unwrap();
        env.pop();
        assert!(matches!(
            env.lookup("x", false).map(|b| &b.value),
            Some(Value::Integer(n)) if *n == 2.into()
        ));
    }

    #[test]
    fn inner_definitions_vanish_with_their_scope() {
        let mut env = Environment::new();
        env.push(ScopeKind::Loop);
        env.assign("tmp", Value::integer(1), false).unwrap();
        assert!(env.is_defined("tmp", false));
        env.pop();
        assert!(!env.is_defined("tmp", false));
    }

    #[test]
    fn protected_bindings_refuse_assignment() {
        let mut env = Environment::new();
        env.define_global(
            "limit",
            Binding::of_kind(Value::integer(10), BindingKind::Constant),
            false,
        );
        assert!(env.assign("limit", Value::integer(11), false).is_err());
    }

    #[test]
    fn global_assignment_refuses_protected_bindings() {
        let mut env = Environment::new();
        env.define_global(
            "limit",
            Binding::of_kind(Value::integer(10), BindingKind::Constant),
            false,
        );
        assert!(env.assign_global("limit", Value::integer(11), false).is_err());
        // Fresh names still get created.
        env.assign_global("count", Value::integer(1), false).unwrap();
        assert!(env.global().get("count", false).is_some());
    }

    #[test]
    fn case_folding_is_ascii_only() {
        let mut env = Environment::new();
        env.assign("strasse", Value::integer(1), false).unwrap();
        assert!(env.lookup("STRASSE", true).is_some());
        // Unicode-only case pairs do not unify, matching object keys.
        env.assign("függvény", Value::integer(2), false).unwrap();
        assert!(env.lookup("FÜGGVÉNY", true).is_none());
    }

    #[test]
    fn case_insensitive_lookup_finds_the_original_key() {
        let mut env = Environment::new();
        env.assign("Total", Value::integer(5), false).unwrap();
        assert!(env.lookup("total", true).is_some());
        assert!(env.lookup("total", false).is_none());
        // Assignment through the folded name updates the original.
        env.assign("TOTAL", Value::integer(6), true).unwrap();
        assert_eq!(env.global().len(), 1);
    }

    #[test]
    fn clear_keeps_protected_bindings() {
        let mut env = Environment::new();
        env.define_global(
            "pi_digits",
            Binding::of_kind(Value::integer(3), BindingKind::Predefined),
            false,
        );
        env.assign("scratch", Value::integer(1), false).unwrap();
        env.global_mut().clear_plain();
        assert!(env.is_defined("pi_digits", false));
        assert!(!env.is_defined("scratch", false));
    }
}
