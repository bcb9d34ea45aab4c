//! Scope stack — name resolution for the ordinary and tag namespaces.
//!
//! A scope maps identifiers to bindings. Shadowing across nested scopes is
//! legal; redeclaration within one scope is not. `struct X` tags live in a
//! namespace of their own, so `struct s s;` is fine.

use std::collections::HashMap;

use ecc_ast::{FuncId, LocalId, TypeId};

/// What an ordinary identifier resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Local(LocalId),
    Func(FuncId),
}

/// A stack of scopes. The bottom scope is the translation unit.
#[derive(Debug)]
pub struct Scopes {
    ordinary: Vec<HashMap<String, Binding>>,
    tags: Vec<HashMap<String, TypeId>>,
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            ordinary: vec![HashMap::new()],
            tags: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.ordinary.push(HashMap::new());
        self.tags.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.ordinary.pop();
        self.tags.pop();
        debug_assert!(!self.ordinary.is_empty(), "popped the file scope");
    }

    pub fn depth(&self) -> usize {
        self.ordinary.len()
    }

    /// Declare in the innermost scope. Returns the existing binding if the
    /// name is already declared there.
    pub fn declare(&mut self, name: &str, binding: Binding) -> Result<(), Binding> {
        let scope = self.ordinary.last_mut().unwrap();
        if let Some(&existing) = scope.get(name) {
            return Err(existing);
        }
        scope.insert(name.to_string(), binding);
        Ok(())
    }

    /// Resolve a name, innermost scope first.
    pub fn resolve(&self, name: &str) -> Option<Binding> {
        self.ordinary
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    pub fn declare_tag(&mut self, tag: &str, ty: TypeId) -> Result<(), TypeId> {
        let scope = self.tags.last_mut().unwrap();
        if let Some(&existing) = scope.get(tag) {
            return Err(existing);
        }
        scope.insert(tag.to_string(), ty);
        Ok(())
    }

    pub fn resolve_tag(&self, tag: &str) -> Option<TypeId> {
        self.tags
            .iter()
            .rev()
            .find_map(|scope| scope.get(tag).copied())
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}
