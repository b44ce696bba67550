//! Lexical scopes.
//!
//! The constraint generator lowers the module into a tree of scopes; the
//! solver consults it for two things: resolving type alias names (plain and
//! import-qualified) and deciding whether a free type belongs to the subtree
//! being generalized.

use crate::interner::Atom;
use crate::solver::types::TypeAlias;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// A handle to a scope in the `ScopeArena`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeId(pub u32);

/// One lexical scope: a parent link plus the alias tables visible here.
#[derive(Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    /// Type aliases declared directly in this scope.
    pub type_aliases: FxHashMap<Atom, TypeAlias>,
    /// Aliases reachable through an import prefix (`Dep.Shape`).
    pub imported_type_aliases: FxHashMap<Atom, FxHashMap<Atom, TypeAlias>>,
}

/// Flat storage for the scope tree. Scopes are never removed.
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        ScopeArena { scopes: Vec::new() }
    }

    /// Allocate a root scope (no parent).
    pub fn alloc_root(&mut self) -> ScopeId {
        self.alloc(None)
    }

    /// Allocate a child of `parent`.
    pub fn alloc_child(&mut self, parent: ScopeId) -> ScopeId {
        self.alloc(Some(parent))
    }

    fn alloc(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            ..Scope::default()
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    /// Resolve a type alias name, walking outward through parent scopes.
    pub fn lookup_alias(&self, scope: ScopeId, name: Atom) -> Option<&TypeAlias> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.get(id);
            if let Some(alias) = s.type_aliases.get(&name) {
                return Some(alias);
            }
            current = s.parent;
        }
        None
    }

    /// Resolve an import-qualified alias (`prefix.name`), walking outward.
    pub fn lookup_imported_alias(&self, scope: ScopeId, prefix: Atom, name: Atom) -> Option<&TypeAlias> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.get(id);
            if let Some(ns) = s.imported_type_aliases.get(&prefix) {
                if let Some(alias) = ns.get(&name) {
                    return Some(alias);
                }
            }
            current = s.parent;
        }
        None
    }

    /// True when `scope` is `ancestor` or one of its descendants.
    ///
    /// Used by generalization: a free type is quantifiable exactly when its
    /// scope sits at or below the constraint's scope.
    pub fn is_subscope_of(&self, ancestor: ScopeId, scope: ScopeId) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(id).parent;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}
