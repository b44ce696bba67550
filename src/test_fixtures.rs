//! Shared fixtures for solver tests.
//!
//! Tests assemble an arena, a scope tree and a constraint list by hand,
//! then run the solver against a stub module resolver.

use crate::diagnostics::SolverLimits;
use crate::interner::Interner;
use crate::module_resolver::{ModuleResolver, ResolvedModule};
use crate::scope::{ScopeArena, ScopeId};
use crate::solver::arena::TypeArena;
use crate::solver::constraint::{Constraint, ConstraintKind};
use crate::solver::solve::ConstraintSolver;
use crate::span::Span;
use rustc_hash::FxHashMap;

/// A resolver that knows no modules at all.
pub(crate) struct NullResolver;

impl ModuleResolver for NullResolver {
    fn get_module(&self, _name: &str) -> Option<ResolvedModule> {
        None
    }

    fn module_exists(&self, _name: &str) -> bool {
        false
    }

    fn human_readable_name(&self, name: &str) -> String {
        name.to_string()
    }
}

/// A resolver backed by a map of pre-checked modules.
#[derive(Default)]
pub(crate) struct MapResolver {
    pub modules: FxHashMap<String, ResolvedModule>,
}

impl ModuleResolver for MapResolver {
    fn get_module(&self, name: &str) -> Option<ResolvedModule> {
        self.modules.get(name).cloned()
    }

    fn module_exists(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    fn human_readable_name(&self, name: &str) -> String {
        name.to_string()
    }
}

/// Builder for a solver over hand-assembled state.
pub(crate) struct Fixture {
    pub arena: TypeArena,
    pub interner: Interner,
    pub scopes: ScopeArena,
    pub root: ScopeId,
    pub constraints: Vec<Constraint>,
}

impl Fixture {
    pub fn new() -> Self {
        let mut scopes = ScopeArena::new();
        let root = scopes.alloc_root();
        Fixture {
            arena: TypeArena::new(),
            interner: Interner::new(),
            scopes,
            root,
            constraints: Vec::new(),
        }
    }

    /// Queue a constraint in root scope with a non-default span.
    pub fn push(&mut self, kind: ConstraintKind) -> usize {
        let index = self.constraints.len();
        let at = 10 * (index as u32 + 1);
        self.constraints
            .push(Constraint::new(self.root, Span::new(at, at + 5), kind));
        index
    }

    pub fn into_solver<'a>(self, resolver: &'a dyn ModuleResolver) -> ConstraintSolver<'a> {
        ConstraintSolver::new(
            self.arena,
            self.interner,
            self.scopes,
            self.root,
            self.constraints,
            "MainModule".to_string(),
            resolver,
            Vec::new(),
            None,
            SolverLimits::unbounded(),
        )
    }
}
