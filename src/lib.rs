//! Constraint-based type inference engine for the Tarn scripting language.
//!
//! Upstream passes lower a module into a flat sequence of typing
//! constraints over an interned graph of type nodes. This crate solves that
//! sequence: a fixed-point scheduler selects, dispatches and requeues
//! constraints, mutating the type graph in place until every constraint is
//! discharged or definitively stuck. The solved graph is the module's
//! inferred type surface.
//!
//! The main entry point is [`solver::ConstraintSolver`]:
//!
//! ```ignore
//! let mut solver = ConstraintSolver::new(
//!     arena, interner, scopes, root_scope, constraints,
//!     module_name, &resolver, require_cycles, None, limits,
//! );
//! solver.run()?;
//! // solver.arena now holds the inferred types; solver.errors the
//! // diagnostics.
//! ```

pub mod diagnostics;
pub mod interner;
#[cfg(test)]
pub(crate) mod test_fixtures;
pub mod limits;
pub mod module_resolver;
pub mod scope;
pub mod solver;
pub mod span;

pub use diagnostics::{ModuleName, SolveAbort, SolverLimits, TypeError, TypeErrorKind};
pub use interner::{Atom, Interner};
pub use module_resolver::{ModuleRef, ModuleResolver, RequireCycle, ResolvedModule, SourceKind};
pub use scope::{Scope, ScopeArena, ScopeId};
pub use solver::{Constraint, ConstraintKind, ConstraintSolver, TypeArena, TypeId, TypePackId};
pub use span::{NodeId, Span};
