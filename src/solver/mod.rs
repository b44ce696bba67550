//! The constraint solver subsystem.
//!
//! The solver consumes a bag of typing constraints over an arena of type
//! nodes and mutates the arena in place until every constraint is
//! discharged or definitively stuck. See `solve` for the scheduler and
//! `types` for the data model.

pub mod alias;
pub mod arena;
pub mod call;
pub mod constraint;
pub mod generalize;
pub mod indexer;
pub mod iterate;
pub mod property;
pub mod reduce;
pub mod simplify;
pub mod solve;
pub mod subst;
pub mod types;
pub mod unify;
pub mod unpack;
pub mod visit;

pub use arena::{ExtendedPack, TypeArena};
pub use constraint::{
    CallArg, CallArgKind, CallShape, Constraint, ConstraintArena, ConstraintId, ConstraintKind,
};
pub use solve::{BlockedKey, ConstraintSolver, SolverLog};
pub use types::{Type, TypeId, TypePack, TypePackId, ValueContext};
