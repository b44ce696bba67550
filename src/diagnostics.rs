//! Diagnostic infrastructure for the solver.
//!
//! Structural and resource errors are collected into a `Vec<TypeError>` on
//! the solver and never abort inference: the solver binds an error-recovery
//! type at the offending site and keeps going. External interruptions
//! (deadline, cancellation) are *not* diagnostics; they surface as a
//! `SolveAbort` from `ConstraintSolver::run`.

use crate::solver::types::{TypeId, TypePackId};
use crate::span::Span;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Name of the module currently being solved. Tags every diagnostic.
pub type ModuleName = String;

/// A single inference error, tagged with its source span and module.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TypeError {
    pub span: Span,
    pub module_name: ModuleName,
    pub kind: TypeErrorKind,
}

/// The structured payload of a `TypeError`.
///
/// Type ids are kept raw here; rendering them into type strings is the
/// error formatter's job, downstream of the solver.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum TypeErrorKind {
    /// A type alias reference that resolved to nothing in scope.
    UnknownSymbol { name: String },
    /// A require of a module that does not exist (or an empty module ref).
    UnknownRequire { name: String },
    /// A require of something that is not a requirable module.
    IllegalRequire { module: String, reason: String },
    /// A type alias whose expansion would contain itself.
    OccursCheckFailed,
    /// A recursive type alias applied to different arguments than its
    /// enclosing expansion; expanding it would produce an infinite type.
    RecursiveTypeWithDifferentArguments,
    /// Quantification or instantiation blew a depth limit.
    CodeTooComplex,
    /// The unifier gave up on a pathological comparison.
    UnificationTooComplex,
    /// A `for ... in` iteratee that cannot produce an iterator.
    NotIterable { ty: TypeId },
    /// A type family that reduced to an uninhabited type.
    UninhabitedTypeFamily { ty: TypeId },
    /// A type pack family that reduced to an uninhabited pack.
    UninhabitedTypePackFamily { pack: TypePackId },
}

impl fmt::Display for TypeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeErrorKind::UnknownSymbol { name } => write!(f, "Unknown type '{}'", name),
            TypeErrorKind::UnknownRequire { name } if name.is_empty() => {
                write!(f, "Unknown require: unresolved module reference")
            }
            TypeErrorKind::UnknownRequire { name } => {
                write!(f, "Unknown require: module '{}' does not exist", name)
            }
            TypeErrorKind::IllegalRequire { module, reason } => {
                write!(f, "Cannot require module '{}': {}", module, reason)
            }
            TypeErrorKind::OccursCheckFailed => {
                write!(f, "Type contains a reference to itself")
            }
            TypeErrorKind::RecursiveTypeWithDifferentArguments => {
                write!(f, "Recursive type being used with different parameters")
            }
            TypeErrorKind::CodeTooComplex => {
                write!(f, "Code is too complex to typecheck")
            }
            TypeErrorKind::UnificationTooComplex => {
                write!(f, "Code is too complex to typecheck; try making it less polymorphic")
            }
            TypeErrorKind::NotIterable { .. } => {
                write!(f, "Value is not iterable")
            }
            TypeErrorKind::UninhabitedTypeFamily { .. } => {
                write!(f, "Type family instance is uninhabited")
            }
            TypeErrorKind::UninhabitedTypePackFamily { .. } => {
                write!(f, "Type pack family instance is uninhabited")
            }
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.module_name, self.kind)
    }
}

/// Why `run()` stopped without reaching quiescence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolveAbort {
    /// The configured deadline elapsed mid-solve.
    TimeLimit(ModuleName),
    /// The caller's cancellation token fired.
    UserCancel(ModuleName),
}

impl fmt::Display for SolveAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveAbort::TimeLimit(m) => write!(f, "time limit exceeded while solving '{}'", m),
            SolveAbort::UserCancel(m) => write!(f, "cancelled while solving '{}'", m),
        }
    }
}

impl std::error::Error for SolveAbort {}

/// External resource limits polled once per scheduler iteration.
#[derive(Clone, Default)]
pub struct SolverLimits {
    /// Hard wall-clock deadline. `None` means unbounded.
    pub finish_time: Option<Instant>,
    /// Cooperative cancellation token shared with the embedder.
    pub cancellation: Option<Arc<AtomicBool>>,
}

impl SolverLimits {
    pub fn unbounded() -> Self {
        SolverLimits::default()
    }

    pub fn deadline_passed(&self) -> bool {
        self.finish_time.is_some_and(|t| Instant::now() > t)
    }

    pub fn cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
