//! Constraint records and their storage.
//!
//! A constraint is created once — by the generator up front, or by a
//! handler mid-solve — and lives in the `ConstraintArena` until the solver
//! is torn down. The blocking index refers to constraints by `ConstraintId`
//! long after their position in the unsolved list has changed, so storage
//! is append-only and ids are stable.

use crate::interner::Atom;
use crate::scope::ScopeId;
use crate::solver::arena::TypeArena;
use crate::solver::types::{TypeId, TypePackId, ValueContext};
use crate::solver::visit::collect_free_types;
use crate::span::{NodeId, Span};
use serde::Serialize;

/// A stable handle to a constraint record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ConstraintId(pub u32);

/// One typing obligation over the type graph.
#[derive(Clone, Debug)]
pub struct Constraint {
    pub scope: ScopeId,
    pub span: Span,
    pub kind: ConstraintKind,
    /// Constraints that must dispatch before this one is considered.
    /// Edges in the constraint DAG; the solver seeds its blocking index
    /// from these.
    pub dependencies: Vec<ConstraintId>,
}

impl Constraint {
    pub fn new(scope: ScopeId, span: Span, kind: ConstraintKind) -> Self {
        Constraint {
            scope,
            span,
            kind,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<ConstraintId>) -> Self {
        self.dependencies = deps;
        self
    }
}

/// Shape facts about a call expression that bidirectional checking needs.
/// The parser owns the AST; these ride on the constraint instead.
#[derive(Clone, Debug)]
pub struct CallShape {
    pub node: NodeId,
    /// Method-style calls carry an implicit self argument in the type pack
    /// that has no counterpart in the argument expressions.
    pub self_call: bool,
    pub args: Vec<CallArg>,
}

#[derive(Clone, Debug)]
pub struct CallArg {
    pub node: NodeId,
    pub kind: CallArgKind,
}

#[derive(Clone, Debug)]
pub enum CallArgKind {
    /// A constant literal (`1`, `"x"`, `true`, `nil`).
    Constant,
    /// A lambda expression; one flag per parameter, true when annotated.
    Lambda { annotated: Vec<bool> },
    /// A table literal expression.
    TableLiteral,
    /// Anything else; no bidirectional inference applies.
    Other,
}

#[derive(Clone, Debug)]
pub enum ConstraintKind {
    /// `sub_type <: super_type`.
    Subtype { sub_type: TypeId, super_type: TypeId },
    /// `sub_pack <: super_pack`.
    PackSubtype {
        sub_pack: TypePackId,
        super_pack: TypePackId,
    },
    /// Close `source_type` over its in-scope free types, binding the result
    /// to `generalized_type`.
    Generalization {
        source_type: TypeId,
        generalized_type: TypeId,
        /// Types inferred inside the function body that are generalized in
        /// the same pass without being quantified into the scheme.
        interior_types: Vec<TypeId>,
    },
    /// Resolve a `for ... in` iteratee and bind the loop variables.
    Iterable {
        iterator: TypePackId,
        variables: TypePackId,
        /// The AST fragment whose resolved next-function type is recorded.
        next_ast_fragment: NodeId,
    },
    /// Stamp a user-visible name onto a table or metatable.
    Name {
        named_type: TypeId,
        name: Atom,
        type_parameters: Vec<TypeId>,
        type_pack_parameters: Vec<TypePackId>,
        /// Synthetic names are display hints, not declared names.
        synthetic: bool,
    },
    /// Expand a pending parametric alias reference in place.
    TypeAliasExpansion { target: TypeId },
    /// Resolve a call: select an overload, unify it against the synthesized
    /// call type, and instantiate the results.
    FunctionCall {
        callee: TypeId,
        args_pack: TypePackId,
        result: TypePackId,
        call_site: Option<NodeId>,
        /// Refinement discriminants introduced for this call; blocked ones
        /// are committed to `any` at dispatch.
        discriminants: Vec<Option<TypeId>>,
    },
    /// Bidirectional checking of literal and lambda arguments against a
    /// known (non-overloaded) callee.
    FunctionCheck {
        callee: TypeId,
        args_pack: TypePackId,
        call_shape: CallShape,
    },
    /// Commit a free type to a primitive once its other constraints are
    /// nearly discharged.
    PrimitiveType {
        free_type: TypeId,
        primitive: TypeId,
        expected: Option<TypeId>,
    },
    /// `result = subject.prop` (or `unknown`/fresh depending on subject).
    HasProp {
        subject: TypeId,
        prop: Atom,
        result: TypeId,
        context: ValueContext,
        /// In conditional position, missing properties read as `unknown`.
        in_conditional: bool,
        /// Keep raw unions/intersections instead of simplifying pairs.
        suppress_simplification: bool,
    },
    /// Write through a property path, inserting on the unsealed leaf.
    SetProp {
        subject: TypeId,
        path: Vec<Atom>,
        prop_type: TypeId,
        result: TypeId,
    },
    /// `result = subject[index]`.
    HasIndexer {
        subject: TypeId,
        index: TypeId,
        result: TypeId,
    },
    /// `subject[index] = prop`.
    SetIndexer {
        subject: TypeId,
        index: TypeId,
        prop: TypeId,
    },
    /// Destructure `source` into the known-length `result` pack.
    Unpack {
        source: TypePackId,
        result: TypePackId,
        result_is_lvalue: bool,
    },
    /// Single-slot unpack.
    Unpack1 {
        source: TypeId,
        result: TypeId,
        result_is_lvalue: bool,
    },
    /// Run the family reducer over a type.
    Reduce { ty: TypeId },
    /// Run the family reducer over a pack.
    ReducePack { pack: TypePackId },
    /// Mutual subtyping: both directions unified.
    Equality {
        result_type: TypeId,
        assignment_type: TypeId,
    },
}

impl ConstraintKind {
    /// The free types this constraint mentions, for the solver's
    /// almost-settled bookkeeping. Only subtyping constraints take part:
    /// they are the ones that can still narrow a free type.
    pub fn mentioned_free_types(&self, arena: &TypeArena) -> Vec<TypeId> {
        match self {
            ConstraintKind::Subtype { sub_type, super_type } => {
                collect_free_types(arena, &[*sub_type, *super_type], &[])
            }
            ConstraintKind::PackSubtype { sub_pack, super_pack } => {
                collect_free_types(arena, &[], &[*sub_pack, *super_pack])
            }
            _ => Vec::new(),
        }
    }
}

/// Append-only storage for constraints.
pub struct ConstraintArena {
    constraints: Vec<Constraint>,
}

impl ConstraintArena {
    pub fn new() -> Self {
        ConstraintArena {
            constraints: Vec::new(),
        }
    }

    pub fn push(&mut self, constraint: Constraint) -> ConstraintId {
        let id = ConstraintId(self.constraints.len() as u32);
        self.constraints.push(constraint);
        id
    }

    pub fn get(&self, id: ConstraintId) -> &Constraint {
        &self.constraints[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ConstraintId> {
        (0..self.constraints.len() as u32).map(ConstraintId)
    }
}

impl Default for ConstraintArena {
    fn default() -> Self {
        Self::new()
    }
}
