//! Generalization: closing an inferred type over its free variables.
//!
//! When a function body finishes inferring, every free type that belongs to
//! the function's scope subtree is replaced by a quantified generic, and the
//! original free types are unified with their generics so that existing
//! references collapse onto the scheme.

use crate::diagnostics::TypeErrorKind;
use crate::limits;
use crate::scope::ScopeId;
use crate::solver::constraint::ConstraintId;
use crate::solver::solve::ConstraintSolver;
use crate::solver::types::*;
use crate::solver::visit::{GraphNode, GraphWalk};
use crate::span::Span;

pub(crate) struct QuantifierResult {
    pub result: TypeId,
    /// `(free, generic)` pairs; the caller unifies each pair so the free
    /// type commits to its generic.
    pub inserted_generics: Vec<(TypeId, TypeId)>,
    pub inserted_generic_packs: Vec<(TypePackId, TypePackId)>,
}

impl ConstraintSolver<'_> {
    pub(crate) fn try_dispatch_generalization(
        &mut self,
        id: ConstraintId,
        scope: ScopeId,
        span: Span,
        source_type: TypeId,
        generalized_type: TypeId,
        interior_types: &[TypeId],
    ) -> bool {
        let generalized = self.arena.follow(generalized_type);

        if self.is_blocked_type(source_type) {
            return self.block_on_type(source_type, id);
        }
        if matches!(self.arena.get(generalized), Type::PendingExpansion(_)) {
            return self.block_on_type(generalized, id);
        }

        match self.quantify(scope, source_type) {
            Some(quantified) => {
                if matches!(self.arena.get(generalized), Type::Blocked(_)) {
                    self.bind_blocked_type(generalized, quantified.result, source_type, id);
                } else {
                    self.unify_ty(id, generalized, quantified.result);
                }

                for (free, generic) in quantified.inserted_generics {
                    self.unify_ty(id, free, generic);
                }
                for (free, generic) in quantified.inserted_generic_packs {
                    self.unify_tp(id, free, generic);
                }
            }
            None => {
                self.report_error(TypeErrorKind::CodeTooComplex, span);
                self.arena.bind_type(generalized, TypeId::ERROR);
            }
        }

        self.unblock_type(generalized_type);
        self.unblock_type(source_type);

        for &ty in interior_types {
            // Interior types are generalized in the same pass but do not
            // contribute to the scheme.
            if let Some(quantified) = self.quantify(scope, ty) {
                for (free, generic) in quantified.inserted_generics {
                    self.unify_ty(id, free, generic);
                }
                for (free, generic) in quantified.inserted_generic_packs {
                    self.unify_tp(id, free, generic);
                }
            }
            self.unblock_type(ty);
        }

        true
    }

    /// Quantify `source` over the free types and packs scoped at or below
    /// `scope`. Returns `None` when the graph is pathologically large.
    pub(crate) fn quantify(&mut self, scope: ScopeId, source: TypeId) -> Option<QuantifierResult> {
        let mut free_types: Vec<TypeId> = Vec::new();
        let mut free_packs: Vec<TypePackId> = Vec::new();

        let mut walk = GraphWalk::from_type(source);
        while let Some(node) = walk.next(&self.arena) {
            match node {
                GraphNode::Type(ty) => {
                    if let Type::Free(ft) = self.arena.get(ty) {
                        if self.scopes.is_subscope_of(scope, ft.scope) {
                            free_types.push(ty);
                        }
                    }
                }
                GraphNode::Pack(tp) => {
                    if let TypePack::Free(fp) = self.arena.get_pack(tp) {
                        if self.scopes.is_subscope_of(scope, fp.scope) {
                            free_packs.push(tp);
                        }
                    }
                }
            }
        }

        if free_types.len() + free_packs.len() > limits::GENERALIZATION_VAR_LIMIT {
            return None;
        }

        let mut inserted_generics = Vec::with_capacity(free_types.len());
        let mut generic_ids = Vec::with_capacity(free_types.len());
        for (i, free) in free_types.iter().enumerate() {
            let name = self.interner.intern(&generic_name(i));
            let generic = self.arena.add_type(Type::Generic(GenericType { name }));
            generic_ids.push(generic);
            inserted_generics.push((*free, generic));
        }

        let mut inserted_generic_packs = Vec::with_capacity(free_packs.len());
        let mut generic_pack_ids = Vec::with_capacity(free_packs.len());
        for (i, free) in free_packs.iter().enumerate() {
            let name = self.interner.intern(&format!("{}...", generic_name(i)));
            let generic = self.arena.add_pack(TypePack::Generic(GenericPack { name }));
            generic_pack_ids.push(generic);
            inserted_generic_packs.push((*free, generic));
        }

        // The scheme's quantifier list lives on the function node itself.
        let result = self.arena.follow(source);
        if !generic_ids.is_empty() || !generic_pack_ids.is_empty() {
            if let Some(Type::Function(ft)) = self.arena.get_mut(result) {
                ft.generics = generic_ids;
                ft.generic_packs = generic_pack_ids;
            }
        }

        Some(QuantifierResult {
            result,
            inserted_generics,
            inserted_generic_packs,
        })
    }
}

/// `a`, `b`, ..., `z`, `t26`, `t27`, ...
fn generic_name(index: usize) -> String {
    if index < 26 {
        char::from(b'a' + index as u8).to_string()
    } else {
        format!("t{}", index)
    }
}

#[cfg(test)]
#[path = "tests/generalize_tests.rs"]
mod tests;
