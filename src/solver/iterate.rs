//! Resolution of `for ... in` iteration.
//!
//! The iteratee can take several shapes:
//!
//! - an explicit iterator triple `(next, state, first-index)`;
//! - a table with an indexer (iterate its key/value pairs);
//! - a value whose metatable provides `__iter`;
//! - `any`/`error`/`never`, which propagate uniformly to the variables.
//!
//! The handler peels the iteratee apart far enough to pick one of these,
//! blocking until it can. In force mode, an iteratee that never resolved is
//! reported as not iterable and the variables receive `error`.

use crate::diagnostics::TypeErrorKind;
use crate::limits;
use crate::scope::ScopeId;
use crate::solver::constraint::{ConstraintId, ConstraintKind};
use crate::solver::simplify::strip_nil;
use crate::solver::solve::ConstraintSolver;
use crate::solver::subst::instantiate;
use crate::solver::types::*;
use crate::span::{NodeId, Span};

impl ConstraintSolver<'_> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn try_dispatch_iterable(
        &mut self,
        id: ConstraintId,
        scope: ScopeId,
        span: Span,
        iterator: TypePackId,
        variables: TypePackId,
        next_ast_fragment: NodeId,
        force: bool,
    ) -> bool {
        let iter = self.arena.extend_pack(iterator, limits::ITERATOR_HEAD_LIMIT);

        if iter.head.len() < limits::ITERATOR_HEAD_LIMIT {
            if let Some(tail) = iter.tail {
                if self.is_blocked_pack(tail) {
                    if force {
                        // The iteratee never resolved; nothing left to learn.
                        return true;
                    }
                    return self.block_on_pack(tail, id);
                }
            }
        }

        let mut blocked = false;
        for &ty in &iter.head {
            if self.is_blocked_type(ty) {
                self.block_on_type(ty, id);
                blocked = true;
            }
        }
        if blocked {
            return false;
        }

        if iter.head.is_empty() {
            self.unify_tp(id, TypePackId::ANY, variables);
            return true;
        }

        let next_ty = self.arena.follow(iter.head[0]);
        if matches!(self.arena.get(next_ty), Type::Free(_)) {
            if force {
                return true;
            }
            return self.block_on_type(next_ty, id);
        }

        if matches!(self.arena.get(next_ty), Type::Function(_)) {
            let first_index_ty = iter.head.get(2).copied().unwrap_or(TypeId::NIL);
            return self.try_dispatch_iterable_function(
                id,
                scope,
                span,
                next_ty,
                first_index_ty,
                variables,
                next_ast_fragment,
                force,
            );
        }

        self.try_dispatch_iterable_table(id, scope, span, iter.head[0], variables, force)
    }

    /// Bind the loop variables by unpacking `...ty` into them.
    fn unpack_into_variables(&mut self, scope: ScopeId, span: Span, variables: TypePackId, ty: TypeId) {
        let variadic = self.arena.add_pack(TypePack::Variadic(ty));
        self.push_constraint(
            scope,
            span,
            ConstraintKind::Unpack {
                source: variadic,
                result: variables,
                result_is_lvalue: true,
            },
        );
    }

    /// Forced iteratees that never resolved: diagnose and give the
    /// variables `error` rather than leaving them hanging.
    fn fail_not_iterable(&mut self, scope: ScopeId, span: Span, iteratee: TypeId, variables: TypePackId) -> bool {
        self.report_error(TypeErrorKind::NotIterable { ty: iteratee }, span);
        self.unpack_into_variables(scope, span, variables, TypeId::ERROR);
        true
    }

    fn try_dispatch_iterable_table(
        &mut self,
        id: ConstraintId,
        scope: ScopeId,
        span: Span,
        iterator_ty: TypeId,
        variables: TypePackId,
        force: bool,
    ) -> bool {
        let iterator_ty = self.arena.follow(iterator_ty);

        if matches!(self.arena.get(iterator_ty), Type::Free(_)) {
            if force {
                return self.fail_not_iterable(scope, span, iterator_ty, variables);
            }
            return self.block_on_type(iterator_ty, id);
        }

        match self.arena.get(iterator_ty).clone() {
            Type::Any => {
                self.unpack_into_variables(scope, span, variables, TypeId::ANY);
                return true;
            }
            Type::Error => {
                self.unpack_into_variables(scope, span, variables, TypeId::ERROR);
                return true;
            }
            Type::Never => {
                self.unpack_into_variables(scope, span, variables, TypeId::NEVER);
                return true;
            }
            Type::Table(tt) => {
                // A free table may still pick up constraints that clarify
                // how to iterate it; hold off unless forced.
                if tt.state == TableState::Free {
                    if force {
                        return self.fail_not_iterable(scope, span, iterator_ty, variables);
                    }
                    return self.block_on_type(iterator_ty, id);
                }

                if let Some(indexer) = &tt.indexer {
                    let expected = self.arena.add_pack(TypePack::Pack {
                        head: vec![indexer.key_type, indexer.value_type],
                        tail: None,
                    });
                    self.unify_tp(id, variables, expected);

                    // Unification widened the local domains; settle the
                    // freshly bound locals now.
                    let (variable_tys, _) = self.arena.flatten_pack(variables);
                    for ty in variable_tys {
                        let ty = self.arena.follow(ty);
                        if let Type::Local(lt) = self.arena.get(ty).clone() {
                            debug_assert!(lt.block_count > 0);
                            let count = lt.block_count.saturating_sub(1);
                            if let Some(Type::Local(slot)) = self.arena.get_mut(ty) {
                                slot.block_count = count;
                            }
                            if count == 0 {
                                self.arena.bind_type(ty, lt.domain);
                                self.unblock_type(ty);
                            }
                        }
                    }
                } else {
                    self.unpack_into_variables(scope, span, variables, TypeId::ERROR);
                }
                return true;
            }
            _ => {}
        }

        if let Some(iter_fn) = self.find_metatable_entry(iterator_ty, self.metamethods.iter) {
            if self.is_blocked_type(iter_fn) {
                return self.block_on_type(iter_fn, id);
            }

            match instantiate(&mut self.arena, scope, iter_fn) {
                Some(instantiated) => {
                    if let Type::Function(iter_ftv) = self.arena.get(instantiated).clone() {
                        let expected_args = self.arena.add_pack(TypePack::Pack {
                            head: vec![iterator_ty],
                            tail: None,
                        });
                        self.unify_tp(id, iter_ftv.arg_types, expected_args);

                        let rets = self.arena.extend_pack(iter_ftv.ret_types, 2);
                        let Some(&next_raw) = rets.head.first() else {
                            // The __iter returned nothing; downstream
                            // checking reports it.
                            return true;
                        };

                        let next_fn_ty = self.arena.follow(next_raw);
                        match instantiate(&mut self.arena, scope, next_fn_ty) {
                            Some(next_instantiated) => {
                                let ret_pack = match self.arena.get(next_instantiated) {
                                    Type::Function(next_fn) => Some(next_fn.ret_types),
                                    _ => None,
                                };
                                if let Some(ret_pack) = ret_pack {
                                    self.unpack_next_returns(id, scope, span, ret_pack, variables);
                                }
                            }
                            None => {
                                self.report_error(TypeErrorKind::UnificationTooComplex, span);
                            }
                        }
                    }
                }
                None => {
                    self.report_error(TypeErrorKind::UnificationTooComplex, span);
                }
            }
            return true;
        }

        match self.arena.get(iterator_ty).clone() {
            Type::Metatable(mt) => {
                // No __iter; if the metatable itself is unresolved there may
                // still be one coming.
                let meta = self.arena.follow(mt.metatable);
                if matches!(self.arena.get(meta), Type::Free(_)) {
                    if force {
                        return self.fail_not_iterable(scope, span, iterator_ty, variables);
                    }
                    return self.block_on_type(meta, id);
                }
                self.fail_not_iterable(scope, span, iterator_ty, variables)
            }
            Type::Primitive(p) if p.kind == PrimitiveKind::Table => {
                self.unpack_into_variables(scope, span, variables, TypeId::UNKNOWN);
                true
            }
            _ => {
                self.unpack_into_variables(scope, span, variables, TypeId::ERROR);
                true
            }
        }
    }

    /// The explicit iterator-triple form: `for vars in next, state, first`.
    #[allow(clippy::too_many_arguments)]
    fn try_dispatch_iterable_function(
        &mut self,
        id: ConstraintId,
        scope: ScopeId,
        span: Span,
        next_ty: TypeId,
        first_index_ty: TypeId,
        variables: TypePackId,
        next_ast_fragment: NodeId,
        force: bool,
    ) -> bool {
        // We need to know whether the first index is nil before committing.
        let first_index = self.arena.follow(first_index_ty);
        if matches!(self.arena.get(first_index), Type::Free(_)) {
            if force {
                return self.fail_not_iterable(scope, span, next_ty, variables);
            }
            self.block_on_type(first_index, id);
            return false;
        }

        let Type::Function(next_fn) = self.arena.get(next_ty).clone() else {
            // The caller only sends function types here.
            return true;
        };

        self.ast_for_in_next_types.insert(next_ast_fragment, next_ty);
        self.unpack_next_returns(id, scope, span, next_fn.ret_types, variables);

        true
    }

    /// Unpack a next function's return pack into the loop variables. The
    /// first value is never nil inside the loop, even when the next
    /// function can return nil: the loop does not advance on nil.
    fn unpack_next_returns(
        &mut self,
        id: ConstraintId,
        scope: ScopeId,
        span: Span,
        ret_pack: TypePackId,
        variables: TypePackId,
    ) {
        let (head, tail) = self.arena.flatten_pack(ret_pack);
        let mut modified_head = Vec::with_capacity(head.len());
        if let Some(&first) = head.first() {
            modified_head.push(strip_nil(&mut self.arena, first));
            modified_head.extend(head[1..].iter().copied());
        }
        let modified_pack = self.arena.add_pack(TypePack::Pack {
            head: modified_head,
            tail,
        });

        let unpack = self.push_constraint(
            scope,
            span,
            ConstraintKind::Unpack {
                source: modified_pack,
                result: variables,
                result_is_lvalue: true,
            },
        );
        self.inherit_blocks(id, unpack);
    }
}

#[cfg(test)]
#[path = "tests/iterate_tests.rs"]
mod tests;
