//! Indexer access resolution (`t[k]` reads and writes).
//!
//! Both handlers are recursive dispatches over the subject with an explicit
//! depth counter and a visited set; exceeding the depth limit is a
//! deterministic diagnostic, not a stack overflow.

use crate::diagnostics::TypeErrorKind;
use crate::limits;
use crate::scope::ScopeId;
use crate::solver::constraint::{ConstraintId, ConstraintKind};
use crate::solver::simplify::simplify_intersection;
use crate::solver::solve::ConstraintSolver;
use crate::solver::types::*;
use crate::solver::visit::find_blocked_type;
use crate::span::Span;
use rustc_hash::FxHashSet;

impl ConstraintSolver<'_> {
    pub(crate) fn try_dispatch_has_indexer(
        &mut self,
        id: ConstraintId,
        span: Span,
        subject: TypeId,
        index: TypeId,
        result: TypeId,
    ) -> bool {
        let subject = self.arena.follow(subject);
        let index = self.arena.follow(index);

        if self.is_blocked_type(subject) {
            return self.block_on_type(subject, id);
        }
        if self.is_blocked_type(index) {
            return self.block_on_type(index, id);
        }

        // The subject may bury a placeholder deeper down (a union member,
        // an indexer value); wait for it.
        if let Some(blocked) = find_blocked_type(&self.arena, subject) {
            return self.block_on_type(blocked, id);
        }

        let mut seen = FxHashSet::default();
        self.has_indexer_inner(0, id, span, subject, index, result, &mut seen)
    }

    #[allow(clippy::too_many_arguments)]
    fn has_indexer_inner(
        &mut self,
        depth: u32,
        id: ConstraintId,
        span: Span,
        subject: TypeId,
        index: TypeId,
        result: TypeId,
        seen: &mut FxHashSet<TypeId>,
    ) -> bool {
        if depth > limits::SOLVER_RECURSION_LIMIT {
            self.report_error(TypeErrorKind::CodeTooComplex, span);
            self.bind_blocked_type(result, TypeId::ERROR, subject, id);
            self.unblock_type(result);
            return true;
        }

        let subject = self.arena.follow(subject);
        let index = self.arena.follow(index);

        if !seen.insert(subject) {
            return false;
        }

        debug_assert!(matches!(self.arena.get(result), Type::Blocked(_)));
        debug_assert!(self.can_mutate(result, id));

        match self.arena.get(subject).clone() {
            Type::Free(ft) => {
                // The subject is entirely unknown: make the result free and
                // constrain the subject under a fresh `{[index]: result}`.
                if let Some(slot) = self.arena.get_mut(result) {
                    *slot = Type::Free(FreeType {
                        scope: ft.scope,
                        lower_bound: TypeId::NEVER,
                        upper_bound: TypeId::UNKNOWN,
                    });
                }

                let mut table = TableType::new(TableState::Unsealed, ft.scope);
                table.indexer = Some(TableIndexer {
                    key_type: index,
                    value_type: result,
                });
                let upper_bound = self.arena.add_type(Type::Table(table));

                self.unify_ty(id, subject, upper_bound);
                self.unblock_type(result);
                true
            }

            Type::Table(tt) => {
                if let Some(indexer) = &tt.indexer {
                    let (key, value) = (indexer.key_type, indexer.value_type);
                    self.unify_ty(id, index, key);
                    self.bind_blocked_type(result, value, subject, id);
                    self.unblock_type(result);
                    return true;
                }

                if tt.state == TableState::Unsealed {
                    // No indexer yet: install one with a fresh value type.
                    if let Some(slot) = self.arena.get_mut(result) {
                        *slot = Type::Free(FreeType {
                            scope: tt.scope,
                            lower_bound: TypeId::NEVER,
                            upper_bound: TypeId::UNKNOWN,
                        });
                    }
                    if let Some(Type::Table(slot)) = self.arena.get_mut(subject) {
                        slot.indexer = Some(TableIndexer {
                            key_type: index,
                            value_type: result,
                        });
                    }
                    self.unblock_type(result);
                    return true;
                }

                self.bind_blocked_type(result, TypeId::ERROR, subject, id);
                self.unblock_type(result);
                true
            }

            Type::Metatable(mt) => {
                self.has_indexer_inner(depth + 1, id, span, mt.table, index, result, seen)
            }

            Type::Class(ct) => {
                if let Some(indexer) = &ct.indexer {
                    let (key, value) = (indexer.key_type, indexer.value_type);
                    self.unify_ty(id, index, key);
                    self.bind_blocked_type(result, value, subject, id);
                    self.unblock_type(result);
                    return true;
                }
                if self.arena.is_string(index) {
                    self.bind_blocked_type(result, TypeId::UNKNOWN, subject, id);
                    self.unblock_type(result);
                    return true;
                }
                self.bind_blocked_type(result, TypeId::ERROR, subject, id);
                self.unblock_type(result);
                true
            }

            Type::Union(parts) => {
                let results = self.indexer_over_parts(depth, id, span, &parts, index, seen);

                match results.len() {
                    0 => {
                        self.bind_blocked_type(result, TypeId::ERROR, subject, id);
                    }
                    1 => {
                        self.bind_blocked_type(result, results[0], subject, id);
                    }
                    _ => {
                        if let Some(slot) = self.arena.get_mut(result) {
                            *slot = Type::Union(results);
                        }
                    }
                }
                self.unblock_type(result);
                true
            }

            Type::Intersection(parts) => {
                let results = self.indexer_over_parts(depth, id, span, &parts, index, seen);

                match results.len() {
                    0 => {
                        self.bind_blocked_type(result, TypeId::ERROR, subject, id);
                    }
                    1 => {
                        self.bind_blocked_type(result, results[0], subject, id);
                    }
                    _ => {
                        // Defer the simplification of the combined result to
                        // the family reducer.
                        if let Some(slot) = self.arena.get_mut(result) {
                            *slot = Type::FamilyInstance(FamilyInstanceType {
                                family: TypeFamily::Union,
                                type_args: results,
                                pack_args: Vec::new(),
                            });
                        }
                        let (scope, span) = {
                            let c = self.constraints.get(id);
                            (c.scope, c.span)
                        };
                        self.push_constraint(scope, span, ConstraintKind::Reduce { ty: result });
                    }
                }
                self.unblock_type(result);
                true
            }

            _ => {
                self.bind_blocked_type(result, TypeId::ERROR, subject, id);
                self.unblock_type(result);
                true
            }
        }
    }

    /// Recurse on each distinct part, collecting the distinct non-error
    /// results. Parts whose recursion was cut short by the visited set are
    /// skipped.
    fn indexer_over_parts(
        &mut self,
        depth: u32,
        id: ConstraintId,
        span: Span,
        parts: &[TypeId],
        index: TypeId,
        seen: &mut FxHashSet<TypeId>,
    ) -> Vec<TypeId> {
        let mut distinct: Vec<TypeId> = Vec::new();
        for part in parts {
            let part = self.arena.follow(*part);
            if !distinct.contains(&part) {
                distinct.push(part);
            }
        }

        let mut results: Vec<TypeId> = Vec::new();
        for part in distinct {
            let part_result = self.arena.add_type(Type::Blocked(BlockedType { owner: Some(id) }));

            let ok = self.has_indexer_inner(depth + 1, id, span, part, index, part_result, seen);
            if !ok {
                continue;
            }

            let part_result = self.arena.follow(part_result);
            if !matches!(self.arena.get(part_result), Type::Error) && !results.contains(&part_result) {
                results.push(part_result);
            }
        }
        results
    }

    pub(crate) fn try_dispatch_set_indexer(
        &mut self,
        id: ConstraintId,
        scope: ScopeId,
        span: Span,
        subject: TypeId,
        index: TypeId,
        prop: TypeId,
    ) -> bool {
        let subject = self.arena.follow(subject);
        if self.is_blocked_type(subject) {
            return self.block_on_type(subject, id);
        }

        let (dispatched, result_ty) = self.set_indexer_inner(id, scope, span, subject, index, prop, true);
        if dispatched {
            self.bind_blocked_type(prop, result_ty.unwrap_or(TypeId::ERROR), subject, id);
            self.unblock_type(prop);
        }

        dispatched
    }

    #[allow(clippy::too_many_arguments)]
    fn set_indexer_inner(
        &mut self,
        id: ConstraintId,
        scope: ScopeId,
        span: Span,
        subject: TypeId,
        index: TypeId,
        prop: TypeId,
        expand_free_bounds: bool,
    ) -> (bool, Option<TypeId>) {
        let subject = self.arena.follow(subject);
        if self.is_blocked_type(subject) {
            return (self.block_on_type(subject, id), None);
        }

        match self.arena.get(subject).clone() {
            Type::Table(tt) => {
                if let Some(indexer) = &tt.indexer {
                    let (key, value) = (indexer.key_type, indexer.value_type);
                    self.unify_ty(id, index, key);
                    return (true, Some(value));
                }
                if tt.state == TableState::Free || tt.state == TableState::Unsealed {
                    let value = self.arena.fresh_type(scope);
                    if let Some(Type::Table(slot)) = self.arena.get_mut(subject) {
                        slot.indexer = Some(TableIndexer {
                            key_type: index,
                            value_type: value,
                        });
                    }
                    return (true, Some(value));
                }
                (true, None)
            }

            Type::Free(ft) if expand_free_bounds => {
                // A write through an index puts the free type in negative
                // position; only its upper bound matters.
                let (dispatched, mut result) =
                    self.set_indexer_inner(id, scope, span, ft.upper_bound, index, prop, false);

                if dispatched && result.is_none() {
                    // No table to carry the indexer yet; graft one onto the
                    // upper bound so the next lookup finds it.
                    let value = self.arena.fresh_type(scope);
                    let mut table = TableType::new(TableState::Sealed, scope);
                    table.indexer = Some(TableIndexer {
                        key_type: index,
                        value_type: value,
                    });
                    let table_ty = self.arena.add_type(Type::Table(table));

                    let upper = self.arena.follow(ft.upper_bound);
                    let narrowed = simplify_intersection(&mut self.arena, upper, table_ty);
                    if let Some(Type::Free(slot)) = self.arena.get_mut(subject) {
                        slot.upper_bound = narrowed;
                    }
                    result = Some(value);
                }

                (dispatched, result)
            }

            Type::Intersection(parts) => {
                let mut dispatched = true;
                let mut results: Vec<TypeId> = Vec::new();

                for part in parts {
                    let (part_dispatched, found) =
                        self.set_indexer_inner(id, scope, span, part, index, prop, expand_free_bounds);
                    dispatched &= part_dispatched;
                    results.push(found.unwrap_or(TypeId::ERROR));

                    if !dispatched {
                        return (false, None);
                    }
                }

                let result_ty = self.arena.add_type(Type::FamilyInstance(FamilyInstanceType {
                    family: TypeFamily::Union,
                    type_args: results,
                    pack_args: Vec::new(),
                }));
                self.push_constraint(scope, span, ConstraintKind::Reduce { ty: result_ty });

                (dispatched, Some(result_ty))
            }

            Type::Any | Type::Error | Type::Never => (true, Some(subject)),

            _ => (true, None),
        }
    }
}

#[cfg(test)]
#[path = "tests/indexer_tests.rs"]
mod tests;
