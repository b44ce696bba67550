//! Pack destructuring and primitive commitment.
//!
//! `Unpack` distributes a source pack across a known-length result pack.
//! Result slots are usually `LocalType`s (widen the domain, count down,
//! bind at zero) or `Blocked` placeholders (bind to the source). Over-long
//! result packs are filled with `nil`.
//!
//! `PrimitiveType` commits a free type to a declared primitive at the last
//! possible moment: once at most one other constraint still mentions it.

use crate::scope::ScopeId;
use crate::solver::constraint::ConstraintId;
use crate::solver::simplify::simplify_union;
use crate::solver::solve::ConstraintSolver;
use crate::solver::types::*;

impl ConstraintSolver<'_> {
    pub(crate) fn try_dispatch_unpack(
        &mut self,
        id: ConstraintId,
        scope: ScopeId,
        source: TypePackId,
        result: TypePackId,
        result_is_lvalue: bool,
    ) -> bool {
        let source = self.arena.follow_pack(source);
        let result = self.arena.follow_pack(result);

        if self.is_blocked_pack(source) {
            return self.block_on_pack(source, id);
        }

        if self.is_blocked_pack(result) {
            debug_assert!(self.can_mutate_pack(result, id));
            debug_assert!(result != source);
            self.arena.bind_pack(result, source);
            self.unblock_pack(result);
            return true;
        }

        let (result_head, _) = self.arena.flatten_pack(result);
        let src = self.arena.extend_pack(source, result_head.len());

        for (i, &result_ty) in result_head.iter().enumerate() {
            if i >= src.head.len() {
                break;
            }
            let src_ty = self.arena.follow(src.head[i]);
            let result_ty = self.arena.follow(result_ty);
            self.unpack_one(id, scope, result_ty, src_ty, result_is_lvalue);
        }

        // The result pack has no tail, but the source may be too short to
        // fill every slot; the leftovers read as nil.
        for &result_ty in result_head.iter().skip(src.head.len()) {
            let result_ty = self.arena.follow(result_ty);
            debug_assert!(self.can_mutate(result_ty, id));

            match self.arena.get(result_ty).clone() {
                Type::Local(lt) if result_is_lvalue => {
                    self.widen_local(result_ty, &lt, TypeId::NIL);
                }
                Type::Blocked(_) | Type::PendingExpansion(_) => {
                    self.arena.bind_type(result_ty, TypeId::NIL);
                    self.unblock_type(result_ty);
                }
                _ => {}
            }
        }

        true
    }

    pub(crate) fn try_dispatch_unpack_one(
        &mut self,
        id: ConstraintId,
        scope: ScopeId,
        source: TypeId,
        result: TypeId,
        result_is_lvalue: bool,
    ) -> bool {
        let source = self.arena.follow(source);
        let result = self.arena.follow(result);
        self.unpack_one(id, scope, result, source, result_is_lvalue)
    }

    /// Unpack one source type into one result slot.
    pub(crate) fn unpack_one(
        &mut self,
        id: ConstraintId,
        scope: ScopeId,
        result_ty: TypeId,
        src_ty: TypeId,
        result_is_lvalue: bool,
    ) -> bool {
        let result_ty = self.arena.follow(result_ty);
        debug_assert!(self.can_mutate(result_ty, id));

        match self.arena.get(result_ty).clone() {
            Type::Union(parts) => {
                for part in parts {
                    let part = self.arena.follow(part);
                    if result_is_lvalue {
                        if let Type::Local(lt) = self.arena.get(part).clone() {
                            self.widen_local(part, &lt, src_ty);
                        }
                    }
                }
            }
            Type::Local(lt) => {
                if result_is_lvalue {
                    self.widen_local(result_ty, &lt, src_ty);
                }
            }
            Type::Blocked(_) => {
                if self.arena.follow(src_ty) == result_ty {
                    // A blocked type that turns out to be blocked only on
                    // itself carries no constraint at all; replace it with a
                    // fresh unknown.
                    let fresh = self.arena.fresh_type(scope);
                    self.arena.bind_type(result_ty, fresh);
                } else {
                    self.bind_blocked_type(result_ty, src_ty, src_ty, id);
                }
            }
            _ => {
                debug_assert!(result_is_lvalue, "unpack into a settled non-lvalue slot");
                self.unify_ty(id, src_ty, result_ty);
            }
        }

        self.unblock_type(result_ty);
        true
    }

    /// Widen a local's domain by `src`, count down one definite assignment,
    /// and bind the local to its domain when the count reaches zero.
    fn widen_local(&mut self, local_ty: TypeId, lt: &LocalType, src: TypeId) {
        let domain = simplify_union(&mut self.arena, lt.domain, src);
        debug_assert!(lt.block_count > 0);
        let count = lt.block_count.saturating_sub(1);

        if let Some(Type::Local(slot)) = self.arena.get_mut(local_ty) {
            slot.domain = domain;
            slot.block_count = count;
        }

        if count == 0 {
            self.arena.bind_type(local_ty, domain);
            self.unblock_type(local_ty);
        }
    }

    pub(crate) fn try_dispatch_primitive_type(
        &mut self,
        id: ConstraintId,
        free_type: TypeId,
        primitive: TypeId,
        expected: Option<TypeId>,
    ) -> bool {
        let expected = expected.map(|e| self.arena.follow(e));
        if let Some(expected) = expected {
            if self.is_blocked_type(expected) {
                return self.block_on_type(expected, id);
            }
        }

        let free = self.arena.follow(free_type);
        let Type::Free(ft) = self.arena.get(free).clone() else {
            // Already settled by somebody else.
            return true;
        };

        // Wait until this constraint is the last one (or nearly) that still
        // mentions the free type.
        if self
            .unresolved_constraints
            .get(&free_type)
            .is_some_and(|count| *count > 1)
        {
            self.block_on_type(free_type, id);
            return false;
        }

        let mut bind_to = primitive;
        let upper = self.arena.follow(ft.upper_bound);
        if upper != self.arena.follow(primitive) && self.arena.maybe_singleton(upper) {
            // The upper bound tells us a singleton is wanted; commit to the
            // lower bound instead of widening to the primitive.
            bind_to = ft.lower_bound;
        } else if expected.is_some_and(|e| self.arena.maybe_singleton(e)) {
            bind_to = ft.lower_bound;
        }

        self.arena.bind_type(free, bind_to);
        self.unblock_type(free);
        true
    }

    /// Pack counterpart of the blocked-owner discipline.
    pub(crate) fn can_mutate_pack(&self, tp: TypePackId, constraint: ConstraintId) -> bool {
        match self.arena.get_pack(tp) {
            TypePack::Blocked(b) => b.owner.is_none() || b.owner == Some(constraint),
            _ => true,
        }
    }
}

#[cfg(test)]
#[path = "tests/unpack_tests.rs"]
mod tests;
