//! Unification service.
//!
//! The solver constructs one `Unifier` per `unify` call and reads its side
//! channels afterwards:
//!
//! - `incomplete_subtypes`: comparisons that could not be decided yet
//!   because a placeholder stood in the way; the solver requeues each as a
//!   fresh constraint inheriting the caller's blockers.
//! - `expanded_free_types`: upper-bound contributions recorded per free
//!   type, for later error rendering.
//! - `generic_substitutions` / `generic_pack_substitutions`: mappings
//!   discovered when a quantified generic met a concrete type; the caller
//!   applies them through an explicit instantiation step.
//!
//! The unifier is *not* a subtype checker: shape mismatches are left for
//! the checking phase downstream. It returns `false` for exactly one
//! reason — an occurs-check violation while expanding a free type's
//! bounds — in which case the caller reports and binds nothing.

use crate::limits;
use crate::solver::arena::TypeArena;
use crate::solver::simplify::{simplify_intersection, simplify_union};
use crate::solver::types::*;
use rustc_hash::{FxHashMap, FxHashSet};

/// A comparison deferred until a placeholder resolves.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IncompleteSubtype {
    Types { sub: TypeId, sup: TypeId },
    Packs { sub: TypePackId, sup: TypePackId },
}

pub struct Unifier<'a> {
    arena: &'a mut TypeArena,
    pub generic_substitutions: FxHashMap<TypeId, TypeId>,
    pub generic_pack_substitutions: FxHashMap<TypePackId, TypePackId>,
    pub incomplete_subtypes: Vec<IncompleteSubtype>,
    pub expanded_free_types: FxHashMap<TypeId, Vec<TypeId>>,
    /// Set when a comparison blew the depth limit and was abandoned.
    pub too_complex: bool,
    seen: FxHashSet<(TypeId, TypeId)>,
    seen_packs: FxHashSet<(TypePackId, TypePackId)>,
}

impl<'a> Unifier<'a> {
    pub fn new(arena: &'a mut TypeArena) -> Self {
        Unifier {
            arena,
            generic_substitutions: FxHashMap::default(),
            generic_pack_substitutions: FxHashMap::default(),
            incomplete_subtypes: Vec::new(),
            expanded_free_types: FxHashMap::default(),
            too_complex: false,
            seen: FxHashSet::default(),
            seen_packs: FxHashSet::default(),
        }
    }

    pub fn unify(&mut self, sub: TypeId, sup: TypeId) -> bool {
        self.unify_at(sub, sup, 0)
    }

    fn unify_at(&mut self, sub: TypeId, sup: TypeId, depth: u32) -> bool {
        if depth > limits::UNIFY_DEPTH_LIMIT {
            self.too_complex = true;
            return true;
        }

        let sub = self.arena.follow(sub);
        let sup = self.arena.follow(sup);
        if sub == sup {
            return true;
        }
        if !self.seen.insert((sub, sup)) {
            return true;
        }

        // Placeholders defer the whole comparison.
        if self.is_pending(sub) || self.is_pending(sup) {
            self.incomplete_subtypes.push(IncompleteSubtype::Types { sub, sup });
            return true;
        }

        // The gradual escape hatches are nobody's failure.
        if matches!(self.arena.get(sub), Type::Any | Type::Unknown | Type::Error | Type::Never)
            || matches!(self.arena.get(sup), Type::Any | Type::Unknown | Type::Error)
        {
            return true;
        }

        match (self.arena.get(sub).clone(), self.arena.get(sup).clone()) {
            // Generalization pairing: the free side is committed to the
            // generic that replaced it.
            (Type::Free(_), Type::Generic(_)) => {
                self.arena.bind_type(sub, sup);
                true
            }

            // Instantiation discovery: a quantified generic against a
            // concrete type records a substitution; first mapping wins.
            (Type::Generic(_), _) => {
                self.generic_substitutions.entry(sub).or_insert(sup);
                true
            }
            (_, Type::Generic(_)) => {
                self.generic_substitutions.entry(sup).or_insert(sub);
                true
            }

            // Two frees reference each other through their bounds; that is
            // not an occurs violation, so skip the check here.
            (Type::Free(a), Type::Free(b)) => {
                let narrowed = simplify_intersection(self.arena, a.upper_bound, sup);
                if let Some(Type::Free(slot)) = self.arena.get_mut(sub) {
                    slot.upper_bound = narrowed;
                }
                self.expanded_free_types.entry(sub).or_default().push(sup);
                let widened = simplify_union(self.arena, b.lower_bound, sub);
                if let Some(Type::Free(slot)) = self.arena.get_mut(sup) {
                    slot.lower_bound = widened;
                }
                true
            }
            (Type::Free(_), _) => self.expand_upper(sub, sup),
            (_, Type::Free(_)) => self.expand_lower(sub, sup),

            // Locals accumulate their domain from either side; their
            // count-down is the unpack machinery's business, not ours.
            (_, Type::Local(lt)) => {
                let domain = simplify_union(self.arena, lt.domain, sub);
                if let Some(Type::Local(slot)) = self.arena.get_mut(sup) {
                    slot.domain = domain;
                }
                true
            }
            (Type::Local(lt), _) => {
                let domain = simplify_union(self.arena, lt.domain, sup);
                if let Some(Type::Local(slot)) = self.arena.get_mut(sub) {
                    slot.domain = domain;
                }
                true
            }

            (Type::Function(a), Type::Function(b)) => {
                // Arguments are contravariant, results covariant.
                let args_ok = self.unify_packs_at(b.arg_types, a.arg_types, depth + 1);
                args_ok && self.unify_packs_at(a.ret_types, b.ret_types, depth + 1)
            }

            (Type::Table(a), Type::Table(b)) => self.unify_tables(&a, &b, depth),

            (Type::Metatable(a), Type::Metatable(b)) => {
                let ok = self.unify_at(a.table, b.table, depth + 1);
                ok && self.unify_at(a.metatable, b.metatable, depth + 1)
            }
            (Type::Metatable(a), Type::Table(_)) => self.unify_at(a.table, sup, depth + 1),

            (Type::Union(parts), _) => {
                let mut ok = true;
                for part in parts {
                    ok = self.unify_at(part, sup, depth + 1) && ok;
                }
                ok
            }
            (_, Type::Intersection(parts)) => {
                let mut ok = true;
                for part in parts {
                    ok = self.unify_at(sub, part, depth + 1) && ok;
                }
                ok
            }

            // Everything else is a checking problem, not a unification one.
            _ => true,
        }
    }

    fn unify_tables(&mut self, a: &TableType, b: &TableType, depth: u32) -> bool {
        let mut ok = true;
        for (name, bp) in &b.props {
            if let Some(ap) = a.props.get(name) {
                if let (Some(ar), Some(br)) = (ap.read_ty, bp.read_ty) {
                    ok = self.unify_at(ar, br, depth + 1) && ok;
                }
                if let (Some(aw), Some(bw)) = (ap.write_ty, bp.write_ty) {
                    ok = self.unify_at(bw, aw, depth + 1) && ok;
                }
            }
        }
        if let (Some(ai), Some(bi)) = (&a.indexer, &b.indexer) {
            ok = self.unify_at(ai.key_type, bi.key_type, depth + 1) && ok;
            ok = self.unify_at(ai.value_type, bi.value_type, depth + 1) && ok;
        }
        ok
    }

    /// Narrow `sub`'s upper bound by `sup`. Fails on an occurs violation.
    fn expand_upper(&mut self, sub: TypeId, sup: TypeId) -> bool {
        if self.arena.occurs_check(sub, sup) {
            return false;
        }
        let Type::Free(ft) = self.arena.get(sub).clone() else {
            return true;
        };
        let narrowed = simplify_intersection(self.arena, ft.upper_bound, sup);
        if let Some(Type::Free(slot)) = self.arena.get_mut(sub) {
            slot.upper_bound = narrowed;
        }
        self.expanded_free_types.entry(sub).or_default().push(sup);
        true
    }

    /// Widen `sup`'s lower bound by `sub`. Fails on an occurs violation.
    fn expand_lower(&mut self, sub: TypeId, sup: TypeId) -> bool {
        if self.arena.occurs_check(sup, sub) {
            return false;
        }
        let Type::Free(ft) = self.arena.get(sup).clone() else {
            return true;
        };
        let widened = simplify_union(self.arena, ft.lower_bound, sub);
        if let Some(Type::Free(slot)) = self.arena.get_mut(sup) {
            slot.lower_bound = widened;
        }
        true
    }

    pub fn unify_packs(&mut self, sub: TypePackId, sup: TypePackId) -> bool {
        self.unify_packs_at(sub, sup, 0)
    }

    fn unify_packs_at(&mut self, sub: TypePackId, sup: TypePackId, depth: u32) -> bool {
        if depth > limits::UNIFY_DEPTH_LIMIT {
            self.too_complex = true;
            return true;
        }

        let sub = self.arena.follow_pack(sub);
        let sup = self.arena.follow_pack(sup);
        if sub == sup {
            return true;
        }
        if !self.seen_packs.insert((sub, sup)) {
            return true;
        }

        if self.is_pending_pack(sub) || self.is_pending_pack(sup) {
            self.incomplete_subtypes.push(IncompleteSubtype::Packs { sub, sup });
            return true;
        }

        match (self.arena.get_pack(sub).clone(), self.arena.get_pack(sup).clone()) {
            (TypePack::Error, _) | (_, TypePack::Error) => true,

            (TypePack::Free(_), TypePack::Generic(_)) => {
                self.arena.bind_pack(sub, sup);
                true
            }
            (TypePack::Generic(_), _) => {
                self.generic_pack_substitutions.entry(sub).or_insert(sup);
                true
            }
            (_, TypePack::Generic(_)) => {
                self.generic_pack_substitutions.entry(sup).or_insert(sub);
                true
            }

            // Free packs commit to whatever they meet.
            (TypePack::Free(_), _) => {
                self.arena.bind_pack(sub, sup);
                true
            }
            (_, TypePack::Free(_)) => {
                self.arena.bind_pack(sup, sub);
                true
            }

            (TypePack::Variadic(a), TypePack::Variadic(b)) => self.unify_at(a, b, depth + 1),

            _ => self.unify_pack_elements(sub, sup, depth),
        }
    }

    /// Pairwise element unification for headful packs, with variadic
    /// spill-over on either side.
    fn unify_pack_elements(&mut self, sub: TypePackId, sup: TypePackId, depth: u32) -> bool {
        let (sub_head, sub_tail) = self.arena.flatten_pack(sub);
        let (sup_head, sup_tail) = self.arena.flatten_pack(sup);

        let mut ok = true;
        let common = sub_head.len().min(sup_head.len());
        for i in 0..common {
            ok = self.unify_at(sub_head[i], sup_head[i], depth + 1) && ok;
        }

        if sub_head.len() > sup_head.len() {
            if let Some(tail) = sup_tail {
                if let TypePack::Variadic(vt) = self.arena.get_pack(tail).clone() {
                    for &extra in &sub_head[common..] {
                        ok = self.unify_at(extra, vt, depth + 1) && ok;
                    }
                }
            }
        } else if sup_head.len() > sub_head.len() {
            if let Some(tail) = sub_tail {
                if let TypePack::Variadic(vt) = self.arena.get_pack(tail).clone() {
                    for &extra in &sup_head[common..] {
                        ok = self.unify_at(vt, extra, depth + 1) && ok;
                    }
                }
            }
        }

        if let (Some(a), Some(b)) = (sub_tail, sup_tail) {
            ok = self.unify_packs_at(a, b, depth + 1) && ok;
        }

        ok
    }

    /// A type the unifier must not look through: somebody else will bind it.
    fn is_pending(&self, ty: TypeId) -> bool {
        matches!(
            self.arena.get(ty),
            Type::Blocked(_) | Type::PendingExpansion(_) | Type::FamilyInstance(_)
        )
    }

    fn is_pending_pack(&self, tp: TypePackId) -> bool {
        matches!(
            self.arena.get_pack(tp),
            TypePack::Blocked(_) | TypePack::FamilyInstance(_)
        )
    }
}

#[cfg(test)]
#[path = "tests/unify_tests.rs"]
mod tests;
