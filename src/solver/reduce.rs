//! Type family reduction.
//!
//! A family instance is a deferred type-level computation (`union<...>`,
//! `intersect<...>`) that the solver parks behind a `Reduce` constraint.
//! The reducer walks the graph under a root, reduces every instance whose
//! arguments have resolved, and reports the rest as blockers.
//!
//! An `intersect` family that collapses to `never` without any of its
//! arguments being `never` is *uninhabited*: it is reported as an error and
//! left unbound. The solver interns uninhabited instances so that they are
//! no longer considered blocking.

use crate::solver::arena::TypeArena;
use crate::solver::simplify::{intersection_of, union_of};
use crate::solver::types::*;
use crate::solver::visit::{collect_pending_work, GraphNode};
use rustc_hash::FxHashSet;

/// A family instance node, type- or pack-shaped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FamilyKey {
    Type(TypeId),
    Pack(TypePackId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FamilyError {
    UninhabitedType(TypeId),
    UninhabitedPack(TypePackId),
}

/// The outcome of one reduction sweep.
#[derive(Default, Debug)]
pub struct FamilyReduction {
    pub reduced_types: Vec<TypeId>,
    pub reduced_packs: Vec<TypePackId>,
    pub blocked_types: Vec<TypeId>,
    pub blocked_packs: Vec<TypePackId>,
    pub errors: Vec<FamilyError>,
}

impl FamilyReduction {
    pub fn finished(&self) -> bool {
        self.blocked_types.is_empty() && self.blocked_packs.is_empty()
    }
}

/// Reduce every family instance reachable from `root`, repeating until no
/// further instance makes progress (inner instances unblock outer ones).
pub fn reduce_families(
    arena: &mut TypeArena,
    root: GraphNode,
    uninhabited: &FxHashSet<FamilyKey>,
    _force: bool,
) -> FamilyReduction {
    let mut out = FamilyReduction::default();
    let mut failed: FxHashSet<FamilyKey> = FxHashSet::default();

    loop {
        let work = collect_pending_work(arena, root);
        let mut progressed = false;

        for ty in work.family_types {
            let ty = arena.follow(ty);
            if !matches!(arena.get(ty), Type::FamilyInstance(_)) {
                continue;
            }
            if failed.contains(&FamilyKey::Type(ty)) || uninhabited.contains(&FamilyKey::Type(ty)) {
                continue;
            }
            match try_reduce_type_instance(arena, ty) {
                Reduction::Done => {
                    out.reduced_types.push(ty);
                    progressed = true;
                }
                Reduction::Uninhabited => {
                    out.errors.push(FamilyError::UninhabitedType(ty));
                    failed.insert(FamilyKey::Type(ty));
                }
                Reduction::Blocked(blockers) => {
                    out.blocked_types.extend(blockers);
                }
            }
        }

        for tp in work.family_packs {
            let tp = arena.follow_pack(tp);
            if !matches!(arena.get_pack(tp), TypePack::FamilyInstance(_)) {
                continue;
            }
            if failed.contains(&FamilyKey::Pack(tp)) || uninhabited.contains(&FamilyKey::Pack(tp)) {
                continue;
            }
            match try_reduce_pack_instance(arena, tp) {
                Reduction::Done => {
                    out.reduced_packs.push(tp);
                    progressed = true;
                }
                Reduction::Uninhabited => {
                    out.errors.push(FamilyError::UninhabitedPack(tp));
                    failed.insert(FamilyKey::Pack(tp));
                }
                Reduction::Blocked(blockers) => {
                    out.blocked_types.extend(blockers);
                }
            }
        }

        if !progressed {
            break;
        }
        // A successful inner reduction may have unblocked an outer
        // instance; rescan. Blockers recorded in earlier rounds may have
        // resolved, so start the lists over.
        out.blocked_types.clear();
        out.blocked_packs.clear();
    }

    out.blocked_types.sort_unstable();
    out.blocked_types.dedup();
    out
}

enum Reduction {
    Done,
    Uninhabited,
    Blocked(Vec<TypeId>),
}

fn blocking_args(arena: &TypeArena, args: &[TypeId]) -> Vec<TypeId> {
    args.iter()
        .map(|a| arena.follow(*a))
        .filter(|a| {
            matches!(
                arena.get(*a),
                Type::Blocked(_) | Type::PendingExpansion(_) | Type::FamilyInstance(_)
            )
        })
        .collect()
}

fn try_reduce_type_instance(arena: &mut TypeArena, instance: TypeId) -> Reduction {
    let Type::FamilyInstance(fi) = arena.get(instance).clone() else {
        return Reduction::Done;
    };

    let blockers = blocking_args(arena, &fi.type_args);
    if !blockers.is_empty() {
        return Reduction::Blocked(blockers);
    }

    let result = apply_family(arena, fi.family, &fi.type_args);
    if result == TypeId::NEVER
        && fi.family == TypeFamily::Intersect
        && !fi.type_args.iter().any(|a| arena.follow(*a).is_never())
    {
        return Reduction::Uninhabited;
    }

    arena.bind_type(instance, result);
    Reduction::Done
}

fn try_reduce_pack_instance(arena: &mut TypeArena, instance: TypePackId) -> Reduction {
    let TypePack::FamilyInstance(fi) = arena.get_pack(instance).clone() else {
        return Reduction::Done;
    };

    let blockers = blocking_args(arena, &fi.type_args);
    if !blockers.is_empty() {
        return Reduction::Blocked(blockers);
    }

    let result = apply_family(arena, fi.family, &fi.type_args);
    if result == TypeId::NEVER
        && fi.family == TypeFamily::Intersect
        && !fi.type_args.iter().any(|a| arena.follow(*a).is_never())
    {
        return Reduction::Uninhabited;
    }

    let result_pack = arena.add_pack(TypePack::Pack {
        head: vec![result],
        tail: None,
    });
    arena.bind_pack(instance, result_pack);
    Reduction::Done
}

fn apply_family(arena: &mut TypeArena, family: TypeFamily, args: &[TypeId]) -> TypeId {
    match family {
        TypeFamily::Union => union_of(arena, args.to_vec()),
        TypeFamily::Intersect => intersection_of(arena, args.to_vec()),
    }
}

#[cfg(test)]
#[path = "tests/reduce_tests.rs"]
mod tests;
