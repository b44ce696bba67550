//! Graph traversals over the type arena.
//!
//! The solver expresses its scans (free-type census, blocked-type search,
//! pending-expansion queueing) as explicit worklists rather than recursive
//! visitors, so that deep graphs cannot overflow the stack and callers can
//! stop early.
//!
//! Traversal policy, shared by every walk:
//! - classes are leaves (their innards belong to the host, not the module);
//! - pending expansions are leaves apart from their argument lists;
//! - family instances are traversed through their argument lists;
//! - `Bound` chains are followed before a node is reported.

use crate::limits;
use crate::solver::arena::TypeArena;
use crate::solver::types::*;
use rustc_hash::FxHashSet;

/// A node yielded by a `GraphWalk`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GraphNode {
    Type(TypeId),
    Pack(TypePackId),
}

/// Worklist traversal over the type graph. Each canonical node is yielded
/// exactly once; children are enqueued when their parent is yielded.
pub struct GraphWalk {
    work_types: Vec<TypeId>,
    work_packs: Vec<TypePackId>,
    seen_types: FxHashSet<TypeId>,
    seen_packs: FxHashSet<TypePackId>,
    visited: usize,
}

impl GraphWalk {
    pub fn new() -> Self {
        GraphWalk {
            work_types: Vec::new(),
            work_packs: Vec::new(),
            seen_types: FxHashSet::default(),
            seen_packs: FxHashSet::default(),
            visited: 0,
        }
    }

    pub fn from_type(root: TypeId) -> Self {
        let mut walk = Self::new();
        walk.push_type(root);
        walk
    }

    pub fn from_pack(root: TypePackId) -> Self {
        let mut walk = Self::new();
        walk.push_pack(root);
        walk
    }

    pub fn push_type(&mut self, ty: TypeId) {
        self.work_types.push(ty);
    }

    pub fn push_pack(&mut self, tp: TypePackId) {
        self.work_packs.push(tp);
    }

    /// Yield the next unseen canonical node, enqueueing its children.
    pub fn next(&mut self, arena: &TypeArena) -> Option<GraphNode> {
        loop {
            self.visited += 1;
            if self.visited > limits::TRAVERSAL_NODE_LIMIT {
                return None;
            }

            if let Some(ty) = self.work_types.pop() {
                let ty = arena.follow(ty);
                if !self.seen_types.insert(ty) {
                    continue;
                }
                self.enqueue_type_children(arena, ty);
                return Some(GraphNode::Type(ty));
            }

            let tp = self.work_packs.pop()?;
            let tp = arena.follow_pack(tp);
            if !self.seen_packs.insert(tp) {
                continue;
            }
            self.enqueue_pack_children(arena, tp);
            return Some(GraphNode::Pack(tp));
        }
    }

    fn enqueue_type_children(&mut self, arena: &TypeArena, ty: TypeId) {
        let (tys, tps) = type_children(arena, ty);
        self.work_types.extend(tys);
        self.work_packs.extend(tps);
    }

    fn enqueue_pack_children(&mut self, arena: &TypeArena, tp: TypePackId) {
        let (tys, tps) = pack_children(arena, tp);
        self.work_types.extend(tys);
        self.work_packs.extend(tps);
    }
}

/// The structural children of a canonical type node, under the shared
/// traversal policy.
pub fn type_children(arena: &TypeArena, ty: TypeId) -> (Vec<TypeId>, Vec<TypePackId>) {
    let mut tys = Vec::new();
    let mut tps = Vec::new();
    match arena.get(ty) {
        Type::Union(parts) | Type::Intersection(parts) => {
            tys.extend(parts.iter().copied());
        }
        Type::Table(tt) => {
            for prop in tt.props.values() {
                if let Some(r) = prop.read_ty {
                    tys.push(r);
                }
                if let Some(w) = prop.write_ty {
                    tys.push(w);
                }
            }
            if let Some(ix) = &tt.indexer {
                tys.push(ix.key_type);
                tys.push(ix.value_type);
            }
        }
        Type::Metatable(mt) => {
            tys.push(mt.table);
            tys.push(mt.metatable);
        }
        Type::Function(ft) => {
            tps.push(ft.arg_types);
            tps.push(ft.ret_types);
        }
        Type::Free(ft) => {
            tys.push(ft.lower_bound);
            tys.push(ft.upper_bound);
        }
        Type::Local(lt) => tys.push(lt.domain),
        Type::PendingExpansion(pe) => {
            tys.extend(pe.type_arguments.iter().copied());
            tps.extend(pe.pack_arguments.iter().copied());
        }
        Type::FamilyInstance(fi) => {
            tys.extend(fi.type_args.iter().copied());
            tps.extend(fi.pack_args.iter().copied());
        }
        Type::Primitive(_)
        | Type::Singleton(_)
        | Type::Class(_)
        | Type::Generic(_)
        | Type::Blocked(_)
        | Type::Never
        | Type::Any
        | Type::Unknown
        | Type::Error
        | Type::Nil => {}
        Type::Bound(next) => tys.push(*next),
    }
    (tys, tps)
}

/// The structural children of a canonical pack node.
pub fn pack_children(arena: &TypeArena, tp: TypePackId) -> (Vec<TypeId>, Vec<TypePackId>) {
    let mut tys = Vec::new();
    let mut tps = Vec::new();
    match arena.get_pack(tp) {
        TypePack::Pack { head, tail } => {
            tys.extend(head.iter().copied());
            if let Some(t) = tail {
                tps.push(*t);
            }
        }
        TypePack::Variadic(ty) => tys.push(*ty),
        TypePack::FamilyInstance(fi) => {
            tys.extend(fi.type_args.iter().copied());
            tps.extend(fi.pack_args.iter().copied());
        }
        TypePack::Free(_) | TypePack::Generic(_) | TypePack::Blocked(_) | TypePack::Error => {}
        TypePack::Bound(next) => tps.push(*next),
    }
    (tys, tps)
}

impl Default for GraphWalk {
    fn default() -> Self {
        Self::new()
    }
}

/// All free types reachable from the given roots.
pub fn collect_free_types(arena: &TypeArena, type_roots: &[TypeId], pack_roots: &[TypePackId]) -> Vec<TypeId> {
    let mut walk = GraphWalk::new();
    for &ty in type_roots {
        walk.push_type(ty);
    }
    for &tp in pack_roots {
        walk.push_pack(tp);
    }

    let mut free = Vec::new();
    while let Some(node) = walk.next(arena) {
        if let GraphNode::Type(ty) = node {
            if matches!(arena.get(ty), Type::Free(_)) {
                free.push(ty);
            }
        }
    }
    free
}

/// The first `Blocked` type reachable from `root`, if any.
pub fn find_blocked_type(arena: &TypeArena, root: TypeId) -> Option<TypeId> {
    let mut walk = GraphWalk::from_type(root);
    while let Some(node) = walk.next(arena) {
        if let GraphNode::Type(ty) = node {
            if matches!(arena.get(ty), Type::Blocked(_)) {
                return Some(ty);
            }
        }
    }
    None
}

/// Everything in the graph under `root` that needs a follow-up constraint
/// after an instantiation: pending alias expansions and family instances.
#[derive(Default, Debug)]
pub struct PendingWork {
    pub pending_expansions: Vec<TypeId>,
    pub family_types: Vec<TypeId>,
    pub family_packs: Vec<TypePackId>,
}

pub fn collect_pending_work(arena: &TypeArena, root: GraphNode) -> PendingWork {
    let mut walk = match root {
        GraphNode::Type(ty) => GraphWalk::from_type(ty),
        GraphNode::Pack(tp) => GraphWalk::from_pack(tp),
    };

    let mut out = PendingWork::default();
    while let Some(node) = walk.next(arena) {
        match node {
            GraphNode::Type(ty) => match arena.get(ty) {
                Type::PendingExpansion(_) => out.pending_expansions.push(ty),
                Type::FamilyInstance(_) => out.family_types.push(ty),
                _ => {}
            },
            GraphNode::Pack(tp) => {
                if matches!(arena.get_pack(tp), TypePack::FamilyInstance(_)) {
                    out.family_packs.push(tp);
                }
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "tests/visit_tests.rs"]
mod tests;
