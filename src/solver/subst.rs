//! Type graph substitution.
//!
//! One engine serves three callers:
//!
//! - alias expansion, mapping an alias's generic parameters to saturated
//!   arguments;
//! - function instantiation, mapping a function's generics to fresh free
//!   types (`instantiate`) or to substitutions the unifier discovered
//!   (`instantiate_pack`);
//! - bidirectional checking, mapping generics to `unknown` so they are
//!   never pushed as expected types.
//!
//! Substitution rebuilds exactly the *tainted* region of the graph: the
//! nodes from which a mapped node is reachable. Everything else is shared
//! with the input. Clones of cyclic structures are built stub-first so the
//! rebuilt region can point back into itself.

use crate::limits;
use crate::solver::arena::TypeArena;
use crate::solver::types::*;
use crate::solver::visit::{pack_children, type_children, GraphNode};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Default)]
pub struct Substitution {
    type_map: FxHashMap<TypeId, TypeId>,
    pack_map: FxHashMap<TypePackId, TypePackId>,
    memo_types: FxHashMap<TypeId, TypeId>,
    memo_packs: FxHashMap<TypePackId, TypePackId>,
    tainted_types: FxHashSet<TypeId>,
    tainted_packs: FxHashSet<TypePackId>,
    /// Clones allocated by this substitution, in allocation order. Callers
    /// scan these to requeue reduce constraints for copied family instances.
    pub new_types: Vec<TypeId>,
    pub new_packs: Vec<TypePackId>,
}

impl Substitution {
    pub fn new() -> Self {
        Substitution::default()
    }

    pub fn map_type(&mut self, from: TypeId, to: TypeId) {
        self.type_map.insert(from, to);
    }

    pub fn map_pack(&mut self, from: TypePackId, to: TypePackId) {
        self.pack_map.insert(from, to);
    }

    pub fn is_empty(&self) -> bool {
        self.type_map.is_empty() && self.pack_map.is_empty()
    }

    /// Substitute through `root`. Returns `None` if the rebuild exceeds the
    /// depth limit (pathologically nested graphs).
    pub fn substitute(&mut self, arena: &mut TypeArena, root: TypeId) -> Option<TypeId> {
        let root = arena.follow(root);
        self.analyze(arena, GraphNode::Type(root));
        self.clean_type(arena, root, 0)
    }

    pub fn substitute_pack(&mut self, arena: &mut TypeArena, root: TypePackId) -> Option<TypePackId> {
        let root = arena.follow_pack(root);
        self.analyze(arena, GraphNode::Pack(root));
        self.clean_pack(arena, root, 0)
    }

    // =========================================================================
    // Taint analysis
    // =========================================================================

    /// Mark every node from which a mapped node is reachable. Only tainted
    /// nodes are cloned; the rest of the graph is shared.
    fn analyze(&mut self, arena: &TypeArena, root: GraphNode) {
        let mut parents: FxHashMap<GraphNode, Vec<GraphNode>> = FxHashMap::default();
        let mut seen: FxHashSet<GraphNode> = FxHashSet::default();
        let mut work = vec![root];
        let mut dirty: Vec<GraphNode> = Vec::new();
        let mut visited = 0usize;

        while let Some(node) = work.pop() {
            visited += 1;
            if visited > limits::TRAVERSAL_NODE_LIMIT {
                break;
            }
            let node = match node {
                GraphNode::Type(ty) => GraphNode::Type(arena.follow(ty)),
                GraphNode::Pack(tp) => GraphNode::Pack(arena.follow_pack(tp)),
            };
            if !seen.insert(node) {
                continue;
            }
            match node {
                GraphNode::Type(ty) if self.type_map.contains_key(&ty) => dirty.push(node),
                GraphNode::Pack(tp) if self.pack_map.contains_key(&tp) => dirty.push(node),
                _ => {}
            }

            // Taint only flows through composite structure. Free, local and
            // blocked nodes are inference state with identity; they are
            // never cloned, so nothing above them is dirtied by their
            // bounds.
            let (tys, tps) = match node {
                GraphNode::Type(ty) if is_composite_type(arena, ty) => type_children(arena, ty),
                GraphNode::Type(_) => (Vec::new(), Vec::new()),
                GraphNode::Pack(tp) if is_composite_pack(arena, tp) => pack_children(arena, tp),
                GraphNode::Pack(_) => (Vec::new(), Vec::new()),
            };
            for child in tys {
                let child = GraphNode::Type(arena.follow(child));
                parents.entry(child).or_default().push(node);
                work.push(child);
            }
            for child in tps {
                let child = GraphNode::Pack(arena.follow_pack(child));
                parents.entry(child).or_default().push(node);
                work.push(child);
            }
        }

        // Walk reverse edges from the dirty seeds.
        let mut tainted: FxHashSet<GraphNode> = FxHashSet::default();
        let mut work = dirty;
        while let Some(node) = work.pop() {
            if !tainted.insert(node) {
                continue;
            }
            if let Some(ps) = parents.get(&node) {
                work.extend(ps.iter().copied());
            }
        }

        for node in tainted {
            match node {
                GraphNode::Type(ty) => {
                    self.tainted_types.insert(ty);
                }
                GraphNode::Pack(tp) => {
                    self.tainted_packs.insert(tp);
                }
            }
        }
    }

    // =========================================================================
    // Rebuild
    // =========================================================================

    fn clean_type(&mut self, arena: &mut TypeArena, ty: TypeId, depth: u32) -> Option<TypeId> {
        if depth > limits::SUBSTITUTION_DEPTH_LIMIT {
            return None;
        }
        let ty = arena.follow(ty);

        if let Some(&mapped) = self.type_map.get(&ty) {
            return Some(mapped);
        }
        if let Some(&memo) = self.memo_types.get(&ty) {
            return Some(memo);
        }
        if !self.tainted_types.contains(&ty) || !is_composite_type(arena, ty) {
            return Some(ty);
        }

        // Stub first so cycles through this node resolve to the clone.
        let fresh = arena.add_type(arena.get(ty).clone());
        self.memo_types.insert(ty, fresh);
        self.new_types.push(fresh);

        let rebuilt = match arena.get(ty).clone() {
            Type::Union(parts) => {
                let mut out = Vec::with_capacity(parts.len());
                for p in parts {
                    out.push(self.clean_type(arena, p, depth + 1)?);
                }
                Type::Union(out)
            }
            Type::Intersection(parts) => {
                let mut out = Vec::with_capacity(parts.len());
                for p in parts {
                    out.push(self.clean_type(arena, p, depth + 1)?);
                }
                Type::Intersection(out)
            }
            Type::Table(mut tt) => {
                for prop in tt.props.values_mut() {
                    if let Some(r) = prop.read_ty {
                        prop.read_ty = Some(self.clean_type(arena, r, depth + 1)?);
                    }
                    if let Some(w) = prop.write_ty {
                        prop.write_ty = Some(self.clean_type(arena, w, depth + 1)?);
                    }
                }
                if let Some(ix) = tt.indexer.take() {
                    tt.indexer = Some(TableIndexer {
                        key_type: self.clean_type(arena, ix.key_type, depth + 1)?,
                        value_type: self.clean_type(arena, ix.value_type, depth + 1)?,
                    });
                }
                Type::Table(tt)
            }
            Type::Metatable(mut mt) => {
                mt.table = self.clean_type(arena, mt.table, depth + 1)?;
                mt.metatable = self.clean_type(arena, mt.metatable, depth + 1)?;
                Type::Metatable(mt)
            }
            Type::Function(mut ft) => {
                ft.arg_types = self.clean_pack(arena, ft.arg_types, depth + 1)?;
                ft.ret_types = self.clean_pack(arena, ft.ret_types, depth + 1)?;
                // A mapped generic is no longer quantified by the clone.
                ft.generics.retain(|g| !self.type_map.contains_key(&arena.follow(*g)));
                ft.generic_packs
                    .retain(|g| !self.pack_map.contains_key(&arena.follow_pack(*g)));
                Type::Function(ft)
            }
            Type::PendingExpansion(mut pe) => {
                for arg in pe.type_arguments.iter_mut() {
                    *arg = self.clean_type(arena, *arg, depth + 1)?;
                }
                for arg in pe.pack_arguments.iter_mut() {
                    *arg = self.clean_pack(arena, *arg, depth + 1)?;
                }
                Type::PendingExpansion(pe)
            }
            Type::FamilyInstance(mut fi) => {
                for arg in fi.type_args.iter_mut() {
                    *arg = self.clean_type(arena, *arg, depth + 1)?;
                }
                for arg in fi.pack_args.iter_mut() {
                    *arg = self.clean_pack(arena, *arg, depth + 1)?;
                }
                Type::FamilyInstance(fi)
            }
            // Leaves are never tainted on their own behalf; if we got here
            // the taint came through a bound indirection that follow already
            // collapsed. Keep the copy as-is.
            other => other,
        };

        if let Some(slot) = arena.get_mut(fresh) {
            *slot = rebuilt;
        }
        Some(fresh)
    }

    fn clean_pack(&mut self, arena: &mut TypeArena, tp: TypePackId, depth: u32) -> Option<TypePackId> {
        if depth > limits::SUBSTITUTION_DEPTH_LIMIT {
            return None;
        }
        let tp = arena.follow_pack(tp);

        if let Some(&mapped) = self.pack_map.get(&tp) {
            return Some(mapped);
        }
        if let Some(&memo) = self.memo_packs.get(&tp) {
            return Some(memo);
        }
        if !self.tainted_packs.contains(&tp) || !is_composite_pack(arena, tp) {
            return Some(tp);
        }

        let fresh = arena.add_pack(arena.get_pack(tp).clone());
        self.memo_packs.insert(tp, fresh);
        self.new_packs.push(fresh);

        let rebuilt = match arena.get_pack(tp).clone() {
            TypePack::Pack { head, tail } => {
                let mut new_head = Vec::with_capacity(head.len());
                for ty in head {
                    new_head.push(self.clean_type(arena, ty, depth + 1)?);
                }
                let new_tail = match tail {
                    Some(t) => Some(self.clean_pack(arena, t, depth + 1)?),
                    None => None,
                };
                TypePack::Pack {
                    head: new_head,
                    tail: new_tail,
                }
            }
            TypePack::Variadic(ty) => TypePack::Variadic(self.clean_type(arena, ty, depth + 1)?),
            TypePack::FamilyInstance(mut fi) => {
                for arg in fi.type_args.iter_mut() {
                    *arg = self.clean_type(arena, *arg, depth + 1)?;
                }
                for arg in fi.pack_args.iter_mut() {
                    *arg = self.clean_pack(arena, *arg, depth + 1)?;
                }
                TypePack::FamilyInstance(fi)
            }
            other => other,
        };

        if let Some(slot) = arena.get_pack_mut(fresh) {
            *slot = rebuilt;
        }
        Some(fresh)
    }
}

/// Structure worth cloning during substitution. Everything else keeps its
/// identity and is shared between input and output.
fn is_composite_type(arena: &TypeArena, ty: TypeId) -> bool {
    matches!(
        arena.get(ty),
        Type::Union(_)
            | Type::Intersection(_)
            | Type::Table(_)
            | Type::Metatable(_)
            | Type::Function(_)
            | Type::PendingExpansion(_)
            | Type::FamilyInstance(_)
    )
}

fn is_composite_pack(arena: &TypeArena, tp: TypePackId) -> bool {
    matches!(
        arena.get_pack(tp),
        TypePack::Pack { .. } | TypePack::Variadic(_) | TypePack::FamilyInstance(_)
    )
}

/// Instantiate a generic function type: every quantified generic is replaced
/// with a fresh free type in `scope`. Non-generic types are returned
/// unchanged.
pub fn instantiate(arena: &mut TypeArena, scope: crate::scope::ScopeId, ty: TypeId) -> Option<TypeId> {
    let ty = arena.follow(ty);
    let Type::Function(ft) = arena.get(ty) else {
        return Some(ty);
    };
    if ft.generics.is_empty() && ft.generic_packs.is_empty() {
        return Some(ty);
    }

    let generics = ft.generics.clone();
    let generic_packs = ft.generic_packs.clone();

    let mut subst = Substitution::new();
    for g in generics {
        let fresh = arena.fresh_type(scope);
        subst.map_type(arena.follow(g), fresh);
    }
    for g in generic_packs {
        let fresh = arena.fresh_pack(scope);
        subst.map_pack(arena.follow_pack(g), fresh);
    }
    subst.substitute(arena, ty)
}

/// Apply generic substitutions the unifier discovered to a result pack.
/// This is the explicit instantiation step after overload unification.
pub fn instantiate_pack(
    arena: &mut TypeArena,
    type_substitutions: FxHashMap<TypeId, TypeId>,
    pack_substitutions: FxHashMap<TypePackId, TypePackId>,
    pack: TypePackId,
) -> Option<(TypePackId, Substitution)> {
    let mut subst = Substitution::new();
    for (from, to) in type_substitutions {
        subst.map_type(arena.follow(from), to);
    }
    for (from, to) in pack_substitutions {
        subst.map_pack(arena.follow_pack(from), to);
    }
    let result = subst.substitute_pack(arena, pack)?;
    Some((result, subst))
}

#[cfg(test)]
#[path = "tests/subst_tests.rs"]
mod tests;
