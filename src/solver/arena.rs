//! Type arena for the solver.
//!
//! The arena owns every type and type pack node for one module and hands out
//! `TypeId`/`TypePackId` handles. Singleton intrinsics are pre-allocated at
//! fixed indices so `TypeId::ANY` and friends are valid in any arena.
//!
//! Nodes marked *persistent* (intrinsics, imported module surfaces) are
//! never handed out mutably; `get_mut`/`bind_type` refuse them. Everything
//! else may be mutated, subject to the solver's own ownership rules for
//! `Blocked` nodes.

use crate::limits;
use crate::scope::ScopeId;
use crate::solver::types::*;
use smallvec::SmallVec;

struct TypeNode {
    ty: Type,
    persistent: bool,
}

struct PackNode {
    tp: TypePack,
    persistent: bool,
}

/// Arena allocator for types and packs, with pre-allocated singletons.
pub struct TypeArena {
    types: Vec<TypeNode>,
    packs: Vec<PackNode>,
}

/// A pack flattened out to some requested length.
#[derive(Clone, Debug)]
pub struct ExtendedPack {
    pub head: Vec<TypeId>,
    pub tail: Option<TypePackId>,
}

impl TypeArena {
    pub fn new() -> Self {
        let mut arena = TypeArena {
            types: Vec::new(),
            packs: Vec::new(),
        };

        // Order must match the TypeId sentinel constants.
        arena.add_persistent_type(Type::Error); // ERROR
        arena.add_persistent_type(Type::Never); // NEVER
        arena.add_persistent_type(Type::Unknown); // UNKNOWN
        arena.add_persistent_type(Type::Any); // ANY
        arena.add_persistent_type(Type::Nil); // NIL
        arena.add_persistent_type(Type::Primitive(PrimitiveType {
            kind: PrimitiveKind::Boolean,
            metatable: None,
        })); // BOOLEAN
        arena.add_persistent_type(Type::Primitive(PrimitiveType {
            kind: PrimitiveKind::Number,
            metatable: None,
        })); // NUMBER
        arena.add_persistent_type(Type::Primitive(PrimitiveType {
            kind: PrimitiveKind::String,
            metatable: None,
        })); // STRING
        arena.add_persistent_type(Type::Primitive(PrimitiveType {
            kind: PrimitiveKind::Table,
            metatable: None,
        })); // TABLE
        arena.add_persistent_type(Type::Singleton(SingletonType::Boolean(true))); // TRUE
        arena.add_persistent_type(Type::Singleton(SingletonType::Boolean(false))); // FALSE
        while (arena.types.len() as u32) < TypeId::FIRST_USER {
            arena.add_persistent_type(Type::Error);
        }

        // Order must match the TypePackId sentinel constants.
        arena.add_persistent_pack(TypePack::Error); // ERROR
        arena.add_persistent_pack(TypePack::Variadic(TypeId::ANY)); // ANY
        arena.add_persistent_pack(TypePack::Variadic(TypeId::NEVER)); // NEVER
        arena.add_persistent_pack(TypePack::Variadic(TypeId::UNKNOWN)); // UNKNOWN
        arena.add_persistent_pack(TypePack::Pack {
            head: Vec::new(),
            tail: None,
        }); // EMPTY
        while (arena.packs.len() as u32) < TypePackId::FIRST_USER {
            arena.add_persistent_pack(TypePack::Error);
        }

        arena
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    pub fn add_type(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeNode {
            ty,
            persistent: false,
        });
        id
    }

    /// Allocate a node that may never be mutated (imported surfaces,
    /// intrinsics).
    pub fn add_persistent_type(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeNode {
            ty,
            persistent: true,
        });
        id
    }

    pub fn add_pack(&mut self, tp: TypePack) -> TypePackId {
        let id = TypePackId(self.packs.len() as u32);
        self.packs.push(PackNode {
            tp,
            persistent: false,
        });
        id
    }

    pub fn add_persistent_pack(&mut self, tp: TypePack) -> TypePackId {
        let id = TypePackId(self.packs.len() as u32);
        self.packs.push(PackNode {
            tp,
            persistent: true,
        });
        id
    }

    /// A fresh free type with bounds `[never, unknown]`.
    pub fn fresh_type(&mut self, scope: ScopeId) -> TypeId {
        self.add_type(Type::Free(FreeType {
            scope,
            lower_bound: TypeId::NEVER,
            upper_bound: TypeId::UNKNOWN,
        }))
    }

    /// A fresh free pack.
    pub fn fresh_pack(&mut self, scope: ScopeId) -> TypePackId {
        self.add_pack(TypePack::Free(FreePack { scope }))
    }

    // =========================================================================
    // Access
    // =========================================================================

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize].ty
    }

    pub fn get_pack(&self, id: TypePackId) -> &TypePack {
        &self.packs[id.0 as usize].tp
    }

    /// Mutable access; refused for persistent nodes.
    pub fn get_mut(&mut self, id: TypeId) -> Option<&mut Type> {
        let node = &mut self.types[id.0 as usize];
        if node.persistent {
            None
        } else {
            Some(&mut node.ty)
        }
    }

    pub fn get_pack_mut(&mut self, id: TypePackId) -> Option<&mut TypePack> {
        let node = &mut self.packs[id.0 as usize];
        if node.persistent {
            None
        } else {
            Some(&mut node.tp)
        }
    }

    pub fn is_persistent(&self, id: TypeId) -> bool {
        self.types[id.0 as usize].persistent
    }

    pub fn is_persistent_pack(&self, id: TypePackId) -> bool {
        self.packs[id.0 as usize].persistent
    }

    /// Replace a node with `Bound(to)`. Returns false (and does nothing) if
    /// the node is persistent or the binding would be a self-loop.
    pub fn bind_type(&mut self, id: TypeId, to: TypeId) -> bool {
        if id == to {
            return false;
        }
        match self.get_mut(id) {
            Some(slot) => {
                *slot = Type::Bound(to);
                true
            }
            None => false,
        }
    }

    pub fn bind_pack(&mut self, id: TypePackId, to: TypePackId) -> bool {
        if id == to {
            return false;
        }
        match self.get_pack_mut(id) {
            Some(slot) => {
                *slot = TypePack::Bound(to);
                true
            }
            None => false,
        }
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    // =========================================================================
    // Follow
    // =========================================================================

    /// Chase `Bound` indirection to the canonical representative.
    /// Idempotent: `follow(follow(t)) == follow(t)`.
    pub fn follow(&self, id: TypeId) -> TypeId {
        let mut current = id;
        let mut steps = 0u32;
        while let Type::Bound(next) = self.get(current) {
            current = *next;
            steps += 1;
            if steps > limits::FOLLOW_CHAIN_LIMIT {
                debug_assert!(false, "Bound chain exceeds limit; cycle in type graph");
                break;
            }
        }
        current
    }

    pub fn follow_pack(&self, id: TypePackId) -> TypePackId {
        let mut current = id;
        let mut steps = 0u32;
        while let TypePack::Bound(next) = self.get_pack(current) {
            current = *next;
            steps += 1;
            if steps > limits::FOLLOW_CHAIN_LIMIT {
                debug_assert!(false, "Bound chain exceeds limit; cycle in pack graph");
                break;
            }
        }
        current
    }

    // =========================================================================
    // Pack queries
    // =========================================================================

    /// Flatten a pack into its full head and final tail, without mutating
    /// anything.
    pub fn flatten_pack(&self, pack: TypePackId) -> (Vec<TypeId>, Option<TypePackId>) {
        let mut head = Vec::new();
        let mut current = self.follow_pack(pack);
        let mut steps = 0u32;
        loop {
            match self.get_pack(current) {
                TypePack::Pack { head: h, tail } => {
                    head.extend(h.iter().copied());
                    match tail {
                        Some(t) => current = self.follow_pack(*t),
                        None => return (head, None),
                    }
                }
                _ => return (head, Some(current)),
            }
            steps += 1;
            if steps > limits::FOLLOW_CHAIN_LIMIT {
                debug_assert!(false, "pack chain exceeds limit");
                return (head, Some(current));
            }
        }
    }

    /// The first type of a pack, if it has one without mutation.
    pub fn first(&self, pack: TypePackId) -> Option<TypeId> {
        let (head, tail) = self.flatten_pack(pack);
        if let Some(first) = head.first() {
            return Some(*first);
        }
        match tail.map(|t| self.get_pack(t)) {
            Some(TypePack::Variadic(ty)) => Some(*ty),
            _ => None,
        }
    }

    /// Number of types in a pack, if the pack is finite and headful.
    pub fn finite_pack_size(&self, pack: TypePackId) -> Option<usize> {
        let (head, tail) = self.flatten_pack(pack);
        match tail {
            None => Some(head.len()),
            Some(_) => None,
        }
    }

    /// Flatten a pack out to at most `length` head elements, materializing
    /// elements from variadic and free tails as needed.
    ///
    /// A free tail is *mutated*: it becomes a concrete pack of fresh types
    /// followed by a fresh free tail, so that callers can constrain the
    /// elements individually.
    pub fn extend_pack(&mut self, pack: TypePackId, length: usize) -> ExtendedPack {
        let mut head: Vec<TypeId> = Vec::with_capacity(length);
        let mut current = self.follow_pack(pack);

        loop {
            if head.len() == length {
                return ExtendedPack {
                    head,
                    tail: Some(current),
                };
            }

            match self.get_pack(current).clone() {
                TypePack::Pack { head: h, tail } => {
                    let mut rest: SmallVec<[TypeId; limits::PACK_HEAD_INLINE]> = SmallVec::new();
                    for ty in h {
                        if head.len() < length {
                            head.push(ty);
                        } else {
                            rest.push(ty);
                        }
                    }
                    if !rest.is_empty() {
                        let remainder = self.add_pack(TypePack::Pack {
                            head: rest.into_vec(),
                            tail,
                        });
                        return ExtendedPack {
                            head,
                            tail: Some(remainder),
                        };
                    }
                    match tail {
                        Some(t) => current = self.follow_pack(t),
                        None => {
                            return ExtendedPack { head, tail: None };
                        }
                    }
                }
                TypePack::Variadic(ty) => {
                    while head.len() < length {
                        head.push(ty);
                    }
                    return ExtendedPack {
                        head,
                        tail: Some(current),
                    };
                }
                TypePack::Free(FreePack { scope }) => {
                    // Materialize the elements the caller asked for and keep
                    // the remainder free.
                    let mut fresh: Vec<TypeId> = Vec::new();
                    while head.len() < length {
                        let ty = self.fresh_type(scope);
                        head.push(ty);
                        fresh.push(ty);
                    }
                    let new_tail = self.fresh_pack(scope);
                    if let Some(slot) = self.get_pack_mut(current) {
                        *slot = TypePack::Pack {
                            head: fresh,
                            tail: Some(new_tail),
                        };
                    }
                    return ExtendedPack {
                        head,
                        tail: Some(new_tail),
                    };
                }
                TypePack::Error => {
                    while head.len() < length {
                        head.push(TypeId::ERROR);
                    }
                    return ExtendedPack {
                        head,
                        tail: Some(current),
                    };
                }
                TypePack::Generic(_)
                | TypePack::Blocked(_)
                | TypePack::FamilyInstance(_)
                | TypePack::Bound(_) => {
                    return ExtendedPack {
                        head,
                        tail: Some(current),
                    };
                }
            }
        }
    }

    // =========================================================================
    // Structural queries
    // =========================================================================

    /// Could `ty` be a string at runtime? Used for string-keyed indexer
    /// fallbacks.
    pub fn maybe_string(&self, ty: TypeId) -> bool {
        match self.get(self.follow(ty)) {
            Type::Primitive(p) => p.kind == PrimitiveKind::String,
            Type::Singleton(SingletonType::String(_)) => true,
            Type::Any => true,
            _ => false,
        }
    }

    /// Is `ty` definitely a string type?
    pub fn is_string(&self, ty: TypeId) -> bool {
        match self.get(self.follow(ty)) {
            Type::Primitive(p) => p.kind == PrimitiveKind::String,
            Type::Singleton(SingletonType::String(_)) => true,
            _ => false,
        }
    }

    /// Could `ty` admit a singleton? True for singletons and unions
    /// containing one.
    pub fn maybe_singleton(&self, ty: TypeId) -> bool {
        match self.get(self.follow(ty)) {
            Type::Singleton(_) => true,
            Type::Union(parts) => parts
                .iter()
                .any(|p| matches!(self.get(self.follow(*p)), Type::Singleton(_))),
            _ => false,
        }
    }

    // =========================================================================
    // Occurs check
    // =========================================================================

    /// Does `needle` occur inside `haystack` through structural edges?
    ///
    /// Classes are opaque: the traversal does not descend into them. Pending
    /// expansions and family instances are traversed through their argument
    /// lists only.
    pub fn occurs_check(&self, needle: TypeId, haystack: TypeId) -> bool {
        let needle = self.follow(needle);
        let mut seen_types = rustc_hash::FxHashSet::default();
        let mut seen_packs = rustc_hash::FxHashSet::default();
        let mut work_types: Vec<TypeId> = vec![haystack];
        let mut work_packs: Vec<TypePackId> = Vec::new();
        let mut visited = 0usize;

        while !work_types.is_empty() || !work_packs.is_empty() {
            visited += 1;
            if visited > limits::TRAVERSAL_NODE_LIMIT {
                // Give up conservatively: claiming an occurrence makes the
                // caller bind to the error type rather than loop forever.
                return true;
            }

            if let Some(ty) = work_types.pop() {
                let ty = self.follow(ty);
                if ty == needle {
                    return true;
                }
                if !seen_types.insert(ty) {
                    continue;
                }
                match self.get(ty) {
                    Type::Union(parts) | Type::Intersection(parts) => {
                        work_types.extend(parts.iter().copied());
                    }
                    Type::Table(tt) => {
                        for prop in tt.props.values() {
                            if let Some(r) = prop.read_ty {
                                work_types.push(r);
                            }
                            if let Some(w) = prop.write_ty {
                                work_types.push(w);
                            }
                        }
                        if let Some(ix) = &tt.indexer {
                            work_types.push(ix.key_type);
                            work_types.push(ix.value_type);
                        }
                    }
                    Type::Metatable(mt) => {
                        work_types.push(mt.table);
                        work_types.push(mt.metatable);
                    }
                    Type::Function(ft) => {
                        work_packs.push(ft.arg_types);
                        work_packs.push(ft.ret_types);
                    }
                    Type::Free(ft) => {
                        work_types.push(ft.lower_bound);
                        work_types.push(ft.upper_bound);
                    }
                    Type::Local(lt) => work_types.push(lt.domain),
                    Type::PendingExpansion(pe) => {
                        work_types.extend(pe.type_arguments.iter().copied());
                        work_packs.extend(pe.pack_arguments.iter().copied());
                    }
                    Type::FamilyInstance(fi) => {
                        work_types.extend(fi.type_args.iter().copied());
                        work_packs.extend(fi.pack_args.iter().copied());
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
                    Type::Bound(_) => unreachable!("follow returned a bound type"),
                }
                continue;
            }

            if let Some(tp) = work_packs.pop() {
                let tp = self.follow_pack(tp);
                if !seen_packs.insert(tp) {
                    continue;
                }
                match self.get_pack(tp) {
                    TypePack::Pack { head, tail } => {
                        work_types.extend(head.iter().copied());
                        if let Some(t) = tail {
                            work_packs.push(*t);
                        }
                    }
                    TypePack::Variadic(ty) => work_types.push(*ty),
                    TypePack::FamilyInstance(fi) => {
                        work_types.extend(fi.type_args.iter().copied());
                        work_packs.extend(fi.pack_args.iter().copied());
                    }
                    TypePack::Free(_)
                    | TypePack::Generic(_)
                    | TypePack::Blocked(_)
                    | TypePack::Error => {}
                    TypePack::Bound(_) => unreachable!("follow_pack returned a bound pack"),
                }
            }
        }

        false
    }
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/arena_tests.rs"]
mod tests;
