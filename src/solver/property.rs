//! Property access resolution.
//!
//! `lookup_table_prop` is the recursive resolver behind `HasProp` and
//! `SetProp`: it chases the subject through tables, metatables (`__index`),
//! classes, primitives with metatables, free types, unions and
//! intersections, and reports either a result type or the set of
//! placeholders it got stuck on.
//!
//! The resolver is not read-only: free tables grow the requested property,
//! and a free subject gets a synthesized upper-bound table carrying it.

use crate::interner::Atom;
use crate::solver::constraint::ConstraintId;
use crate::solver::simplify::{simplify_intersection, simplify_union};
use crate::solver::solve::ConstraintSolver;
use crate::solver::types::*;
use crate::span::Span;
use rustc_hash::FxHashSet;

impl ConstraintSolver<'_> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn try_dispatch_has_prop(
        &mut self,
        id: ConstraintId,
        subject: TypeId,
        prop: Atom,
        result: TypeId,
        context: ValueContext,
        in_conditional: bool,
        suppress_simplification: bool,
    ) -> bool {
        let subject_ty = self.arena.follow(subject);
        let result_ty = self.arena.follow(result);

        debug_assert!(matches!(self.arena.get(result_ty), Type::Blocked(_)));
        debug_assert!(self.can_mutate(result_ty, id));

        if self.is_blocked_type(subject_ty) {
            return self.block_on_type(subject_ty, id);
        }

        let (blocked, found) =
            self.lookup_table_prop(id, subject_ty, prop, context, in_conditional, suppress_simplification);
        if !blocked.is_empty() {
            for ty in blocked {
                self.block_on_type(ty, id);
            }
            return false;
        }

        self.bind_blocked_type(result_ty, found.unwrap_or(TypeId::ANY), subject, id);
        self.unblock_type(result_ty);
        true
    }

    pub(crate) fn try_dispatch_set_prop(
        &mut self,
        id: ConstraintId,
        _span: Span,
        subject: TypeId,
        path: &[Atom],
        prop_type: TypeId,
        result: TypeId,
    ) -> bool {
        let subject_ty = self.arena.follow(subject);
        let prop_type = self.arena.follow(prop_type);

        if self.is_blocked_type(subject_ty) {
            return self.block_on_type(subject_ty, id);
        }

        debug_assert!(!path.is_empty());
        if path.is_empty() {
            return false;
        }

        // Walk the path; intermediate segments are reads, the leaf a write.
        let mut existing: Option<TypeId> = Some(subject_ty);
        for (i, &segment) in path.iter().enumerate() {
            let Some(current) = existing else { break };
            let context = if i == path.len() - 1 {
                ValueContext::LValue
            } else {
                ValueContext::RValue
            };

            let (blocked, found) = self.lookup_table_prop(id, current, segment, context, false, false);
            if !blocked.is_empty() {
                for ty in blocked {
                    self.block_on_type(ty, id);
                }
                return false;
            }
            existing = found;
        }

        if let Some(existing_ty) = existing {
            self.unify_ty(id, prop_type, existing_ty);
            self.unify_ty(id, existing_ty, prop_type);
            self.bind_blocked_type(result, subject_ty, subject_ty, id);
            self.unblock_type(result);
            return true;
        }

        let original_subject = subject_ty;
        let mut subject_ty = subject_ty;
        if let Type::Metatable(mt) = self.arena.get(subject_ty) {
            subject_ty = self.arena.follow(mt.table);
        }

        match self.arena.get(subject_ty).clone() {
            Type::Free(_) => return false,
            Type::Table(tt) => match tt.state {
                TableState::Free => {
                    debug_assert!(!self.arena.is_persistent(subject_ty));
                    if let Some(Type::Table(slot)) = self.arena.get_mut(subject_ty) {
                        slot.props.insert(path[0], Property::rw(prop_type));
                    }
                    self.bind_blocked_type(result, subject_ty, subject_ty, id);
                    self.unblock_type(result);
                    return true;
                }
                TableState::Unsealed => {
                    debug_assert!(!self.arena.is_persistent(subject_ty));
                    self.update_the_table_type(subject_ty, path, prop_type);
                }
                _ => {}
            },
            _ => {}
        }

        self.bind_blocked_type(result, original_subject, original_subject, id);
        self.unblock_type(result);
        true
    }

    /// Insert `replace_ty` as the leaf-most property of a path of nested
    /// unsealed tables. Fails silently (and mutates nothing) if any table
    /// along the way is sealed or a segment is missing.
    fn update_the_table_type(&mut self, ty: TypeId, path: &[Atom], replace_ty: TypeId) {
        let Some((&last, prefix)) = path.split_last() else {
            return;
        };

        // Validate: unsealed tables all the way down, and the leaf segment
        // must be a new property. We only admit new properties; existing
        // property types are not changed this way.
        let mut current = ty;
        for &segment in prefix {
            if !self.is_unsealed_table(current) {
                return;
            }
            let Type::Table(tt) = self.arena.get(self.arena.follow(current)) else {
                return;
            };
            let Some(next) = tt.props.get(&segment).and_then(|p| p.ty()) else {
                return;
            };
            current = self.arena.follow(next);
        }
        if !self.is_unsealed_table(current) {
            return;
        }
        {
            let Type::Table(tt) = self.arena.get(self.arena.follow(current)) else {
                return;
            };
            if tt.props.contains_key(&last) {
                return;
            }
        }

        let leaf = self.arena.follow(current);
        let target = match self.arena.get(leaf) {
            Type::Metatable(mt) => self.arena.follow(mt.table),
            _ => leaf,
        };
        if let Some(Type::Table(tt)) = self.arena.get_mut(target) {
            tt.props.insert(last, Property::rw(replace_ty));
        }
    }

    fn is_unsealed_table(&self, ty: TypeId) -> bool {
        matches!(
            self.arena.get(self.arena.follow(ty)),
            Type::Table(tt) if tt.state == TableState::Unsealed
        )
    }

    /// Look up a metamethod (`__index`, `__iter`, `__call`) on a value's
    /// metatable, if it has one.
    pub(crate) fn find_metatable_entry(&self, ty: TypeId, entry: Atom) -> Option<TypeId> {
        let ty = self.arena.follow(ty);
        let metatable = match self.arena.get(ty) {
            Type::Metatable(mt) => mt.metatable,
            Type::Primitive(p) => p.metatable?,
            _ => return None,
        };

        let metatable = self.arena.follow(metatable);
        let Type::Table(tt) = self.arena.get(metatable) else {
            return None;
        };
        let found = tt.props.get(&entry).and_then(|p| p.ty())?;
        Some(self.arena.follow(found))
    }

    /// The recursive property resolver. Returns the placeholders that stand
    /// in the way (blockers) and the looked-up type when there is one.
    pub(crate) fn lookup_table_prop(
        &mut self,
        constraint: ConstraintId,
        subject: TypeId,
        prop: Atom,
        context: ValueContext,
        in_conditional: bool,
        suppress_simplification: bool,
    ) -> (Vec<TypeId>, Option<TypeId>) {
        let mut seen = FxHashSet::default();
        self.lookup_table_prop_inner(
            constraint,
            subject,
            prop,
            context,
            in_conditional,
            suppress_simplification,
            &mut seen,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn lookup_table_prop_inner(
        &mut self,
        constraint: ConstraintId,
        subject: TypeId,
        prop: Atom,
        context: ValueContext,
        in_conditional: bool,
        suppress_simplification: bool,
        seen: &mut FxHashSet<TypeId>,
    ) -> (Vec<TypeId>, Option<TypeId>) {
        if !seen.insert(subject) {
            return (Vec::new(), None);
        }

        let subject = self.arena.follow(subject);

        if self.is_blocked_type(subject) {
            return (vec![subject], None);
        }

        match self.arena.get(subject).clone() {
            Type::Any | Type::Never => (Vec::new(), Some(subject)),

            Type::Table(tt) => {
                if let Some(found) = tt.props.get(&prop) {
                    match context {
                        ValueContext::RValue => {
                            if let Some(read) = found.read_ty {
                                return (Vec::new(), Some(read));
                            }
                        }
                        ValueContext::LValue => {
                            if let Some(write) = found.write_ty {
                                return (Vec::new(), Some(write));
                            }
                        }
                    }
                }

                if let Some(indexer) = &tt.indexer {
                    if self.arena.maybe_string(indexer.key_type) {
                        return (Vec::new(), Some(indexer.value_type));
                    }
                }

                if tt.state == TableState::Free {
                    let fresh = self.arena.fresh_type(tt.scope);
                    match context {
                        ValueContext::RValue => {
                            if let Some(Type::Table(slot)) = self.arena.get_mut(subject) {
                                slot.props.entry(prop).or_default().read_ty = Some(fresh);
                            }
                        }
                        ValueContext::LValue => {
                            // A sensed write to an inferred read-only
                            // property upgrades it to read-write with one
                            // common type.
                            if let Some(Type::Table(slot)) = self.arena.get_mut(subject) {
                                if let Some(existing) = slot.props.get_mut(&prop) {
                                    if existing.is_read_only() {
                                        existing.write_ty = existing.read_ty;
                                        let read = existing.read_ty;
                                        return (Vec::new(), read);
                                    }
                                }
                                slot.props.insert(prop, Property::rw(fresh));
                            }
                        }
                    }
                    return (Vec::new(), Some(fresh));
                }

                // In conditional position a missing property reads as
                // `unknown`: the program may be refining it into existence.
                if in_conditional {
                    return (Vec::new(), Some(TypeId::UNKNOWN));
                }

                (Vec::new(), None)
            }

            Type::Metatable(mt) if context == ValueContext::RValue => {
                let (blocked, found) = self.lookup_table_prop_inner(
                    constraint,
                    mt.table,
                    prop,
                    context,
                    in_conditional,
                    suppress_simplification,
                    seen,
                );
                if !blocked.is_empty() || found.is_some() {
                    return (blocked, found);
                }

                let metatable = self.arena.follow(mt.metatable);
                if matches!(self.arena.get(metatable), Type::Blocked(_)) {
                    return (vec![metatable], None);
                }

                match self.arena.get(metatable).clone() {
                    Type::Table(meta_tt) => {
                        let Some(index_ty) = meta_tt
                            .props
                            .get(&self.metamethods.index)
                            .and_then(|p| p.ty())
                        else {
                            return (Vec::new(), found);
                        };
                        let index_ty = self.arena.follow(index_ty);

                        if let Type::Function(ft) = self.arena.get(index_ty).clone() {
                            // An __index function resolves to its first
                            // return; zero returns degrade to nil.
                            let rets = self.arena.extend_pack(ft.ret_types, 1);
                            if rets.head.len() == 1 {
                                (Vec::new(), Some(rets.head[0]))
                            } else {
                                (Vec::new(), Some(TypeId::NIL))
                            }
                        } else {
                            self.lookup_table_prop_inner(
                                constraint,
                                index_ty,
                                prop,
                                context,
                                in_conditional,
                                suppress_simplification,
                                seen,
                            )
                        }
                    }
                    Type::Metatable(_) => self.lookup_table_prop_inner(
                        constraint,
                        metatable,
                        prop,
                        context,
                        in_conditional,
                        suppress_simplification,
                        seen,
                    ),
                    _ => (Vec::new(), found),
                }
            }

            Type::Class(ct) => {
                if let Some(p) = ct.props.get(&prop) {
                    let ty = match context {
                        ValueContext::RValue => p.read_ty,
                        ValueContext::LValue => p.write_ty,
                    };
                    return (Vec::new(), ty);
                }
                if let Some(indexer) = &ct.indexer {
                    return (Vec::new(), Some(indexer.value_type));
                }
                (Vec::new(), None)
            }

            Type::Primitive(pt) => {
                if let Some(metatable) = pt.metatable {
                    let metatable = self.arena.follow(metatable);
                    let Type::Table(meta_tt) = self.arena.get(metatable) else {
                        return (Vec::new(), None);
                    };
                    let Some(index_ty) = meta_tt
                        .props
                        .get(&self.metamethods.index)
                        .and_then(|p| p.ty())
                    else {
                        return (Vec::new(), None);
                    };
                    return self.lookup_table_prop_inner(
                        constraint,
                        index_ty,
                        prop,
                        context,
                        in_conditional,
                        suppress_simplification,
                        seen,
                    );
                }

                if in_conditional && pt.kind == PrimitiveKind::Table {
                    return (Vec::new(), Some(TypeId::UNKNOWN));
                }
                (Vec::new(), None)
            }

            Type::Free(ft) => {
                let upper = self.arena.follow(ft.upper_bound);
                if matches!(self.arena.get(upper), Type::Table(_) | Type::Primitive(_)) {
                    return self.lookup_table_prop_inner(
                        constraint,
                        upper,
                        prop,
                        context,
                        in_conditional,
                        suppress_simplification,
                        seen,
                    );
                }

                // Nothing known about the subject yet: synthesize a free
                // upper-bound table that carries the property and constrain
                // the subject under it.
                let prop_ty = self.arena.fresh_type(ft.scope);
                let mut table = TableType::new(TableState::Free, ft.scope);
                let property = match context {
                    ValueContext::RValue => Property::readonly(prop_ty),
                    ValueContext::LValue => Property::rw(prop_ty),
                };
                table.props.insert(prop, property);
                let new_upper = self.arena.add_type(Type::Table(table));

                self.unify_ty(constraint, subject, new_upper);

                (Vec::new(), Some(prop_ty))
            }

            Type::Union(parts) => {
                let mut blocked = Vec::new();
                let mut options: Vec<TypeId> = Vec::new();

                for part in parts {
                    let (inner_blocked, inner_result) = self.lookup_table_prop_inner(
                        constraint,
                        part,
                        prop,
                        context,
                        in_conditional,
                        suppress_simplification,
                        seen,
                    );
                    blocked.extend(inner_blocked);
                    if let Some(found) = inner_result {
                        if !options.contains(&found) {
                            options.push(found);
                        }
                    }
                }

                if !blocked.is_empty() {
                    return (blocked, None);
                }

                match options.len() {
                    0 => (Vec::new(), None),
                    1 => (Vec::new(), Some(options[0])),
                    2 if !suppress_simplification => {
                        // An lvalue needs the common type of the branches.
                        let combined = if context == ValueContext::LValue {
                            simplify_intersection(&mut self.arena, options[0], options[1])
                        } else {
                            simplify_union(&mut self.arena, options[0], options[1])
                        };
                        (Vec::new(), Some(combined))
                    }
                    _ => {
                        let combined = if context == ValueContext::LValue {
                            self.arena.add_type(Type::Intersection(options))
                        } else {
                            self.arena.add_type(Type::Union(options))
                        };
                        (Vec::new(), Some(combined))
                    }
                }
            }

            Type::Intersection(parts) => {
                let mut blocked = Vec::new();
                let mut options: Vec<TypeId> = Vec::new();

                for part in parts {
                    let (inner_blocked, inner_result) = self.lookup_table_prop_inner(
                        constraint,
                        part,
                        prop,
                        context,
                        in_conditional,
                        suppress_simplification,
                        seen,
                    );
                    blocked.extend(inner_blocked);
                    if let Some(found) = inner_result {
                        if !options.contains(&found) {
                            options.push(found);
                        }
                    }
                }

                if !blocked.is_empty() {
                    return (blocked, None);
                }

                match options.len() {
                    0 => (Vec::new(), None),
                    1 => (Vec::new(), Some(options[0])),
                    2 if !suppress_simplification => {
                        let combined = simplify_intersection(&mut self.arena, options[0], options[1]);
                        (Vec::new(), Some(combined))
                    }
                    _ => {
                        let combined = self.arena.add_type(Type::Intersection(options));
                        (Vec::new(), Some(combined))
                    }
                }
            }

            _ => (Vec::new(), None),
        }
    }
}

#[cfg(test)]
#[path = "tests/property_tests.rs"]
mod tests;
