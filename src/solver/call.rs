//! Function call resolution and bidirectional call checking.
//!
//! `FunctionCall` drives a call site to a result pack: short-circuits for
//! `error`/`never` callees, collapse of degenerate unions, `__call`
//! rewriting, overload selection, unification of the chosen overload
//! against a synthesized `(args) -> result` type, and explicit
//! instantiation of the results from whatever generic substitutions the
//! unifier discovered.
//!
//! `FunctionCheck` pushes expected types *down* into literal and lambda
//! arguments before checking happens, with the callee's generics replaced
//! by `unknown` so the generics themselves never become expected types.

use crate::scope::ScopeId;
use crate::solver::constraint::{CallArgKind, CallShape, ConstraintId, ConstraintKind};
use crate::solver::solve::ConstraintSolver;
use crate::solver::subst::{instantiate_pack, Substitution};
use crate::solver::types::*;
use crate::solver::unify::{IncompleteSubtype, Unifier};
use crate::solver::visit::GraphNode;
use crate::span::{NodeId, Span};
use tracing::trace;

impl ConstraintSolver<'_> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn try_dispatch_function_call(
        &mut self,
        id: ConstraintId,
        scope: ScopeId,
        span: Span,
        callee: TypeId,
        args_pack: TypePackId,
        result: TypePackId,
        call_site: Option<NodeId>,
        discriminants: &[Option<TypeId>],
    ) -> bool {
        let mut fn_ty = self.arena.follow(callee);
        let mut args_pack = self.arena.follow_pack(args_pack);
        let result = self.arena.follow_pack(result);

        if self.is_blocked_type(fn_ty) || self.has_unresolved_constraints(fn_ty) {
            return self.block_on_type(callee, id);
        }

        // Calling an error is an error; calling never never happens.
        if matches!(self.arena.get(fn_ty), Type::Error) {
            self.arena.bind_pack(result, TypePackId::ERROR);
            self.unblock_pack(result);
            return true;
        }
        if matches!(self.arena.get(fn_ty), Type::Never) {
            self.arena.bind_pack(result, TypePackId::NEVER);
            self.unblock_pack(result);
            return true;
        }

        let (mut args_head, args_tail) = self.arena.flatten_pack(args_pack);

        let mut blocked = false;
        for &arg in &args_head {
            if self.is_blocked_type(arg) {
                self.block_on_type(arg, id);
                blocked = true;
            }
        }
        if let Some(tail) = args_tail {
            if self.is_blocked_pack(tail) {
                self.block_on_pack(tail, id);
                blocked = true;
            }
        }
        if blocked {
            return false;
        }

        // A union or intersection whose members all follow to one node is
        // that node.
        match self.arena.get(fn_ty).clone() {
            Type::Union(parts) | Type::Intersection(parts) => {
                if let Some(collapsed) = self.collapse(&parts) {
                    fn_ty = collapsed;
                }
            }
            _ => {}
        }

        // A `__call` metamethod turns `f(...)` into `mt.__call(f, ...)`.
        if let Some(call_mm) = self.find_metatable_entry(fn_ty, self.metamethods.call) {
            args_head.insert(0, fn_ty);

            if let Some(tail) = args_tail {
                if self.is_blocked_pack(tail) {
                    return self.block_on_pack(tail, id);
                }
            }

            args_pack = self.arena.add_pack(TypePack::Pack {
                head: args_head,
                tail: args_tail,
            });
            fn_ty = self.arena.follow(call_mm);
        }

        // The callee will be unified against `(args) -> result`; the result
        // pack participates as a free pack from here on.
        if let Some(slot) = self.arena.get_pack_mut(result) {
            *slot = TypePack::Free(FreePack { scope });
        }

        // Discriminants that never resolved commit to `any`: with
        // `T & any = T` and `T & ~any = T`, an unresolved refinement
        // changes nothing.
        for discriminant in discriminants.iter().flatten() {
            let ty = self.arena.follow(*discriminant);
            if self.is_blocked_type(ty) {
                if let Some(slot) = self.arena.get_mut(ty) {
                    *slot = Type::Bound(TypeId::ANY);
                }
                self.unblock_type(ty);
            }
        }

        let overload = self.select_overload(fn_ty, args_pack);
        trace!(callee = fn_ty.0, overload = overload.0, "resolving call");

        let inferred = self.arena.add_type(Type::Function(FunctionType {
            generics: Vec::new(),
            generic_packs: Vec::new(),
            arg_types: args_pack,
            ret_types: result,
        }));

        // Unify directly (not through the bridge): the generic
        // substitutions must survive for the instantiation step below.
        let mut unifier = Unifier::new(&mut self.arena);
        let occurs_ok = unifier.unify(overload, inferred);
        let substitutions = std::mem::take(&mut unifier.generic_substitutions);
        let pack_substitutions = std::mem::take(&mut unifier.generic_pack_substitutions);
        let incomplete = std::mem::take(&mut unifier.incomplete_subtypes);
        let expanded = std::mem::take(&mut unifier.expanded_free_types);
        drop(unifier);

        for item in incomplete {
            let kind = match item {
                IncompleteSubtype::Types { sub, sup } => ConstraintKind::Subtype {
                    sub_type: sub,
                    super_type: sup,
                },
                IncompleteSubtype::Packs { sub, sup } => ConstraintKind::PackSubtype {
                    sub_pack: sub,
                    super_pack: sup,
                },
            };
            let addition = self.push_constraint(scope, span, kind);
            self.inherit_blocks(id, addition);
        }

        // Generic substitutions discovered during unification materialize
        // fresh instantiations of the result pack.
        if !substitutions.is_empty() || !pack_substitutions.is_empty() {
            let instantiated =
                instantiate_pack(&mut self.arena, substitutions, pack_substitutions, result);
            match instantiated {
                Some((new_result, subst)) => {
                    if new_result != result {
                        self.arena.bind_pack(result, new_result);
                    }
                    self.reproduce_constraints(scope, span, &subst);
                }
                None => {
                    self.report_error(crate::diagnostics::TypeErrorKind::CodeTooComplex, span);
                    self.arena.bind_pack(result, TypePackId::ERROR);
                }
            }
        }

        for (expanded_ty, additions) in expanded {
            let entry = self.upper_bound_contributors.entry(expanded_ty).or_default();
            for addition in additions {
                entry.push((span, addition));
            }
        }

        if occurs_ok {
            if let Some(site) = call_site {
                self.ast_overload_resolved_types.insert(site, inferred);
            }
        }

        self.unblock_pack(result);

        self.queue_pending_work(scope, span, GraphNode::Type(overload));
        self.queue_pending_work(scope, span, GraphNode::Type(inferred));

        true
    }

    /// If every member follows to the same node, that node.
    fn collapse(&self, parts: &[TypeId]) -> Option<TypeId> {
        let first = self.arena.follow(*parts.first()?);
        parts
            .iter()
            .all(|p| self.arena.follow(*p) == first)
            .then_some(first)
    }

    /// Pick one arity-compatible member of an overloaded callee. Falls back
    /// to the callee itself when nothing fits.
    fn select_overload(&self, fn_ty: TypeId, args_pack: TypePackId) -> TypeId {
        let fn_ty = self.arena.follow(fn_ty);
        let Type::Intersection(parts) = self.arena.get(fn_ty) else {
            return fn_ty;
        };

        let (args_head, args_tail) = self.arena.flatten_pack(args_pack);

        for part in parts {
            let part = self.arena.follow(*part);
            let Type::Function(ft) = self.arena.get(part) else {
                continue;
            };
            let (params, param_tail) = self.arena.flatten_pack(ft.arg_types);

            let compatible = args_head.len() == params.len()
                || (args_head.len() > params.len() && param_tail.is_some())
                || (args_head.len() < params.len() && args_tail.is_some());
            if compatible {
                return part;
            }
        }

        fn_ty
    }

    pub(crate) fn try_dispatch_function_check(
        &mut self,
        id: ConstraintId,
        scope: ScopeId,
        span: Span,
        callee: TypeId,
        args_pack: TypePackId,
        call_shape: &CallShape,
    ) -> bool {
        let mut fn_ty = self.arena.follow(callee);
        let args_pack = self.arena.follow_pack(args_pack);

        if self.is_blocked_type(fn_ty) {
            return self.block_on_type(fn_ty, id);
        }
        if self.is_blocked_pack(args_pack) {
            return true;
        }

        // Bidirectional checking only applies to a known, non-overloaded
        // function.
        let Type::Function(mut ftv) = self.arena.get(fn_ty).clone() else {
            return true;
        };

        // Replace the callee's generics with `unknown`/`...unknown` before
        // pushing expected types: pushing the generics themselves would
        // manufacture a loop.
        if !ftv.generics.is_empty() || !ftv.generic_packs.is_empty() {
            let mut subst = Substitution::new();
            for &g in &ftv.generics {
                subst.map_type(self.arena.follow(g), TypeId::UNKNOWN);
            }
            for &g in &ftv.generic_packs {
                subst.map_pack(self.arena.follow_pack(g), TypePackId::UNKNOWN);
            }

            if let Some(replaced) = subst.substitute(&mut self.arena, fn_ty) {
                fn_ty = replaced;
                if let Type::Function(replaced_ftv) = self.arena.get(fn_ty).clone() {
                    ftv = replaced_ftv;
                }
                // The replacement may have copied family instances; their
                // reduce constraints must be reproduced.
                self.reproduce_constraints(scope, span, &subst);
            }
        }

        let (expected_args, _) = self.arena.flatten_pack(ftv.arg_types);
        let (actual_args, _) = self.arena.flatten_pack(args_pack);

        // A self call's type pack has one more element than the written
        // argument list; the self type takes no part in this.
        let offset = usize::from(call_shape.self_call);

        for (i, arg) in call_shape.args.iter().enumerate() {
            let slot = i + offset;
            if slot >= expected_args.len() || slot >= actual_args.len() {
                break;
            }

            let expected = self.arena.follow(expected_args[slot]);
            let actual = self.arena.follow(actual_args[slot]);

            self.ast_expected_types.insert(arg.node, expected);

            match &arg.kind {
                CallArgKind::Lambda { annotated } => {
                    let (Type::Function(expected_fn), Type::Function(actual_fn)) =
                        (self.arena.get(expected).clone(), self.arena.get(actual).clone())
                    else {
                        continue;
                    };

                    let (expected_params, _) = self.arena.flatten_pack(expected_fn.arg_types);
                    let (actual_params, _) = self.arena.flatten_pack(actual_fn.arg_types);

                    for j in 0..expected_params.len().min(actual_params.len()).min(annotated.len()) {
                        let actual_param = self.arena.follow(actual_params[j]);
                        if !annotated[j] && matches!(self.arena.get(actual_param), Type::Free(_)) {
                            // An unannotated lambda parameter takes the
                            // expected parameter type outright.
                            self.arena.bind_type(actual_param, expected_params[j]);
                        }
                    }
                }
                CallArgKind::Constant => {
                    let mut unifier = Unifier::new(&mut self.arena);
                    unifier.unify(actual, expected);
                }
                CallArgKind::TableLiteral => {
                    let mut to_block = Vec::new();
                    self.match_literal_type(expected, actual, arg.node, &mut to_block);
                    if !to_block.is_empty() {
                        for ty in to_block {
                            self.block_on_type(ty, id);
                        }
                        return false;
                    }
                }
                CallArgKind::Other => {}
            }
        }

        true
    }

    /// Bidirectional matching of a table literal against its expected type.
    /// Placeholder property types on either side are reported in
    /// `to_block`; blocked/free literal members are committed to the
    /// expected member type.
    fn match_literal_type(
        &mut self,
        expected: TypeId,
        actual: TypeId,
        node: NodeId,
        to_block: &mut Vec<TypeId>,
    ) {
        let expected = self.arena.follow(expected);
        let actual = self.arena.follow(actual);

        if self.is_blocked_type(expected) {
            to_block.push(expected);
            return;
        }

        let (Type::Table(expected_tt), Type::Table(actual_tt)) =
            (self.arena.get(expected).clone(), self.arena.get(actual).clone())
        else {
            let mut unifier = Unifier::new(&mut self.arena);
            unifier.unify(actual, expected);
            return;
        };

        if actual_tt.flags.contains(TableFlags::FRESH_LITERAL) {
            self.ast_types.insert(node, actual);
        }

        for (name, actual_prop) in &actual_tt.props {
            let Some(actual_ty) = actual_prop.ty() else {
                continue;
            };
            let actual_ty = self.arena.follow(actual_ty);

            if let Some(expected_prop) = expected_tt.props.get(name) {
                let Some(expected_ty) = expected_prop.ty() else {
                    continue;
                };
                let expected_ty = self.arena.follow(expected_ty);

                if self.is_blocked_type(expected_ty) {
                    to_block.push(expected_ty);
                    continue;
                }

                match self.arena.get(actual_ty).clone() {
                    Type::Blocked(_) | Type::Free(_) => {
                        self.arena.bind_type(actual_ty, expected_ty);
                        self.unblock_type(actual_ty);
                    }
                    Type::Table(_) if matches!(self.arena.get(expected_ty), Type::Table(_)) => {
                        self.match_literal_type(expected_ty, actual_ty, node, to_block);
                    }
                    _ => {
                        let mut unifier = Unifier::new(&mut self.arena);
                        unifier.unify(actual_ty, expected_ty);
                    }
                }
            } else if let Some(indexer) = &expected_tt.indexer {
                // Excess members fall back to a string-keyed indexer.
                if self.arena.maybe_string(indexer.key_type) {
                    let value = indexer.value_type;
                    let mut unifier = Unifier::new(&mut self.arena);
                    unifier.unify(actual_ty, value);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/call_tests.rs"]
mod tests;
