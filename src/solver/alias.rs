//! Type alias expansion.
//!
//! A `PendingExpansion` node is an unexpanded reference to a parametric
//! alias (`Pair<number, string>`). Expansion resolves the alias, saturates
//! the argument lists against its parameters, substitutes the arguments
//! into the body, and binds the pending node to the instantiation.
//!
//! Instantiations are cached by `(alias, args, pack-args)` signature so two
//! references to the same application share one node, and the body is
//! scanned for self-expansions with *different* arguments up front: such a
//! type would grow forever, so it is reported and bound to the error type
//! before any substitution happens.

use crate::diagnostics::TypeErrorKind;
use crate::scope::ScopeId;
use crate::solver::arena::TypeArena;
use crate::solver::constraint::ConstraintId;
use crate::solver::solve::ConstraintSolver;
use crate::solver::subst::Substitution;
use crate::solver::types::*;
use crate::solver::visit::{GraphNode, GraphWalk};
use crate::span::Span;
use rustc_hash::FxHashMap;

/// Cache key for one alias application.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstantiationSignature {
    /// Canonical body of the alias being applied.
    pub alias_type: TypeId,
    pub arguments: Vec<TypeId>,
    pub pack_arguments: Vec<TypePackId>,
}

/// Fit provided arguments to an alias's declared parameters.
///
/// - Excess positional types collect into one trailing pack, but only when
///   the alias declares pack parameters to receive it.
/// - A single-element finite pack may decompose into a missing type slot,
///   as long as no pack argument has been consumed yet.
/// - Defaults apply in declaration order and may reference earlier
///   parameters (`type T<A, B = A>`); they are substituted under the
///   mapping built so far.
/// - Remaining holes are filled with the error-recovery type and pack.
pub fn saturate_arguments(
    arena: &mut TypeArena,
    alias: &TypeAlias,
    raw_type_args: &[TypeId],
    raw_pack_args: &[TypePackId],
) -> (Vec<TypeId>, Vec<TypePackId>) {
    let types_required = alias.type_params.len();
    let packs_required = alias.pack_params.len();

    let mut saturated_types: Vec<TypeId> = Vec::with_capacity(types_required);
    let mut extra_types: Vec<TypeId> = Vec::new();
    let mut saturated_packs: Vec<TypePackId> = Vec::with_capacity(packs_required);

    for (i, &ty) in raw_type_args.iter().enumerate() {
        if i < types_required {
            saturated_types.push(ty);
        } else {
            extra_types.push(ty);
        }
    }

    // Overflowing types become a pack, mutually exclusive with the
    // pack-to-type decomposition below.
    if !extra_types.is_empty() && packs_required > 0 {
        let overflow = arena.add_pack(TypePack::Pack {
            head: extra_types.clone(),
            tail: None,
        });
        saturated_packs.push(overflow);
    }

    for &tp in raw_pack_args {
        let single = arena.finite_pack_size(tp) == Some(1);
        if saturated_types.len() < types_required && single && saturated_packs.is_empty() {
            if let Some(first) = arena.first(tp) {
                saturated_types.push(first);
                continue;
            }
        }
        if saturated_packs.len() < packs_required {
            saturated_packs.push(tp);
        }
    }

    let types_provided = saturated_types.len();
    let packs_provided = saturated_packs.len();

    // Providing a pack while leaving type slots short is a user error, not
    // an invitation to defaults; defaults only fill genuinely trailing
    // holes.
    let needs_defaults = (types_provided < types_required && packs_provided == 0)
        || (types_provided == types_required && packs_provided < packs_required);

    if needs_defaults {
        let mut mapping: FxHashMap<TypeId, TypeId> = FxHashMap::default();
        for (i, &ty) in saturated_types.iter().enumerate() {
            mapping.insert(arena.follow(alias.type_params[i].ty), ty);
        }

        for i in types_provided..types_required {
            let Some(default) = alias.type_params[i].default else {
                break;
            };

            let mut subst = Substitution::new();
            for (&from, &to) in &mapping {
                subst.map_type(from, to);
            }
            let instantiated = subst.substitute(arena, default).unwrap_or(TypeId::ERROR);
            mapping.insert(arena.follow(alias.type_params[i].ty), instantiated);
            saturated_types.push(instantiated);
        }

        let mut pack_mapping: FxHashMap<TypePackId, TypePackId> = FxHashMap::default();
        for (i, &tp) in saturated_packs.iter().enumerate() {
            pack_mapping.insert(arena.follow_pack(alias.pack_params[i].tp), tp);
        }

        for i in packs_provided..packs_required {
            let Some(default) = alias.pack_params[i].default else {
                break;
            };

            let mut subst = Substitution::new();
            for (&from, &to) in &mapping {
                subst.map_type(from, to);
            }
            for (&from, &to) in &pack_mapping {
                subst.map_pack(from, to);
            }
            let instantiated = subst
                .substitute_pack(arena, default)
                .unwrap_or(TypePackId::ERROR);
            pack_mapping.insert(arena.follow_pack(alias.pack_params[i].tp), instantiated);
            saturated_packs.push(instantiated);
        }
    }

    // No overflow pack was created and exactly one pack slot is missing:
    // an empty pack is what the user meant.
    if extra_types.is_empty() && saturated_packs.len() + 1 == packs_required {
        saturated_packs.push(TypePackId::EMPTY);
    }

    // Whatever is still missing gets the error type so substitution always
    // has something to put in each slot.
    while saturated_types.len() < types_required {
        saturated_types.push(TypeId::ERROR);
    }
    while saturated_packs.len() < packs_required {
        saturated_packs.push(TypePackId::ERROR);
    }

    debug_assert_eq!(saturated_types.len(), types_required);
    debug_assert_eq!(saturated_packs.len(), packs_required);

    (saturated_types, saturated_packs)
}

impl ConstraintSolver<'_> {
    pub(crate) fn try_dispatch_type_alias_expansion(
        &mut self,
        _id: ConstraintId,
        scope: ScopeId,
        span: Span,
        target: TypeId,
    ) -> bool {
        let target_node = self.arena.follow(target);
        let Type::PendingExpansion(petv) = self.arena.get(target_node).clone() else {
            // Somebody else already resolved it.
            self.unblock_type(target);
            return true;
        };

        let alias = match petv.prefix {
            Some(prefix) => self.scopes.lookup_imported_alias(scope, prefix, petv.name),
            None => self.scopes.lookup_alias(scope, petv.name),
        }
        .cloned();

        let Some(alias) = alias else {
            let name = self.interner.resolve(petv.name).to_string();
            self.report_error(TypeErrorKind::UnknownSymbol { name }, span);
            self.bind_expansion(target, target_node, TypeId::ERROR);
            return true;
        };

        // A parameterless alias is its body.
        if alias.type_params.is_empty() && alias.pack_params.is_empty() {
            self.bind_expansion(target, target_node, alias.ty);
            return true;
        }

        // A corecursive alias of size zero: expanding it would bind the
        // target into its own body.
        if self.arena.occurs_check(target_node, alias.ty) {
            self.report_error(TypeErrorKind::OccursCheckFailed, span);
            self.bind_expansion(target, target_node, TypeId::ERROR);
            return true;
        }

        let (type_args, pack_args) =
            saturate_arguments(&mut self.arena, &alias, &petv.type_arguments, &petv.pack_arguments);

        // The identity substitution short-circuits to the declared body.
        let same_types = type_args.len() == alias.type_params.len()
            && type_args
                .iter()
                .zip(&alias.type_params)
                .all(|(arg, param)| *arg == param.ty);
        let same_packs = pack_args.len() == alias.pack_params.len()
            && pack_args
                .iter()
                .zip(&alias.pack_params)
                .all(|(arg, param)| *arg == param.tp);
        if same_types && same_packs {
            self.bind_expansion(target, target_node, alias.ty);
            return true;
        }

        let signature = InstantiationSignature {
            alias_type: self.arena.follow(alias.ty),
            arguments: type_args.clone(),
            pack_arguments: pack_args.clone(),
        };

        // Same signature, same node: expansion is deterministic.
        if let Some(&cached) = self.instantiated_aliases.get(&signature) {
            self.bind_expansion(target, target_node, cached);
            return true;
        }

        // Scan for a self-expansion with different arguments before
        // substituting: such a type is infinite and must not be expanded.
        if self.find_infinite_expansion(scope, &signature, alias.ty) {
            self.bind_expansion(target, target_node, TypeId::ERROR);
            self.report_error(TypeErrorKind::RecursiveTypeWithDifferentArguments, span);
            return true;
        }

        let mut subst = Substitution::new();
        for (param, &arg) in alias.type_params.iter().zip(&type_args) {
            subst.map_type(self.arena.follow(param.ty), arg);
        }
        for (param, &arg) in alias.pack_params.iter().zip(&pack_args) {
            subst.map_pack(self.arena.follow_pack(param.tp), arg);
        }

        let Some(instantiated) = subst.substitute(&mut self.arena, alias.ty) else {
            self.report_error(TypeErrorKind::CodeTooComplex, span);
            self.bind_expansion(target, target_node, TypeId::ERROR);
            return true;
        };

        let mut result = self.arena.follow(instantiated);

        // The application is not recursive: queue expansion and reduction
        // for whatever the substituted body still carries.
        self.queue_pending_work(scope, span, GraphNode::Type(result));

        // A foreign surface is bound as-is; we never stamp it.
        if self.arena.is_persistent(result) {
            self.bind_expansion(target, target_node, result);
            return true;
        }

        // Substitution returns the declared body unchanged when no
        // parameter is actually used; stamping parameters on the shared
        // body would leak this instantiation into every other one, so clone
        // the table layer first.
        let needs_clone = self.arena.follow(alias.ty) == result;
        let has_table_layer = matches!(
            self.arena.get(result),
            Type::Table(_) | Type::Metatable(_)
        );

        if has_table_layer {
            if needs_clone {
                result = self.clone_table_layer(result);
            }

            let table_node = match self.arena.get(result) {
                Type::Metatable(mt) => self.arena.follow(mt.table),
                _ => result,
            };
            if let Some(Type::Table(tt)) = self.arena.get_mut(table_node) {
                tt.instantiated_type_params = type_args;
                tt.instantiated_pack_params = pack_args;
            }
        }

        self.bind_expansion(target, target_node, result);
        self.instantiated_aliases.insert(signature, result);

        true
    }

    fn bind_expansion(&mut self, target: TypeId, target_node: TypeId, result: TypeId) {
        debug_assert!(matches!(
            self.arena.get(target_node),
            Type::PendingExpansion(_)
        ));
        self.arena.bind_type(target_node, result);
        self.unblock_type(target);
    }

    /// Shallow-clone a table, or a metatable and its inner table. The clone
    /// is what gets parameter lists stamped on it.
    fn clone_table_layer(&mut self, ty: TypeId) -> TypeId {
        let cloned = self.arena.add_type(self.arena.get(ty).clone());
        if let Type::Metatable(mt) = self.arena.get(cloned).clone() {
            let inner = self.arena.follow(mt.table);
            let inner_clone = self.arena.add_type(self.arena.get(inner).clone());
            if let Some(Type::Metatable(slot)) = self.arena.get_mut(cloned) {
                slot.table = inner_clone;
            }
        }
        cloned
    }

    /// Does the alias body contain a pending self-expansion with different
    /// arguments? Saturation runs on each candidate so that defaulted
    /// references compare properly.
    fn find_infinite_expansion(
        &mut self,
        scope: ScopeId,
        signature: &InstantiationSignature,
        body: TypeId,
    ) -> bool {
        let mut pending: Vec<(TypeId, PendingExpansionType)> = Vec::new();
        let mut walk = GraphWalk::from_type(body);
        while let Some(node) = walk.next(&self.arena) {
            if let GraphNode::Type(ty) = node {
                if let Type::PendingExpansion(petv) = self.arena.get(ty) {
                    pending.push((ty, petv.clone()));
                }
            }
        }

        for (_, petv) in pending {
            let alias = match petv.prefix {
                Some(prefix) => self.scopes.lookup_imported_alias(scope, prefix, petv.name),
                None => self.scopes.lookup_alias(scope, petv.name),
            }
            .cloned();
            let Some(alias) = alias else {
                continue;
            };

            let (type_args, pack_args) =
                saturate_arguments(&mut self.arena, &alias, &petv.type_arguments, &petv.pack_arguments);

            if self.arena.follow(alias.ty) == self.arena.follow(signature.alias_type)
                && (type_args != signature.arguments || pack_args != signature.pack_arguments)
            {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
#[path = "tests/alias_tests.rs"]
mod tests;
