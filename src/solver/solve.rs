//! The constraint solver.
//!
//! `ConstraintSolver::run` drives the unsolved list to quiescence with
//! alternating passes:
//!
//! - a *normal* pass skips blocked constraints and dispatches the rest in
//!   order;
//! - when a normal pass makes no progress, a *force* pass tells handlers
//!   that no further information will arrive: they must commit (possibly
//!   with a diagnostic and a best-effort binding) or fail for good. A force
//!   pass returns after its first success so a normal pass can run with the
//!   new information.
//!
//! Blocking is expressed as graph edges in `blocked` (key → waiting
//! constraints) mirrored by per-constraint counts in `blocked_constraints`,
//! never as suspended control flow.

use crate::diagnostics::{ModuleName, SolveAbort, SolverLimits, TypeError, TypeErrorKind};
use crate::interner::Interner;
use crate::module_resolver::{ModuleRef, ModuleResolver, RequireCycle, SourceKind};
use crate::scope::{ScopeArena, ScopeId};
use crate::solver::arena::TypeArena;
use crate::solver::constraint::{
    Constraint, ConstraintArena, ConstraintId, ConstraintKind,
};
use crate::solver::reduce::{reduce_families, FamilyError, FamilyKey};
use crate::solver::subst::Substitution;
use crate::solver::types::*;
use crate::solver::unify::{IncompleteSubtype, Unifier};
use crate::solver::visit::{collect_pending_work, GraphNode};
use crate::span::{NodeId, Span};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

/// What a constraint can wait on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlockedKey {
    Type(TypeId),
    Pack(TypePackId),
    Constraint(ConstraintId),
}

/// Optional observer for solver progress. Every method has a default no-op
/// body so implementors subscribe only to what they need.
pub trait SolverLog {
    fn capture_initial_state(&mut self, _unsolved: &[ConstraintId]) {}
    /// Called before a dispatch attempt.
    fn prepare_step(&mut self, _constraint: ConstraintId, _force: bool) {}
    /// Called after the prepared dispatch succeeded.
    fn commit_step(&mut self, _constraint: ConstraintId) {}
    fn push_block(&mut self, _constraint: ConstraintId, _key: BlockedKey) {}
    fn pop_block(&mut self, _key: BlockedKey) {}
    fn capture_final_state(&mut self, _unsolved: &[ConstraintId]) {}
}

pub struct ConstraintSolver<'a> {
    pub arena: TypeArena,
    pub interner: Interner,
    pub scopes: ScopeArena,
    pub(crate) metamethods: Metamethods,
    pub(crate) constraints: ConstraintArena,
    pub(crate) root_scope: ScopeId,
    module_name: ModuleName,
    resolver: &'a dyn ModuleResolver,
    require_cycles: Vec<RequireCycle>,
    logger: Option<&'a mut dyn SolverLog>,
    limits: SolverLimits,

    /// Ordered unsolved constraints; scanned front-to-back each pass.
    pub(crate) unsolved: Vec<ConstraintId>,
    /// Inverse blocking index: which constraints wait on each key.
    blocked: FxHashMap<BlockedKey, FxHashSet<ConstraintId>>,
    /// How many distinct keys each constraint currently waits on.
    blocked_constraints: FxHashMap<ConstraintId, usize>,
    /// Outstanding subtyping references per free type; commit decisions
    /// wait until a free type is almost settled.
    pub(crate) unresolved_constraints: FxHashMap<TypeId, usize>,
    /// Cache of alias instantiations keyed by signature.
    pub(crate) instantiated_aliases: FxHashMap<crate::solver::alias::InstantiationSignature, TypeId>,
    /// Family instances known to be uninhabited; no longer blocking.
    pub(crate) uninhabited_families: FxHashSet<FamilyKey>,

    /// Upper-bound contributions per free type, for error rendering.
    pub upper_bound_contributors: FxHashMap<TypeId, Vec<(Span, TypeId)>>,
    pub errors: Vec<TypeError>,
    pub ast_types: FxHashMap<NodeId, TypeId>,
    pub ast_expected_types: FxHashMap<NodeId, TypeId>,
    pub ast_overload_resolved_types: FxHashMap<NodeId, TypeId>,
    pub ast_for_in_next_types: FxHashMap<NodeId, TypeId>,
}

impl<'a> ConstraintSolver<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arena: TypeArena,
        mut interner: Interner,
        scopes: ScopeArena,
        root_scope: ScopeId,
        initial_constraints: Vec<Constraint>,
        module_name: ModuleName,
        resolver: &'a dyn ModuleResolver,
        require_cycles: Vec<RequireCycle>,
        logger: Option<&'a mut dyn SolverLog>,
        limits: SolverLimits,
    ) -> Self {
        let metamethods = Metamethods::intern(&mut interner);

        let mut solver = ConstraintSolver {
            arena,
            interner,
            scopes,
            metamethods,
            constraints: ConstraintArena::new(),
            root_scope,
            module_name,
            resolver,
            require_cycles,
            logger,
            limits,
            unsolved: Vec::new(),
            blocked: FxHashMap::default(),
            blocked_constraints: FxHashMap::default(),
            unresolved_constraints: FxHashMap::default(),
            instantiated_aliases: FxHashMap::default(),
            uninhabited_families: FxHashSet::default(),
            upper_bound_contributors: FxHashMap::default(),
            errors: Vec::new(),
            ast_types: FxHashMap::default(),
            ast_expected_types: FxHashMap::default(),
            ast_overload_resolved_types: FxHashMap::default(),
            ast_for_in_next_types: FxHashMap::default(),
        };

        for constraint in initial_constraints {
            let deps = constraint.dependencies.clone();
            let free_types = constraint.kind.mentioned_free_types(&solver.arena);
            let id = solver.constraints.push(constraint);
            solver.unsolved.push(id);

            for ty in free_types {
                *solver.unresolved_constraints.entry(ty).or_insert(0) += 1;
            }
            for dep in deps {
                solver.block_on_constraint(dep, id);
            }
        }

        solver
    }

    pub fn is_done(&self) -> bool {
        self.unsolved.is_empty()
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn root_scope(&self) -> ScopeId {
        self.root_scope
    }

    /// Shuffle the unsolved list. Ordering must not affect outcomes; this
    /// only changes which order-dependent bugs get exposed. The LCG
    /// (constants from Numerical Recipes) skews slightly; as a debugging
    /// tool that is good enough.
    pub fn randomize(&mut self, seed: u32) {
        if self.unsolved.is_empty() {
            return;
        }

        let mut rng = seed;
        for i in (1..self.unsolved.len()).rev() {
            let j = (rng as usize) % (i + 1);
            self.unsolved.swap(i, j);
            rng = rng.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        }
    }

    // =========================================================================
    // Scheduler
    // =========================================================================

    /// Drive the unsolved list to quiescence.
    pub fn run(&mut self) -> Result<(), SolveAbort> {
        if self.is_done() {
            return Ok(());
        }

        debug!(
            module = %self.module_name,
            constraints = self.unsolved.len(),
            "starting solver"
        );

        if let Some(logger) = self.logger.as_deref_mut() {
            logger.capture_initial_state(&self.unsolved);
        }

        loop {
            let mut progress = self.run_pass(false)?;
            if !progress {
                progress |= self.run_pass(true)?;
            }
            if !progress {
                break;
            }
        }

        if let Some(logger) = self.logger.as_deref_mut() {
            logger.capture_final_state(&self.unsolved);
        }

        debug!(
            module = %self.module_name,
            remaining = self.unsolved.len(),
            errors = self.errors.len(),
            "solver finished"
        );

        Ok(())
    }

    fn run_pass(&mut self, force: bool) -> Result<bool, SolveAbort> {
        let mut progress = false;

        let mut i = 0;
        while i < self.unsolved.len() {
            let id = self.unsolved[i];

            if !force && self.is_blocked_constraint(id) {
                i += 1;
                continue;
            }

            self.check_limits()?;

            if let Some(logger) = self.logger.as_deref_mut() {
                logger.prepare_step(id, force);
            }

            let success = self.try_dispatch(id, force);
            progress |= success;

            if success {
                self.unsolved.remove(i);
                self.unblock_constraint(id);

                // Some kinds create more references to a free type than the
                // subtyping census counted, so saturate at zero.
                let freed = self.constraints.get(id).kind.mentioned_free_types(&self.arena);
                for ty in freed {
                    if let Some(count) = self.unresolved_constraints.get_mut(&ty) {
                        *count = count.saturating_sub(1);
                    }
                }

                if let Some(logger) = self.logger.as_deref_mut() {
                    logger.commit_step(id);
                }
                trace!(constraint = id.0, force, "dispatched");

                // Let a normal pass retry with the new information before
                // forcing anything else.
                if force {
                    return Ok(true);
                }
            } else {
                i += 1;
            }
        }

        Ok(progress)
    }

    fn check_limits(&self) -> Result<(), SolveAbort> {
        if self.limits.deadline_passed() {
            return Err(SolveAbort::TimeLimit(self.module_name.clone()));
        }
        if self.limits.cancelled() {
            return Err(SolveAbort::UserCancel(self.module_name.clone()));
        }
        Ok(())
    }

    // =========================================================================
    // Dispatcher
    // =========================================================================

    /// Dispatch one constraint. True means the constraint made enough
    /// progress to be removed; false means it is still waiting (and has
    /// re-registered its blockers).
    pub(crate) fn try_dispatch(&mut self, id: ConstraintId, force: bool) -> bool {
        if !force && self.is_blocked_constraint(id) {
            return false;
        }

        let constraint = self.constraints.get(id);
        let scope = constraint.scope;
        let span = constraint.span;
        let kind = constraint.kind.clone();

        match kind {
            ConstraintKind::Subtype { sub_type, super_type } => {
                self.try_dispatch_subtype(id, sub_type, super_type)
            }
            ConstraintKind::PackSubtype { sub_pack, super_pack } => {
                self.try_dispatch_pack_subtype(id, sub_pack, super_pack)
            }
            ConstraintKind::Generalization {
                source_type,
                generalized_type,
                interior_types,
            } => self.try_dispatch_generalization(id, scope, span, source_type, generalized_type, &interior_types),
            ConstraintKind::Iterable {
                iterator,
                variables,
                next_ast_fragment,
            } => self.try_dispatch_iterable(id, scope, span, iterator, variables, next_ast_fragment, force),
            ConstraintKind::Name {
                named_type,
                name,
                type_parameters,
                type_pack_parameters,
                synthetic,
            } => self.try_dispatch_name(id, named_type, name, type_parameters, type_pack_parameters, synthetic),
            ConstraintKind::TypeAliasExpansion { target } => {
                self.try_dispatch_type_alias_expansion(id, scope, span, target)
            }
            ConstraintKind::FunctionCall {
                callee,
                args_pack,
                result,
                call_site,
                discriminants,
            } => self.try_dispatch_function_call(id, scope, span, callee, args_pack, result, call_site, &discriminants),
            ConstraintKind::FunctionCheck {
                callee,
                args_pack,
                call_shape,
            } => self.try_dispatch_function_check(id, scope, span, callee, args_pack, &call_shape),
            ConstraintKind::PrimitiveType {
                free_type,
                primitive,
                expected,
            } => self.try_dispatch_primitive_type(id, free_type, primitive, expected),
            ConstraintKind::HasProp {
                subject,
                prop,
                result,
                context,
                in_conditional,
                suppress_simplification,
            } => self.try_dispatch_has_prop(id, subject, prop, result, context, in_conditional, suppress_simplification),
            ConstraintKind::SetProp {
                subject,
                path,
                prop_type,
                result,
            } => self.try_dispatch_set_prop(id, span, subject, &path, prop_type, result),
            ConstraintKind::HasIndexer { subject, index, result } => {
                self.try_dispatch_has_indexer(id, span, subject, index, result)
            }
            ConstraintKind::SetIndexer { subject, index, prop } => {
                self.try_dispatch_set_indexer(id, scope, span, subject, index, prop)
            }
            ConstraintKind::Unpack {
                source,
                result,
                result_is_lvalue,
            } => self.try_dispatch_unpack(id, scope, source, result, result_is_lvalue),
            ConstraintKind::Unpack1 {
                source,
                result,
                result_is_lvalue,
            } => self.try_dispatch_unpack_one(id, scope, source, result, result_is_lvalue),
            ConstraintKind::Reduce { ty } => self.try_dispatch_reduce(id, span, GraphNode::Type(ty), force),
            ConstraintKind::ReducePack { pack } => {
                self.try_dispatch_reduce(id, span, GraphNode::Pack(pack), force)
            }
            ConstraintKind::Equality {
                result_type,
                assignment_type,
            } => self.try_dispatch_equality(id, result_type, assignment_type),
        }
    }

    // =========================================================================
    // Simple handlers
    // =========================================================================

    fn try_dispatch_subtype(&mut self, id: ConstraintId, sub_type: TypeId, super_type: TypeId) -> bool {
        if self.is_blocked_type(sub_type) {
            return self.block_on_type(sub_type, id);
        }
        if self.is_blocked_type(super_type) {
            return self.block_on_type(super_type, id);
        }

        self.unify_ty(id, sub_type, super_type);
        true
    }

    fn try_dispatch_pack_subtype(&mut self, id: ConstraintId, sub_pack: TypePackId, super_pack: TypePackId) -> bool {
        if self.is_blocked_pack(sub_pack) {
            return self.block_on_pack(sub_pack, id);
        }
        if self.is_blocked_pack(super_pack) {
            return self.block_on_pack(super_pack, id);
        }

        self.unify_tp(id, sub_pack, super_pack);
        true
    }

    /// Equality is mutual subtyping: both orderings go through the unifier.
    fn try_dispatch_equality(&mut self, id: ConstraintId, result_type: TypeId, assignment_type: TypeId) -> bool {
        self.unify_ty(id, result_type, assignment_type);
        self.unify_ty(id, assignment_type, result_type);
        true
    }

    fn try_dispatch_name(
        &mut self,
        id: ConstraintId,
        named_type: TypeId,
        name: crate::interner::Atom,
        type_parameters: Vec<TypeId>,
        type_pack_parameters: Vec<TypePackId>,
        synthetic: bool,
    ) -> bool {
        if self.is_blocked_type(named_type) {
            return self.block_on_type(named_type, id);
        }

        let target = self.arena.follow(named_type);

        if self.arena.is_persistent(target) {
            return true;
        }

        match self.arena.get(target).clone() {
            Type::Table(_) => {
                if let Some(Type::Table(tt)) = self.arena.get_mut(target) {
                    if synthetic && tt.name.is_none() {
                        tt.synthetic_name = Some(name);
                    } else {
                        tt.name = Some(name);
                        tt.instantiated_type_params = type_parameters;
                        tt.instantiated_pack_params = type_pack_parameters;
                    }
                }
                true
            }
            Type::Metatable(_) => {
                if let Some(Type::Metatable(mt)) = self.arena.get_mut(target) {
                    mt.synthetic_name = Some(name);
                }
                true
            }
            // Nothing to attach a name to (yet).
            Type::Union(_) | Type::Intersection(_) => true,
            _ => self.block_on_type(named_type, id),
        }
    }

    fn try_dispatch_reduce(&mut self, id: ConstraintId, span: Span, root: GraphNode, force: bool) -> bool {
        let result = reduce_families(&mut self.arena, root, &self.uninhabited_families, force);

        for ty in &result.reduced_types {
            self.unblock_type(*ty);
        }
        for tp in &result.reduced_packs {
            self.unblock_pack(*tp);
        }

        let finished = result.finished();

        if force || finished {
            // Fully dispatching: intern uninhabited instances so dependents
            // no longer consider them blocking.
            for error in &result.errors {
                match *error {
                    FamilyError::UninhabitedType(ty) => {
                        self.report_error(TypeErrorKind::UninhabitedTypeFamily { ty }, span);
                        self.uninhabited_families.insert(FamilyKey::Type(ty));
                        self.unblock_type(ty);
                    }
                    FamilyError::UninhabitedPack(pack) => {
                        self.report_error(TypeErrorKind::UninhabitedTypePackFamily { pack }, span);
                        self.uninhabited_families.insert(FamilyKey::Pack(pack));
                        self.unblock_pack(pack);
                    }
                }
            }
        }

        if force {
            return true;
        }

        for ty in result.blocked_types {
            self.block_on_type(ty, id);
        }
        for tp in result.blocked_packs {
            self.block_on_pack(tp, id);
        }

        finished
    }

    // =========================================================================
    // Blocking index
    // =========================================================================

    /// Insert a blocking edge. True when the edge is new; `block` is
    /// idempotent on `(key, constraint)`.
    fn block_key(&mut self, key: BlockedKey, constraint: ConstraintId) -> bool {
        let set = self.blocked.entry(key).or_default();
        if !set.insert(constraint) {
            return false;
        }
        *self.blocked_constraints.entry(constraint).or_insert(0) += 1;
        true
    }

    /// Block `constraint` on a type. Returns false so that handlers can
    /// `return self.block_on_type(...)` to mean "not dispatched".
    pub(crate) fn block_on_type(&mut self, target: TypeId, constraint: ConstraintId) -> bool {
        let key = BlockedKey::Type(self.arena.follow(target));
        if self.block_key(key, constraint) {
            if let Some(logger) = self.logger.as_deref_mut() {
                logger.push_block(constraint, key);
            }
            trace!(constraint = constraint.0, ?key, "blocked");
        }
        false
    }

    pub(crate) fn block_on_pack(&mut self, target: TypePackId, constraint: ConstraintId) -> bool {
        let key = BlockedKey::Pack(self.arena.follow_pack(target));
        if self.block_key(key, constraint) {
            if let Some(logger) = self.logger.as_deref_mut() {
                logger.push_block(constraint, key);
            }
            trace!(constraint = constraint.0, ?key, "blocked");
        }
        false
    }

    pub(crate) fn block_on_constraint(&mut self, target: ConstraintId, constraint: ConstraintId) {
        let key = BlockedKey::Constraint(target);
        if self.block_key(key, constraint) {
            if let Some(logger) = self.logger.as_deref_mut() {
                logger.push_block(constraint, key);
            }
            trace!(constraint = constraint.0, on = target.0, "blocked on constraint");
        }
    }

    /// Every constraint blocked on `source` becomes additionally blocked on
    /// `addition`. Used when dispatch spawns follow-up constraints that
    /// stand in for the original.
    pub(crate) fn inherit_blocks(&mut self, source: ConstraintId, addition: ConstraintId) {
        let waiting: Vec<ConstraintId> = self
            .blocked
            .get(&BlockedKey::Constraint(source))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        for constraint in waiting {
            self.block_on_constraint(addition, constraint);
        }
    }

    fn unblock_key(&mut self, key: &BlockedKey) {
        if let Some(set) = self.blocked.remove(key) {
            for constraint in set {
                if let Some(count) = self.blocked_constraints.get_mut(&constraint) {
                    // A zero here means `blocked` and `blocked_constraints`
                    // desynchronized; the skip logic depends on this count.
                    debug_assert!(*count > 0, "blocking index desynchronized");
                    *count = count.saturating_sub(1);
                }
            }
        }
    }

    pub(crate) fn unblock_constraint(&mut self, constraint: ConstraintId) {
        let key = BlockedKey::Constraint(constraint);
        if let Some(logger) = self.logger.as_deref_mut() {
            logger.pop_block(key);
        }
        self.unblock_key(&key);
    }

    /// Unblock a type and every representative its bound chain resolves to,
    /// each visited at most once. A revisit means the graph has a self-bound
    /// cycle, which the binding discipline is supposed to make impossible.
    pub(crate) fn unblock_type(&mut self, ty: TypeId) {
        let mut seen: FxHashSet<TypeId> = FxHashSet::default();
        let mut progressed = ty;
        loop {
            if !seen.insert(progressed) {
                panic!("unblock encountered a self-bound type");
            }

            let key = BlockedKey::Type(progressed);
            if let Some(logger) = self.logger.as_deref_mut() {
                logger.pop_block(key);
            }
            self.unblock_key(&key);

            match self.arena.get(progressed) {
                Type::Bound(next) => progressed = *next,
                _ => break,
            }
        }
    }

    pub(crate) fn unblock_pack(&mut self, tp: TypePackId) {
        let key = BlockedKey::Pack(tp);
        if let Some(logger) = self.logger.as_deref_mut() {
            logger.pop_block(key);
        }
        self.unblock_key(&key);
    }

    pub(crate) fn is_blocked_constraint(&self, constraint: ConstraintId) -> bool {
        self.blocked_constraints
            .get(&constraint)
            .is_some_and(|count| *count > 0)
    }

    /// Is this type still waiting to be computed by somebody?
    pub(crate) fn is_blocked_type(&self, ty: TypeId) -> bool {
        let ty = self.arena.follow(ty);

        match self.arena.get(ty) {
            Type::Local(lt) => lt.block_count > 0,
            Type::FamilyInstance(_) => !self.uninhabited_families.contains(&FamilyKey::Type(ty)),
            Type::Blocked(_) | Type::PendingExpansion(_) => true,
            _ => false,
        }
    }

    pub(crate) fn is_blocked_pack(&self, tp: TypePackId) -> bool {
        let tp = self.arena.follow_pack(tp);

        match self.arena.get_pack(tp) {
            TypePack::FamilyInstance(_) => !self.uninhabited_families.contains(&FamilyKey::Pack(tp)),
            TypePack::Blocked(_) => true,
            _ => false,
        }
    }

    /// Does this free type still have outstanding subtyping constraints?
    pub(crate) fn has_unresolved_constraints(&self, ty: TypeId) -> bool {
        self.unresolved_constraints
            .get(&ty)
            .is_some_and(|count| *count > 0)
    }

    // =========================================================================
    // Constraint synthesis
    // =========================================================================

    /// Allocate a solver-synthesized constraint and append it to the
    /// unsolved list.
    pub(crate) fn push_constraint(&mut self, scope: ScopeId, span: Span, kind: ConstraintKind) -> ConstraintId {
        let id = self.constraints.push(Constraint::new(scope, span, kind));
        self.unsolved.push(id);
        id
    }

    /// Queue follow-up constraints for everything pending inside `root`:
    /// alias expansions and family reductions.
    pub(crate) fn queue_pending_work(&mut self, scope: ScopeId, span: Span, root: GraphNode) {
        let work = collect_pending_work(&self.arena, root);
        for ty in work.pending_expansions {
            self.push_constraint(scope, span, ConstraintKind::TypeAliasExpansion { target: ty });
        }
        for ty in work.family_types {
            self.push_constraint(scope, span, ConstraintKind::Reduce { ty });
        }
        for tp in work.family_packs {
            self.push_constraint(scope, span, ConstraintKind::ReducePack { pack: tp });
        }
    }

    /// After a substitution copied part of the graph, requeue reduction for
    /// any family instances among the copies.
    pub(crate) fn reproduce_constraints(&mut self, scope: ScopeId, span: Span, subst: &Substitution) {
        for &ty in &subst.new_types {
            if matches!(self.arena.get(ty), Type::FamilyInstance(_)) {
                self.push_constraint(scope, span, ConstraintKind::Reduce { ty });
            }
        }
        for &tp in &subst.new_packs {
            if matches!(self.arena.get_pack(tp), TypePack::FamilyInstance(_)) {
                self.push_constraint(scope, span, ConstraintKind::ReducePack { pack: tp });
            }
        }
    }

    // =========================================================================
    // Unify bridge
    // =========================================================================

    pub(crate) fn unify_ty(&mut self, constraint: ConstraintId, sub: TypeId, sup: TypeId) -> bool {
        self.unify_impl(constraint, IncompleteSubtype::Types { sub, sup })
    }

    pub(crate) fn unify_tp(&mut self, constraint: ConstraintId, sub: TypePackId, sup: TypePackId) -> bool {
        self.unify_impl(constraint, IncompleteSubtype::Packs { sub, sup })
    }

    fn unify_impl(&mut self, constraint: ConstraintId, job: IncompleteSubtype) -> bool {
        let mut unifier = Unifier::new(&mut self.arena);
        let ok = match job {
            IncompleteSubtype::Types { sub, sup } => unifier.unify(sub, sup),
            IncompleteSubtype::Packs { sub, sup } => unifier.unify_packs(sub, sup),
        };

        let incomplete = std::mem::take(&mut unifier.incomplete_subtypes);
        let expanded = std::mem::take(&mut unifier.expanded_free_types);
        let too_complex = unifier.too_complex;
        drop(unifier);

        let (scope, span) = {
            let c = self.constraints.get(constraint);
            (c.scope, c.span)
        };

        // Comparisons the unifier could not finish become fresh constraints
        // that stand in for the caller.
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
            self.inherit_blocks(constraint, addition);
        }

        if too_complex {
            self.report_error(TypeErrorKind::UnificationTooComplex, span);
        }

        if !ok {
            self.report_error(TypeErrorKind::OccursCheckFailed, span);
            return false;
        }

        for (expanded_ty, additions) in expanded {
            let entry = self.upper_bound_contributors.entry(expanded_ty).or_default();
            for addition in additions {
                entry.push((span, addition));
            }
        }

        match job {
            IncompleteSubtype::Types { sub, sup } => {
                self.unblock_type(sub);
                self.unblock_type(sup);
            }
            IncompleteSubtype::Packs { sub, sup } => {
                self.unblock_pack(sub);
                self.unblock_pack(sup);
            }
        }

        true
    }

    // =========================================================================
    // Binding
    // =========================================================================

    /// Bind a blocked placeholder to `result`. Binding a node to itself is
    /// meaningless; in that case a fresh free type is allocated in the
    /// scope of `root` (the subject the placeholder was derived from).
    pub(crate) fn bind_blocked_type(
        &mut self,
        blocked: TypeId,
        result: TypeId,
        root: TypeId,
        constraint: ConstraintId,
    ) {
        let result = self.arena.follow(result);

        debug_assert!(
            matches!(self.arena.get(blocked), Type::Blocked(_)),
            "bind_blocked_type on a non-blocked node"
        );
        debug_assert!(self.can_mutate(blocked, constraint));

        if blocked == result {
            let root = self.arena.follow(root);
            let scope = match self.arena.get(root) {
                Type::Free(ft) => ft.scope,
                Type::Table(tt) if tt.state == TableState::Free => tt.scope,
                _ => panic!("bind_blocked_type could not find a scope for a fresh type"),
            };
            let fresh = self.arena.fresh_type(scope);
            self.arena.bind_type(blocked, fresh);
        } else {
            self.arena.bind_type(blocked, result);
        }
    }

    /// The owner discipline: a blocked node may only be bound by its owning
    /// constraint (or by anybody when no owner was declared).
    pub(crate) fn can_mutate(&self, ty: TypeId, constraint: ConstraintId) -> bool {
        match self.arena.get(ty) {
            Type::Blocked(b) => b.owner.is_none() || b.owner == Some(constraint),
            _ => true,
        }
    }

    // =========================================================================
    // Modules
    // =========================================================================

    /// Resolve a require to the single type its module returns.
    pub fn resolve_module(&mut self, info: &ModuleRef, span: Span) -> TypeId {
        if info.name.is_empty() {
            self.report_error(TypeErrorKind::UnknownRequire { name: String::new() }, span);
            return TypeId::ERROR;
        }

        // A require participating in a known cycle quietly produces `any`;
        // the cycle itself was already reported by the driver.
        for cycle in &self.require_cycles {
            if cycle.path.first().is_some_and(|first| *first == info.name) {
                return TypeId::ANY;
            }
        }

        let Some(module) = self.resolver.get_module(&info.name) else {
            if !self.resolver.module_exists(&info.name) && !info.optional {
                self.report_error(
                    TypeErrorKind::UnknownRequire {
                        name: self.resolver.human_readable_name(&info.name),
                    },
                    span,
                );
            }
            return TypeId::ERROR;
        };

        if module.source_kind != SourceKind::Module {
            self.report_error(
                TypeErrorKind::IllegalRequire {
                    module: module.human_readable_name.clone(),
                    reason: "it is not a module and does not return a type surface".to_string(),
                },
                span,
            );
            return TypeId::ERROR;
        }

        let return_pack = self.arena.follow_pack(module.return_type);
        if matches!(self.arena.get_pack(return_pack), TypePack::Error) {
            return TypeId::ERROR;
        }

        let (head, _) = self.arena.flatten_pack(return_pack);
        if head.len() != 1 {
            self.report_error(
                TypeErrorKind::IllegalRequire {
                    module: module.human_readable_name,
                    reason: "it must return exactly one value".to_string(),
                },
                span,
            );
            return TypeId::ERROR;
        }

        head[0]
    }

    /// Replace generics in a module's return pack with `any` so that no
    /// quantified variable leaks across the module boundary.
    pub fn anyify_module_return_generics(&mut self, tp: TypePackId) -> TypePackId {
        let tp = self.arena.follow_pack(tp);

        if let TypePack::Variadic(ty) = self.arena.get_pack(tp) {
            let ty = self.arena.follow(*ty);
            return if matches!(self.arena.get(ty), Type::Generic(_)) {
                TypePackId::ANY
            } else {
                tp
            };
        }

        if !matches!(self.arena.get_pack(tp), TypePack::Pack { .. }) {
            return tp;
        }

        let (head, tail) = self.arena.flatten_pack(tp);
        let result_head: Vec<TypeId> = head
            .into_iter()
            .map(|ty| {
                let ty = self.arena.follow(ty);
                if matches!(self.arena.get(ty), Type::Generic(_)) {
                    TypeId::ANY
                } else {
                    ty
                }
            })
            .collect();
        let result_tail = tail.map(|t| self.anyify_module_return_generics(t));

        self.arena.add_pack(TypePack::Pack {
            head: result_head,
            tail: result_tail,
        })
    }

    // =========================================================================
    // Errors
    // =========================================================================

    pub(crate) fn report_error(&mut self, kind: TypeErrorKind, span: Span) {
        self.errors.push(TypeError {
            span,
            module_name: self.module_name.clone(),
            kind,
        });
    }
}

#[cfg(test)]
#[path = "tests/solve_tests.rs"]
mod tests;
