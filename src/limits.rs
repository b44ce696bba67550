//! Centralized limits and thresholds for the inference engine.
//!
//! This module provides shared constants for recursion depths, operation
//! counts, and capacity limits used throughout the solver. Centralizing
//! these values:
//! - Prevents duplicate definitions with inconsistent values
//! - Makes it easy to tune limits for constrained environments
//! - Documents the rationale for each limit

// =============================================================================
// Recursion Depth Limits
// =============================================================================
// These turn would-be stack overflows in recursive algorithms into
// deterministic diagnostics.

/// Maximum depth for recursive constraint dispatch (indexer resolution,
/// property lookup over deeply nested subjects).
pub const SOLVER_RECURSION_LIMIT: u32 = 500;

/// Maximum depth for the substitution engine when cloning or instantiating
/// type graphs. Deeply nested alias bodies beyond this report a
/// code-too-complex diagnostic instead of recursing further.
pub const SUBSTITUTION_DEPTH_LIMIT: u32 = 500;

/// Maximum depth for structural unification. Recursive type comparisons
/// beyond this bail out without binding.
pub const UNIFY_DEPTH_LIMIT: u32 = 100;

/// Maximum number of free types the quantifier will close over in a single
/// generalization before reporting code-too-complex.
pub const GENERALIZATION_VAR_LIMIT: usize = 1_000;

// =============================================================================
// Operation Count Limits
// =============================================================================
// These prevent runaway loops in iterative algorithms.

/// Maximum length of a `Bound` indirection chain that `follow` will chase.
/// A well-formed graph never approaches this; hitting it indicates a cycle.
pub const FOLLOW_CHAIN_LIMIT: u32 = 10_000;

/// Maximum nodes visited by a single graph traversal (occurs check,
/// free-type census, blocked-type scan).
pub const TRAVERSAL_NODE_LIMIT: usize = 100_000;

// =============================================================================
// Capacity Limits
// =============================================================================

/// Inline capacity for pack heads and other short type lists.
/// Most packs carry 1-3 elements; 4 fit in a SmallVec without spilling.
pub const PACK_HEAD_INLINE: usize = 4;

/// Head elements an iterable is extended to: `(next, state, first-index)`.
pub const ITERATOR_HEAD_LIMIT: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_are_sane() {
        assert!(SOLVER_RECURSION_LIMIT >= 100);
        assert!(FOLLOW_CHAIN_LIMIT > SOLVER_RECURSION_LIMIT);
        assert!(PACK_HEAD_INLINE >= ITERATOR_HEAD_LIMIT - 1);
    }
}
