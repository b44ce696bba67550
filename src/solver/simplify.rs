//! Union and intersection simplification.
//!
//! These are the solver's only set-algebra entry points. They flatten
//! nested connectives, deduplicate members by canonical identity, and apply
//! the absorbing/identity elements:
//!
//! - `X | any = any`, `X | never = X`; an empty union is `never`
//! - `X & never = never`, `X & unknown = X`, `X & any = X`; an empty
//!   intersection is `unknown`
//!
//! `X & any = X` (rather than `any`) keeps refinement intersections stable
//! when a discriminant is force-committed to `any`.

use crate::solver::arena::TypeArena;
use crate::solver::types::{Type, TypeId};

/// Simplified union of exactly two types.
pub fn simplify_union(arena: &mut TypeArena, a: TypeId, b: TypeId) -> TypeId {
    union_of(arena, vec![a, b])
}

/// Simplified intersection of exactly two types.
pub fn simplify_intersection(arena: &mut TypeArena, a: TypeId, b: TypeId) -> TypeId {
    intersection_of(arena, vec![a, b])
}

/// Simplified union of any number of types.
pub fn union_of(arena: &mut TypeArena, types: Vec<TypeId>) -> TypeId {
    let mut flattened: Vec<TypeId> = Vec::new();

    let mut pending = types;
    pending.reverse();
    while let Some(raw) = pending.pop() {
        let ty = arena.follow(raw);
        match arena.get(ty) {
            Type::Any => return TypeId::ANY,
            Type::Never => continue,
            Type::Union(parts) => {
                // Flatten nested unions.
                for part in parts.iter().rev() {
                    pending.push(*part);
                }
            }
            _ => {
                if !flattened.contains(&ty) {
                    flattened.push(ty);
                }
            }
        }
    }

    match flattened.len() {
        0 => TypeId::NEVER,
        1 => flattened[0],
        _ => arena.add_type(Type::Union(flattened)),
    }
}

/// Simplified intersection of any number of types.
pub fn intersection_of(arena: &mut TypeArena, types: Vec<TypeId>) -> TypeId {
    let mut flattened: Vec<TypeId> = Vec::new();

    let mut pending = types;
    pending.reverse();
    while let Some(raw) = pending.pop() {
        let ty = arena.follow(raw);
        match arena.get(ty) {
            Type::Never => return TypeId::NEVER,
            Type::Unknown => continue,
            Type::Any => continue,
            Type::Intersection(parts) => {
                for part in parts.iter().rev() {
                    pending.push(*part);
                }
            }
            _ => {
                if !flattened.contains(&ty) {
                    flattened.push(ty);
                }
            }
        }
    }

    match flattened.len() {
        0 => TypeId::UNKNOWN,
        1 => flattened[0],
        _ => arena.add_type(Type::Intersection(flattened)),
    }
}

/// Remove a leading optional `nil` from a type: `T?` becomes `T`.
/// Non-union types are returned unchanged.
pub fn strip_nil(arena: &mut TypeArena, ty: TypeId) -> TypeId {
    let ty = arena.follow(ty);
    if let Type::Union(parts) = arena.get(ty) {
        let remaining: Vec<TypeId> = parts
            .iter()
            .copied()
            .filter(|p| !matches!(arena.get(arena.follow(*p)), Type::Nil))
            .collect();
        if remaining.len() != parts.len() {
            return union_of(arena, remaining);
        }
    }
    ty
}
