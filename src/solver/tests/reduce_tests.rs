use super::*;
use crate::solver::arena::TypeArena;
use rustc_hash::FxHashSet;

fn union_instance(arena: &mut TypeArena, args: Vec<TypeId>) -> TypeId {
    arena.add_type(Type::FamilyInstance(FamilyInstanceType {
        family: TypeFamily::Union,
        type_args: args,
        pack_args: Vec::new(),
    }))
}

#[test]
fn test_union_family_reduces_when_args_are_ready() {
    let mut arena = TypeArena::new();
    let instance = union_instance(&mut arena, vec![TypeId::NUMBER, TypeId::STRING]);

    let result = reduce_families(
        &mut arena,
        GraphNode::Type(instance),
        &FxHashSet::default(),
        false,
    );

    assert_eq!(result.reduced_types, vec![instance]);
    assert!(result.finished());

    let reduced = arena.follow(instance);
    let Type::Union(parts) = arena.get(reduced) else {
        panic!("expected a union, got {:?}", arena.get(reduced));
    };
    assert_eq!(parts, &vec![TypeId::NUMBER, TypeId::STRING]);
}

#[test]
fn test_union_family_collapses_duplicates() {
    let mut arena = TypeArena::new();
    let instance = union_instance(&mut arena, vec![TypeId::NUMBER, TypeId::NUMBER]);

    let result = reduce_families(
        &mut arena,
        GraphNode::Type(instance),
        &FxHashSet::default(),
        false,
    );

    assert!(result.finished());
    assert_eq!(arena.follow(instance), TypeId::NUMBER);
}

#[test]
fn test_blocked_argument_blocks_reduction() {
    let mut arena = TypeArena::new();
    let blocked = arena.add_type(Type::Blocked(BlockedType { owner: None }));
    let instance = union_instance(&mut arena, vec![TypeId::NUMBER, blocked]);

    let result = reduce_families(
        &mut arena,
        GraphNode::Type(instance),
        &FxHashSet::default(),
        false,
    );

    assert!(!result.finished());
    assert_eq!(result.blocked_types, vec![blocked]);
    assert!(matches!(arena.get(instance), Type::FamilyInstance(_)));
}

#[test]
fn test_nested_families_reduce_inside_out() {
    let mut arena = TypeArena::new();
    let inner = union_instance(&mut arena, vec![TypeId::NUMBER, TypeId::NUMBER]);
    let outer = union_instance(&mut arena, vec![inner, TypeId::STRING]);

    let result = reduce_families(
        &mut arena,
        GraphNode::Type(outer),
        &FxHashSet::default(),
        false,
    );

    assert!(result.finished());
    assert_eq!(arena.follow(inner), TypeId::NUMBER);
    let Type::Union(parts) = arena.get(arena.follow(outer)) else {
        panic!("expected a union");
    };
    assert_eq!(parts, &vec![TypeId::NUMBER, TypeId::STRING]);
}

#[test]
fn test_intersect_family_with_never_argument() {
    let mut arena = TypeArena::new();
    let instance = arena.add_type(Type::FamilyInstance(FamilyInstanceType {
        family: TypeFamily::Intersect,
        type_args: vec![TypeId::NUMBER, TypeId::NEVER],
        pack_args: Vec::new(),
    }));

    let result = reduce_families(
        &mut arena,
        GraphNode::Type(instance),
        &FxHashSet::default(),
        false,
    );

    // A never argument makes never an honest answer, not an uninhabited
    // family.
    assert!(result.errors.is_empty());
    assert!(result.finished());
    assert_eq!(arena.follow(instance), TypeId::NEVER);
}

#[test]
fn test_pack_family_reduces_to_singleton_pack() {
    let mut arena = TypeArena::new();
    let instance = arena.add_pack(TypePack::FamilyInstance(FamilyInstancePack {
        family: TypeFamily::Union,
        type_args: vec![TypeId::NUMBER, TypeId::STRING],
        pack_args: Vec::new(),
    }));

    let result = reduce_families(
        &mut arena,
        GraphNode::Pack(instance),
        &FxHashSet::default(),
        false,
    );

    assert_eq!(result.reduced_packs, vec![instance]);
    let (head, tail) = arena.flatten_pack(instance);
    assert_eq!(head.len(), 1);
    assert_eq!(tail, None);
    assert!(matches!(arena.get(arena.follow(head[0])), Type::Union(_)));
}
