use super::*;
use crate::interner::Atom;
use crate::scope::ScopeArena;

fn setup() -> (TypeArena, crate::scope::ScopeId) {
    let mut scopes = ScopeArena::new();
    let root = scopes.alloc_root();
    (TypeArena::new(), root)
}

#[test]
fn test_free_subtype_narrows_upper_bound() {
    let (mut arena, root) = setup();
    let free = arena.fresh_type(root);

    let mut unifier = Unifier::new(&mut arena);
    assert!(unifier.unify(free, TypeId::NUMBER));
    assert_eq!(unifier.expanded_free_types[&free], vec![TypeId::NUMBER]);
    drop(unifier);

    let Type::Free(ft) = arena.get(free) else {
        panic!("free type should stay free");
    };
    assert_eq!(ft.upper_bound, TypeId::NUMBER);
    assert_eq!(ft.lower_bound, TypeId::NEVER);
}

#[test]
fn test_free_supertype_widens_lower_bound() {
    let (mut arena, root) = setup();
    let free = arena.fresh_type(root);

    let mut unifier = Unifier::new(&mut arena);
    assert!(unifier.unify(TypeId::STRING, free));
    drop(unifier);

    let Type::Free(ft) = arena.get(free) else {
        panic!("free type should stay free");
    };
    assert_eq!(ft.lower_bound, TypeId::STRING);
    assert_eq!(ft.upper_bound, TypeId::UNKNOWN);
}

#[test]
fn test_free_meets_generic_binds() {
    let (mut arena, root) = setup();
    let free = arena.fresh_type(root);
    let generic = arena.add_type(Type::Generic(GenericType { name: Atom(1) }));

    let mut unifier = Unifier::new(&mut arena);
    assert!(unifier.unify(free, generic));
    drop(unifier);

    assert_eq!(arena.follow(free), generic);
}

#[test]
fn test_generic_meets_concrete_records_substitution() {
    let (mut arena, _) = setup();
    let generic = arena.add_type(Type::Generic(GenericType { name: Atom(1) }));

    let mut unifier = Unifier::new(&mut arena);
    assert!(unifier.unify(TypeId::NUMBER, generic));
    assert_eq!(unifier.generic_substitutions[&generic], TypeId::NUMBER);
}

#[test]
fn test_blocked_side_defers_as_incomplete() {
    let (mut arena, _) = setup();
    let blocked = arena.add_type(Type::Blocked(BlockedType { owner: None }));

    let mut unifier = Unifier::new(&mut arena);
    assert!(unifier.unify(blocked, TypeId::NUMBER));
    assert_eq!(
        unifier.incomplete_subtypes,
        vec![IncompleteSubtype::Types {
            sub: blocked,
            sup: TypeId::NUMBER
        }]
    );
    drop(unifier);

    // No binding happened.
    assert!(matches!(arena.get(blocked), Type::Blocked(_)));
}

#[test]
fn test_occurs_violation_fails() {
    let (mut arena, root) = setup();
    let free = arena.fresh_type(root);

    let mut table = TableType::new(TableState::Sealed, root);
    table.props.insert(Atom(1), Property::rw(free));
    let cyclic = arena.add_type(Type::Table(table));

    let mut unifier = Unifier::new(&mut arena);
    assert!(!unifier.unify(free, cyclic));
}

#[test]
fn test_function_unification_flows_through_packs() {
    let (mut arena, root) = setup();
    let free_arg = arena.fresh_type(root);

    // overload: (number) -> (string)
    let overload_args = arena.add_pack(TypePack::Pack {
        head: vec![TypeId::NUMBER],
        tail: None,
    });
    let overload_rets = arena.add_pack(TypePack::Pack {
        head: vec![TypeId::STRING],
        tail: None,
    });
    let overload = arena.add_type(Type::Function(FunctionType {
        generics: Vec::new(),
        generic_packs: Vec::new(),
        arg_types: overload_args,
        ret_types: overload_rets,
    }));

    // inferred: (free_arg) -> free_pack
    let inferred_args = arena.add_pack(TypePack::Pack {
        head: vec![free_arg],
        tail: None,
    });
    let inferred_rets = arena.fresh_pack(root);
    let inferred = arena.add_type(Type::Function(FunctionType {
        generics: Vec::new(),
        generic_packs: Vec::new(),
        arg_types: inferred_args,
        ret_types: inferred_rets,
    }));

    let mut unifier = Unifier::new(&mut arena);
    assert!(unifier.unify(overload, inferred));
    drop(unifier);

    // Arguments are contravariant: the call argument is constrained under
    // the parameter type.
    let Type::Free(ft) = arena.get(free_arg) else {
        panic!("arg should stay free");
    };
    assert_eq!(ft.upper_bound, TypeId::NUMBER);

    // The free result pack commits to the overload's returns.
    let (ret_head, _) = arena.flatten_pack(inferred_rets);
    assert_eq!(ret_head, vec![TypeId::STRING]);
}

#[test]
fn test_variadic_packs_unify_elementwise() {
    let (mut arena, root) = setup();
    let free = arena.fresh_type(root);
    let sub = arena.add_pack(TypePack::Variadic(free));
    let sup = arena.add_pack(TypePack::Variadic(TypeId::NUMBER));

    let mut unifier = Unifier::new(&mut arena);
    assert!(unifier.unify_packs(sub, sup));
    drop(unifier);

    let Type::Free(ft) = arena.get(free) else {
        panic!("free type should stay free");
    };
    assert_eq!(ft.upper_bound, TypeId::NUMBER);
}

#[test]
fn test_local_domain_widens_from_either_side() {
    let (mut arena, _) = setup();
    let local = arena.add_type(Type::Local(LocalType {
        domain: TypeId::NEVER,
        block_count: 1,
        name: Atom(1),
    }));

    let mut unifier = Unifier::new(&mut arena);
    assert!(unifier.unify(local, TypeId::NUMBER));
    drop(unifier);

    let Type::Local(lt) = arena.get(local) else {
        panic!("local should stay local");
    };
    assert_eq!(lt.domain, TypeId::NUMBER);
    // Unification never touches the assignment count.
    assert_eq!(lt.block_count, 1);
}
