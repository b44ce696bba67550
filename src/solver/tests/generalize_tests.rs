use super::*;
use crate::solver::constraint::ConstraintKind;
use crate::test_fixtures::{Fixture, NullResolver};

fn identity_function(fixture: &mut Fixture, param: TypeId) -> TypeId {
    let arg_types = fixture.arena.add_pack(TypePack::Pack {
        head: vec![param],
        tail: None,
    });
    let ret_types = fixture.arena.add_pack(TypePack::Pack {
        head: vec![param],
        tail: None,
    });
    fixture.arena.add_type(Type::Function(FunctionType {
        generics: Vec::new(),
        generic_packs: Vec::new(),
        arg_types,
        ret_types,
    }))
}

#[test]
fn test_generalization_quantifies_in_scope_frees() {
    let mut fixture = Fixture::new();
    let inner_scope = fixture.scopes.alloc_child(fixture.root);
    let param = fixture.arena.fresh_type(inner_scope);
    let source = identity_function(&mut fixture, param);
    let generalized = fixture
        .arena
        .add_type(Type::Blocked(BlockedType { owner: None }));

    fixture.push(ConstraintKind::Generalization {
        source_type: source,
        generalized_type: generalized,
        interior_types: Vec::new(),
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());
    assert!(solver.is_done());

    // The scheme closed over the body's free type.
    assert_eq!(solver.arena.follow(generalized), source);
    let Type::Function(ft) = solver.arena.get(source) else {
        panic!("expected a function");
    };
    assert_eq!(ft.generics.len(), 1);
    let generic = ft.generics[0];
    assert!(matches!(solver.arena.get(generic), Type::Generic(_)));

    // The free type committed to its generic, so the signature reads
    // (a) -> a.
    assert_eq!(solver.arena.follow(param), generic);
}

#[test]
fn test_generalization_ignores_out_of_scope_frees() {
    let mut fixture = Fixture::new();
    let sibling = fixture.scopes.alloc_child(fixture.root);
    let constraint_scope = fixture.scopes.alloc_child(fixture.root);
    let outer = fixture.arena.fresh_type(sibling);
    let source = identity_function(&mut fixture, outer);
    let generalized = fixture
        .arena
        .add_type(Type::Blocked(BlockedType { owner: None }));

    fixture.constraints.push(crate::solver::constraint::Constraint::new(
        constraint_scope,
        crate::span::Span::new(10, 15),
        ConstraintKind::Generalization {
            source_type: source,
            generalized_type: generalized,
            interior_types: Vec::new(),
        },
    ));

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    // The free type belongs to a sibling scope: it must not be captured.
    let Type::Function(ft) = solver.arena.get(source) else {
        panic!("expected a function");
    };
    assert!(ft.generics.is_empty());
    assert!(matches!(solver.arena.get(outer), Type::Free(_)));
}

#[test]
fn test_generalization_settles_interior_types() {
    let mut fixture = Fixture::new();
    let param = fixture.arena.fresh_type(fixture.root);
    let interior = fixture.arena.fresh_type(fixture.root);
    let source = identity_function(&mut fixture, param);
    let generalized = fixture
        .arena
        .add_type(Type::Blocked(BlockedType { owner: None }));

    fixture.push(ConstraintKind::Generalization {
        source_type: source,
        generalized_type: generalized,
        interior_types: vec![interior],
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    let settled = solver.arena.follow(interior);
    assert!(matches!(solver.arena.get(settled), Type::Generic(_)));
}

#[test]
fn test_generalization_blocks_on_blocked_source() {
    let mut fixture = Fixture::new();
    let source = fixture
        .arena
        .add_type(Type::Blocked(BlockedType { owner: None }));
    let generalized = fixture
        .arena
        .add_type(Type::Blocked(BlockedType { owner: None }));

    fixture.push(ConstraintKind::Generalization {
        source_type: source,
        generalized_type: generalized,
        interior_types: Vec::new(),
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    // Nothing ever resolves the source; the constraint stays parked.
    assert!(!solver.is_done());
}
