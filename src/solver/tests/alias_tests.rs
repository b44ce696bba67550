use super::*;
use crate::solver::constraint::ConstraintKind;
use crate::test_fixtures::{Fixture, NullResolver};

fn generic(fixture: &mut Fixture, name: &str) -> TypeId {
    let name = fixture.interner.intern(name);
    fixture.arena.add_type(Type::Generic(GenericType { name }))
}

/// Declare `type <name><params> = <body>` in the root scope.
fn declare_alias(fixture: &mut Fixture, name: &str, params: Vec<GenericTypeParam>, body: TypeId) {
    let name = fixture.interner.intern(name);
    fixture.scopes.get_mut(fixture.root).type_aliases.insert(
        name,
        TypeAlias {
            type_params: params,
            pack_params: Vec::new(),
            ty: body,
        },
    );
}

fn pending(fixture: &mut Fixture, name: &str, args: Vec<TypeId>) -> TypeId {
    let name = fixture.interner.intern(name);
    fixture
        .arena
        .add_type(Type::PendingExpansion(PendingExpansionType {
            prefix: None,
            name,
            type_arguments: args,
            pack_arguments: Vec::new(),
        }))
}

#[test]
fn test_saturate_defaults_reference_earlier_params() {
    let mut fixture = Fixture::new();
    let a = generic(&mut fixture, "A");
    let b = generic(&mut fixture, "B");

    // type T<A, B = A>
    let alias = TypeAlias {
        type_params: vec![
            GenericTypeParam { ty: a, default: None },
            GenericTypeParam { ty: b, default: Some(a) },
        ],
        pack_params: Vec::new(),
        ty: TypeId::NIL,
    };

    let (types, packs) = saturate_arguments(&mut fixture.arena, &alias, &[TypeId::NUMBER], &[]);
    assert_eq!(types, vec![TypeId::NUMBER, TypeId::NUMBER]);
    assert!(packs.is_empty());
}

#[test]
fn test_saturate_fills_missing_defaults_with_error() {
    let mut fixture = Fixture::new();
    let a = generic(&mut fixture, "A");
    let b = generic(&mut fixture, "B");

    let alias = TypeAlias {
        type_params: vec![
            GenericTypeParam { ty: a, default: None },
            GenericTypeParam { ty: b, default: None },
        ],
        pack_params: Vec::new(),
        ty: TypeId::NIL,
    };

    let (types, _) = saturate_arguments(&mut fixture.arena, &alias, &[TypeId::STRING], &[]);
    assert_eq!(types, vec![TypeId::STRING, TypeId::ERROR]);
}

#[test]
fn test_saturate_collects_excess_types_into_pack() {
    let mut fixture = Fixture::new();
    let a = generic(&mut fixture, "A");
    let gp = fixture.arena.add_pack(TypePack::Generic(GenericPack {
        name: fixture.interner.intern("Rest"),
    }));

    let alias = TypeAlias {
        type_params: vec![GenericTypeParam { ty: a, default: None }],
        pack_params: vec![GenericPackParam { tp: gp, default: None }],
        ty: TypeId::NIL,
    };

    let (types, packs) = saturate_arguments(
        &mut fixture.arena,
        &alias,
        &[TypeId::NUMBER, TypeId::STRING, TypeId::BOOLEAN],
        &[],
    );
    assert_eq!(types, vec![TypeId::NUMBER]);
    assert_eq!(packs.len(), 1);
    let (head, tail) = fixture.arena.flatten_pack(packs[0]);
    assert_eq!(head, vec![TypeId::STRING, TypeId::BOOLEAN]);
    assert_eq!(tail, None);
}

#[test]
fn test_saturate_decomposes_singleton_pack_into_type_slot() {
    let mut fixture = Fixture::new();
    let a = generic(&mut fixture, "A");
    let singleton = fixture.arena.add_pack(TypePack::Pack {
        head: vec![TypeId::STRING],
        tail: None,
    });

    let alias = TypeAlias {
        type_params: vec![GenericTypeParam { ty: a, default: None }],
        pack_params: Vec::new(),
        ty: TypeId::NIL,
    };

    let (types, packs) = saturate_arguments(&mut fixture.arena, &alias, &[], &[singleton]);
    assert_eq!(types, vec![TypeId::STRING]);
    assert!(packs.is_empty());
}

#[test]
fn test_saturate_plugs_missing_pack_with_empty() {
    let mut fixture = Fixture::new();
    let a = generic(&mut fixture, "A");
    let gp = fixture.arena.add_pack(TypePack::Generic(GenericPack {
        name: fixture.interner.intern("Rest"),
    }));

    let alias = TypeAlias {
        type_params: vec![GenericTypeParam { ty: a, default: None }],
        pack_params: vec![GenericPackParam { tp: gp, default: None }],
        ty: TypeId::NIL,
    };

    let (types, packs) = saturate_arguments(&mut fixture.arena, &alias, &[TypeId::NUMBER], &[]);
    assert_eq!(types, vec![TypeId::NUMBER]);
    assert_eq!(packs, vec![TypePackId::EMPTY]);
}

#[test]
fn test_unknown_alias_reports_and_binds_error() {
    let mut fixture = Fixture::new();
    let target = pending(&mut fixture, "Missing", vec![]);
    fixture.push(ConstraintKind::TypeAliasExpansion { target });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(target), TypeId::ERROR);
    assert!(matches!(
        solver.errors[0].kind,
        crate::diagnostics::TypeErrorKind::UnknownSymbol { .. }
    ));
}

#[test]
fn test_parameterless_alias_binds_to_body() {
    let mut fixture = Fixture::new();
    let body = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Sealed,
        fixture.root,
    )));
    declare_alias(&mut fixture, "Shape", Vec::new(), body);

    let target = pending(&mut fixture, "Shape", vec![]);
    fixture.push(ConstraintKind::TypeAliasExpansion { target });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(target), body);
}

#[test]
fn test_identity_substitution_binds_to_body() {
    let mut fixture = Fixture::new();
    let a = generic(&mut fixture, "A");
    let mut body_table = TableType::new(TableState::Sealed, fixture.root);
    let value = fixture.interner.intern("value");
    body_table.props.insert(value, Property::rw(a));
    let body = fixture.arena.add_type(Type::Table(body_table));

    declare_alias(
        &mut fixture,
        "Box",
        vec![GenericTypeParam { ty: a, default: None }],
        body,
    );

    // Expanding Box<A> with its own generic is the identity.
    let target = pending(&mut fixture, "Box", vec![a]);
    fixture.push(ConstraintKind::TypeAliasExpansion { target });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(target), body);
}

#[test]
fn test_expansion_substitutes_and_stamps_parameters() {
    let mut fixture = Fixture::new();
    let a = generic(&mut fixture, "A");
    let mut body_table = TableType::new(TableState::Sealed, fixture.root);
    let first = fixture.interner.intern("first");
    body_table.props.insert(first, Property::rw(a));
    let body = fixture.arena.add_type(Type::Table(body_table));

    declare_alias(
        &mut fixture,
        "Box",
        vec![GenericTypeParam { ty: a, default: None }],
        body,
    );

    let target = pending(&mut fixture, "Box", vec![TypeId::NUMBER]);
    fixture.push(ConstraintKind::TypeAliasExpansion { target });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());
    assert!(solver.errors.is_empty());

    let result = solver.arena.follow(target);
    assert_ne!(result, body, "an instantiation must not alias the declared body");
    let Type::Table(tt) = solver.arena.get(result) else {
        panic!("expected a table");
    };
    assert_eq!(tt.props[&first].ty(), Some(TypeId::NUMBER));
    assert_eq!(tt.instantiated_type_params, vec![TypeId::NUMBER]);

    // The declared body still carries the generic.
    let Type::Table(original) = solver.arena.get(body) else {
        panic!("expected a table");
    };
    assert_eq!(original.props[&first].ty(), Some(a));
}

#[test]
fn test_same_signature_expands_to_cached_node() {
    let mut fixture = Fixture::new();
    let a = generic(&mut fixture, "A");
    let mut body_table = TableType::new(TableState::Sealed, fixture.root);
    let first = fixture.interner.intern("first");
    body_table.props.insert(first, Property::rw(a));
    let body = fixture.arena.add_type(Type::Table(body_table));

    declare_alias(
        &mut fixture,
        "Box",
        vec![GenericTypeParam { ty: a, default: None }],
        body,
    );

    let target1 = pending(&mut fixture, "Box", vec![TypeId::NUMBER]);
    let target2 = pending(&mut fixture, "Box", vec![TypeId::NUMBER]);
    fixture.push(ConstraintKind::TypeAliasExpansion { target: target1 });
    fixture.push(ConstraintKind::TypeAliasExpansion { target: target2 });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(target1), solver.arena.follow(target2));
    assert_eq!(solver.instantiated_aliases.len(), 1);
}

#[test]
fn test_infinite_alias_reports_and_terminates() {
    let mut fixture = Fixture::new();
    let a = generic(&mut fixture, "A");

    // type T<A> = T<{A}>: the body is itself a pending expansion of T with
    // a structurally different argument.
    let mut wrapper = TableType::new(TableState::Sealed, fixture.root);
    let item = fixture.interner.intern("item");
    wrapper.props.insert(item, Property::rw(a));
    let wrapped_arg = fixture.arena.add_type(Type::Table(wrapper));

    let body = pending(&mut fixture, "T", vec![wrapped_arg]);
    declare_alias(
        &mut fixture,
        "T",
        vec![GenericTypeParam { ty: a, default: None }],
        body,
    );

    let target = pending(&mut fixture, "T", vec![TypeId::NUMBER]);
    fixture.push(ConstraintKind::TypeAliasExpansion { target });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok(), "the solver must terminate");

    assert_eq!(solver.arena.follow(target), TypeId::ERROR);
    assert!(solver.errors.iter().any(|e| matches!(
        e.kind,
        crate::diagnostics::TypeErrorKind::RecursiveTypeWithDifferentArguments
    )));
}

#[test]
fn test_expansion_queues_nested_pending_work() {
    let mut fixture = Fixture::new();
    let a = generic(&mut fixture, "A");

    // type Inner = {}  (parameterless)
    let inner_body = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Sealed,
        fixture.root,
    )));
    declare_alias(&mut fixture, "Inner", Vec::new(), inner_body);

    // type Outer<A> = {child: Inner, value: A}
    let nested = pending(&mut fixture, "Inner", vec![]);
    let mut outer_table = TableType::new(TableState::Sealed, fixture.root);
    let child = fixture.interner.intern("child");
    let value = fixture.interner.intern("value");
    outer_table.props.insert(child, Property::rw(nested));
    outer_table.props.insert(value, Property::rw(a));
    let outer_body = fixture.arena.add_type(Type::Table(outer_table));
    declare_alias(
        &mut fixture,
        "Outer",
        vec![GenericTypeParam { ty: a, default: None }],
        outer_body,
    );

    let target = pending(&mut fixture, "Outer", vec![TypeId::STRING]);
    fixture.push(ConstraintKind::TypeAliasExpansion { target });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());
    assert!(solver.errors.is_empty());
    assert!(solver.is_done(), "nested expansions must also be solved");

    let result = solver.arena.follow(target);
    let Type::Table(tt) = solver.arena.get(result) else {
        panic!("expected a table");
    };
    let child_ty = solver.arena.follow(tt.props[&child].ty().unwrap());
    assert_eq!(child_ty, inner_body);
}
