use super::*;
use crate::solver::constraint::ConstraintKind;
use crate::test_fixtures::{Fixture, NullResolver};

fn blocked(fixture: &mut Fixture) -> TypeId {
    fixture
        .arena
        .add_type(Type::Blocked(BlockedType { owner: None }))
}

#[test]
fn test_has_prop_reads_sealed_table() {
    let mut fixture = Fixture::new();
    let mut table = TableType::new(TableState::Sealed, fixture.root);
    let x = fixture.interner.intern("x");
    table.props.insert(x, Property::rw(TypeId::NUMBER));
    let subject = fixture.arena.add_type(Type::Table(table));

    let result = blocked(&mut fixture);
    fixture.push(ConstraintKind::HasProp {
        subject,
        prop: x,
        result,
        context: ValueContext::RValue,
        in_conditional: false,
        suppress_simplification: false,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(result), TypeId::NUMBER);
}

#[test]
fn test_has_prop_missing_resolves_to_any() {
    let mut fixture = Fixture::new();
    let table = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Sealed,
        fixture.root,
    )));
    let missing = fixture.interner.intern("missing");

    let result = blocked(&mut fixture);
    fixture.push(ConstraintKind::HasProp {
        subject: table,
        prop: missing,
        result,
        context: ValueContext::RValue,
        in_conditional: false,
        suppress_simplification: false,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(result), TypeId::ANY);
}

#[test]
fn test_conditional_context_reads_missing_prop_as_unknown() {
    let mut fixture = Fixture::new();
    let table = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Sealed,
        fixture.root,
    )));
    let maybe = fixture.interner.intern("maybe");

    let result = blocked(&mut fixture);
    fixture.push(ConstraintKind::HasProp {
        subject: table,
        prop: maybe,
        result,
        context: ValueContext::RValue,
        in_conditional: true,
        suppress_simplification: false,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(result), TypeId::UNKNOWN);
}

#[test]
fn test_free_table_lvalue_lookup_round_trips() {
    let mut fixture = Fixture::new();
    let subject = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Free,
        fixture.root,
    )));
    let p = fixture.interner.intern("p");
    fixture.push(ConstraintKind::Subtype {
        sub_type: TypeId::NUMBER,
        super_type: TypeId::NUMBER,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);

    let (blockers, found) =
        solver.lookup_table_prop(ConstraintId(0), subject, p, ValueContext::LValue, false, false);
    assert!(blockers.is_empty());
    let found = found.expect("a free table grows the property");

    // Reading the property back yields the same type.
    let Type::Table(tt) = solver.arena.get(subject) else {
        panic!("expected a table");
    };
    assert_eq!(tt.props[&p].read_ty, Some(found));
    assert_eq!(tt.props[&p].write_ty, Some(found));

    let (_, again) =
        solver.lookup_table_prop(ConstraintId(0), subject, p, ValueContext::LValue, false, false);
    assert_eq!(again, Some(found));
}

#[test]
fn test_write_to_inferred_readonly_prop_upgrades_it() {
    let mut fixture = Fixture::new();
    let mut table = TableType::new(TableState::Free, fixture.root);
    let p = fixture.interner.intern("p");
    table.props.insert(p, Property::readonly(TypeId::NUMBER));
    let subject = fixture.arena.add_type(Type::Table(table));
    fixture.push(ConstraintKind::Subtype {
        sub_type: TypeId::NUMBER,
        super_type: TypeId::NUMBER,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);

    let (_, found) =
        solver.lookup_table_prop(ConstraintId(0), subject, p, ValueContext::LValue, false, false);
    assert_eq!(found, Some(TypeId::NUMBER));

    let Type::Table(tt) = solver.arena.get(subject) else {
        panic!("expected a table");
    };
    assert_eq!(tt.props[&p].write_ty, Some(TypeId::NUMBER));
}

#[test]
fn test_metatable_index_table_fallback() {
    let mut fixture = Fixture::new();
    let p = fixture.interner.intern("p");

    let mut index_table = TableType::new(TableState::Sealed, fixture.root);
    index_table.props.insert(p, Property::rw(TypeId::STRING));
    let index_target = fixture.arena.add_type(Type::Table(index_table));

    let mut meta = TableType::new(TableState::Sealed, fixture.root);
    let index_name = fixture.interner.intern("__index");
    meta.props.insert(index_name, Property::rw(index_target));
    let metatable = fixture.arena.add_type(Type::Table(meta));

    let inner = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Sealed,
        fixture.root,
    )));
    let subject = fixture.arena.add_type(Type::Metatable(MetatableType {
        table: inner,
        metatable,
        synthetic_name: None,
    }));

    let result = blocked(&mut fixture);
    fixture.push(ConstraintKind::HasProp {
        subject,
        prop: p,
        result,
        context: ValueContext::RValue,
        in_conditional: false,
        suppress_simplification: false,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(result), TypeId::STRING);
}

#[test]
fn test_metatable_index_function_uses_first_return() {
    let mut fixture = Fixture::new();
    let p = fixture.interner.intern("p");

    let ret_types = fixture.arena.add_pack(TypePack::Pack {
        head: vec![TypeId::BOOLEAN],
        tail: None,
    });
    let index_fn = fixture.arena.add_type(Type::Function(FunctionType {
        generics: Vec::new(),
        generic_packs: Vec::new(),
        arg_types: TypePackId::EMPTY,
        ret_types,
    }));

    let mut meta = TableType::new(TableState::Sealed, fixture.root);
    let index_name = fixture.interner.intern("__index");
    meta.props.insert(index_name, Property::rw(index_fn));
    let metatable = fixture.arena.add_type(Type::Table(meta));

    let inner = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Sealed,
        fixture.root,
    )));
    let subject = fixture.arena.add_type(Type::Metatable(MetatableType {
        table: inner,
        metatable,
        synthetic_name: None,
    }));

    let result = blocked(&mut fixture);
    fixture.push(ConstraintKind::HasProp {
        subject,
        prop: p,
        result,
        context: ValueContext::RValue,
        in_conditional: false,
        suppress_simplification: false,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(result), TypeId::BOOLEAN);
}

#[test]
fn test_union_subject_combines_branch_results() {
    let mut fixture = Fixture::new();
    let p = fixture.interner.intern("p");

    let mut t1 = TableType::new(TableState::Sealed, fixture.root);
    t1.props.insert(p, Property::rw(TypeId::NUMBER));
    let t1 = fixture.arena.add_type(Type::Table(t1));

    let mut t2 = TableType::new(TableState::Sealed, fixture.root);
    t2.props.insert(p, Property::rw(TypeId::STRING));
    let t2 = fixture.arena.add_type(Type::Table(t2));

    let subject = fixture.arena.add_type(Type::Union(vec![t1, t2]));

    let result = blocked(&mut fixture);
    fixture.push(ConstraintKind::HasProp {
        subject,
        prop: p,
        result,
        context: ValueContext::RValue,
        in_conditional: false,
        suppress_simplification: false,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    let combined = solver.arena.follow(result);
    let Type::Union(parts) = solver.arena.get(combined) else {
        panic!("expected a union, got {:?}", solver.arena.get(combined));
    };
    assert_eq!(parts, &vec![TypeId::NUMBER, TypeId::STRING]);
}

#[test]
fn test_free_subject_synthesizes_upper_bound_table() {
    let mut fixture = Fixture::new();
    let p = fixture.interner.intern("p");
    let subject = fixture.arena.fresh_type(fixture.root);

    let result = blocked(&mut fixture);
    fixture.push(ConstraintKind::HasProp {
        subject,
        prop: p,
        result,
        context: ValueContext::RValue,
        in_conditional: false,
        suppress_simplification: false,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    let found = solver.arena.follow(result);
    assert!(matches!(solver.arena.get(found), Type::Free(_)));

    // The subject's upper bound now carries the property.
    let Type::Free(ft) = solver.arena.get(subject) else {
        panic!("subject should stay free");
    };
    let upper = solver.arena.follow(ft.upper_bound);
    let Type::Table(tt) = solver.arena.get(upper) else {
        panic!("expected an upper-bound table");
    };
    assert_eq!(tt.props[&p].read_ty, Some(found));
    assert!(tt.props[&p].is_read_only());
}

#[test]
fn test_class_props_and_indexer() {
    let mut fixture = Fixture::new();
    let p = fixture.interner.intern("p");
    let other = fixture.interner.intern("other");

    let mut props = rustc_hash::FxHashMap::default();
    props.insert(p, Property::rw(TypeId::NUMBER));
    let class = fixture.arena.add_type(Type::Class(ClassType {
        name: fixture.interner.intern("Widget"),
        props,
        indexer: Some(TableIndexer {
            key_type: TypeId::STRING,
            value_type: TypeId::BOOLEAN,
        }),
    }));

    let r1 = blocked(&mut fixture);
    fixture.push(ConstraintKind::HasProp {
        subject: class,
        prop: p,
        result: r1,
        context: ValueContext::RValue,
        in_conditional: false,
        suppress_simplification: false,
    });
    let r2 = blocked(&mut fixture);
    fixture.push(ConstraintKind::HasProp {
        subject: class,
        prop: other,
        result: r2,
        context: ValueContext::RValue,
        in_conditional: false,
        suppress_simplification: false,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(r1), TypeId::NUMBER);
    assert_eq!(solver.arena.follow(r2), TypeId::BOOLEAN);
}

#[test]
fn test_set_prop_installs_on_free_table() {
    let mut fixture = Fixture::new();
    let p = fixture.interner.intern("p");
    let subject = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Free,
        fixture.root,
    )));
    let result = blocked(&mut fixture);

    fixture.push(ConstraintKind::SetProp {
        subject,
        path: vec![p],
        prop_type: TypeId::NUMBER,
        result,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    // The write created the property on the free table itself; the result
    // threads the subject through.
    assert_eq!(solver.arena.follow(result), subject);
    let Type::Table(tt) = solver.arena.get(subject) else {
        panic!("expected a table");
    };
    assert!(tt.props.contains_key(&p));
}

#[test]
fn test_set_prop_admits_new_leaf_through_unsealed_path() {
    let mut fixture = Fixture::new();
    let a = fixture.interner.intern("a");
    let b = fixture.interner.intern("b");

    let leaf = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Unsealed,
        fixture.root,
    )));
    let mut outer = TableType::new(TableState::Unsealed, fixture.root);
    outer.props.insert(a, Property::rw(leaf));
    let subject = fixture.arena.add_type(Type::Table(outer));

    let result = blocked(&mut fixture);
    fixture.push(ConstraintKind::SetProp {
        subject,
        path: vec![a, b],
        prop_type: TypeId::STRING,
        result,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    let Type::Table(tt) = solver.arena.get(leaf) else {
        panic!("expected a table");
    };
    assert_eq!(tt.props[&b].ty(), Some(TypeId::STRING));
    assert_eq!(solver.arena.follow(result), subject);
}

#[test]
fn test_set_prop_refuses_to_extend_sealed_table() {
    let mut fixture = Fixture::new();
    let p = fixture.interner.intern("p");
    let subject = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Sealed,
        fixture.root,
    )));
    let result = blocked(&mut fixture);

    fixture.push(ConstraintKind::SetProp {
        subject,
        path: vec![p],
        prop_type: TypeId::NUMBER,
        result,
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    // No property appears, but the constraint still resolves.
    let Type::Table(tt) = solver.arena.get(subject) else {
        panic!("expected a table");
    };
    assert!(!tt.props.contains_key(&p));
    assert_eq!(solver.arena.follow(result), subject);
}
