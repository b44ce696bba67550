use super::*;
use crate::solver::constraint::ConstraintKind;
use crate::test_fixtures::{Fixture, NullResolver};
use crate::span::NodeId;

fn local(fixture: &mut Fixture, name: &str) -> TypeId {
    let name = fixture.interner.intern(name);
    fixture.arena.add_type(Type::Local(LocalType {
        domain: TypeId::NEVER,
        block_count: 1,
        name,
    }))
}

fn variables(fixture: &mut Fixture, locals: &[TypeId]) -> TypePackId {
    fixture.arena.add_pack(TypePack::Pack {
        head: locals.to_vec(),
        tail: None,
    })
}

fn function(fixture: &mut Fixture, args: Vec<TypeId>, rets: Vec<TypeId>) -> TypeId {
    let arg_types = fixture.arena.add_pack(TypePack::Pack {
        head: args,
        tail: None,
    });
    let ret_types = fixture.arena.add_pack(TypePack::Pack {
        head: rets,
        tail: None,
    });
    fixture.arena.add_type(Type::Function(FunctionType {
        generics: Vec::new(),
        generic_packs: Vec::new(),
        arg_types,
        ret_types,
    }))
}

fn iterable(fixture: &mut Fixture, iteratee: TypeId, vars: TypePackId) {
    let iterator = fixture.arena.add_pack(TypePack::Pack {
        head: vec![iteratee],
        tail: None,
    });
    fixture.push(ConstraintKind::Iterable {
        iterator,
        variables: vars,
        next_ast_fragment: NodeId(7),
    });
}

#[test]
fn test_indexer_table_binds_key_value_pairs() {
    let mut fixture = Fixture::new();
    let k = local(&mut fixture, "k");
    let v = local(&mut fixture, "v");
    let vars = variables(&mut fixture, &[k, v]);

    let mut table = TableType::new(TableState::Sealed, fixture.root);
    table.indexer = Some(TableIndexer {
        key_type: TypeId::STRING,
        value_type: TypeId::BOOLEAN,
    });
    let iteratee = fixture.arena.add_type(Type::Table(table));
    iterable(&mut fixture, iteratee, vars);

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());
    assert!(solver.is_done());

    assert_eq!(solver.arena.follow(k), TypeId::STRING);
    assert_eq!(solver.arena.follow(v), TypeId::BOOLEAN);
}

#[test]
fn test_iterator_triple_strips_leading_nil() {
    let mut fixture = Fixture::new();
    let k = local(&mut fixture, "k");
    let v = local(&mut fixture, "v");
    let vars = variables(&mut fixture, &[k, v]);

    let state = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Sealed,
        fixture.root,
    )));
    let optional_number = fixture
        .arena
        .add_type(Type::Union(vec![TypeId::NIL, TypeId::NUMBER]));
    let next_fn = function(&mut fixture, vec![state], vec![optional_number, TypeId::STRING]);

    let iterator = fixture.arena.add_pack(TypePack::Pack {
        head: vec![next_fn, state, TypeId::NIL],
        tail: None,
    });
    fixture.push(ConstraintKind::Iterable {
        iterator,
        variables: vars,
        next_ast_fragment: NodeId(3),
    });

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());
    assert!(solver.is_done());

    // The loop never advances on nil, so the first variable is `number`,
    // not `number?`.
    assert_eq!(solver.arena.follow(k), TypeId::NUMBER);
    assert_eq!(solver.arena.follow(v), TypeId::STRING);
    assert_eq!(solver.ast_for_in_next_types[&NodeId(3)], next_fn);
}

#[test]
fn test_metatable_iter_protocol() {
    let mut fixture = Fixture::new();
    let k = local(&mut fixture, "k");
    let v = local(&mut fixture, "v");
    let vars = variables(&mut fixture, &[k, v]);

    let state = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Sealed,
        fixture.root,
    )));
    let optional_number = fixture
        .arena
        .add_type(Type::Union(vec![TypeId::NIL, TypeId::NUMBER]));
    let next_fn = function(&mut fixture, vec![state], vec![optional_number, TypeId::STRING]);

    let inner = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Sealed,
        fixture.root,
    )));
    // __iter returns (nextFn, state, nil).
    let iter_fn = function(&mut fixture, vec![inner], vec![next_fn, state, TypeId::NIL]);

    let mut meta_table = TableType::new(TableState::Sealed, fixture.root);
    let iter_name = fixture.interner.intern("__iter");
    meta_table.props.insert(iter_name, Property::rw(iter_fn));
    let metatable = fixture.arena.add_type(Type::Table(meta_table));

    let iteratee = fixture.arena.add_type(Type::Metatable(MetatableType {
        table: inner,
        metatable,
        synthetic_name: None,
    }));
    iterable(&mut fixture, iteratee, vars);

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());
    assert!(solver.is_done());
    assert!(solver.errors.is_empty());

    assert_eq!(solver.arena.follow(k), TypeId::NUMBER);
    assert_eq!(solver.arena.follow(v), TypeId::STRING);
}

#[test]
fn test_any_iteratee_floods_variables() {
    let mut fixture = Fixture::new();
    let k = local(&mut fixture, "k");
    let v = local(&mut fixture, "v");
    let vars = variables(&mut fixture, &[k, v]);
    iterable(&mut fixture, TypeId::ANY, vars);

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(k), TypeId::ANY);
    assert_eq!(solver.arena.follow(v), TypeId::ANY);
}

#[test]
fn test_error_iteratee_floods_variables() {
    let mut fixture = Fixture::new();
    let k = local(&mut fixture, "k");
    let vars = variables(&mut fixture, &[k]);
    iterable(&mut fixture, TypeId::ERROR, vars);

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(k), TypeId::ERROR);
}

#[test]
fn test_sealed_table_without_indexer_is_an_error_iteration() {
    let mut fixture = Fixture::new();
    let k = local(&mut fixture, "k");
    let vars = variables(&mut fixture, &[k]);
    let iteratee = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Sealed,
        fixture.root,
    )));
    iterable(&mut fixture, iteratee, vars);

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(k), TypeId::ERROR);
}

#[test]
fn test_forced_free_table_reports_not_iterable() {
    let mut fixture = Fixture::new();
    let k = local(&mut fixture, "k");
    let vars = variables(&mut fixture, &[k]);
    let iteratee = fixture.arena.add_type(Type::Table(TableType::new(
        TableState::Free,
        fixture.root,
    )));
    iterable(&mut fixture, iteratee, vars);

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());
    assert!(solver.is_done(), "force mode must discharge the iteration");

    assert!(solver.errors.iter().any(|e| matches!(
        e.kind,
        crate::diagnostics::TypeErrorKind::NotIterable { .. }
    )));
    assert_eq!(solver.arena.follow(k), TypeId::ERROR);
}

#[test]
fn test_table_primitive_iterates_as_unknown() {
    let mut fixture = Fixture::new();
    let k = local(&mut fixture, "k");
    let vars = variables(&mut fixture, &[k]);
    iterable(&mut fixture, TypeId::TABLE, vars);

    let resolver = NullResolver;
    let mut solver = fixture.into_solver(&resolver);
    assert!(solver.run().is_ok());

    assert_eq!(solver.arena.follow(k), TypeId::UNKNOWN);
}
