// tests/resolve_scenarios.rs
//! End-to-end reference resolution across snapshot derivations, builder
//! lifecycles, facet projections and concurrent lazy collections.

use std::sync::Arc;

use weft::model::builder::DeclBuilder;
use weft::model::decl::{DeclKind, Param, RefKind, Signature};
use weft::model::snapshot::Program;
use weft::model::types::TypeId;
use weft::reference::{DeclRef, MethodDecl, RefFacet};
use weft::ResolveError;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn calculator_program() -> Program {
    init_tracing();
    let mut program = Program::new();
    let mut builder = program.build_snapshot();
    let calc = builder.add_type("Calculator", None);
    let lhs = builder.intern("lhs");
    let rhs = builder.intern("rhs");
    builder.add_method(
        calc,
        "add",
        Signature::new(
            [Param::by_value(lhs, TypeId::INT), Param::by_value(rhs, TypeId::INT)],
            TypeId::INT,
        ),
    );
    builder.add_field(calc, "total", TypeId::INT);
    builder.add_property(calc, "precision", TypeId::INT, true, true);
    builder.freeze();
    program
}

#[test]
fn references_survive_snapshot_derivation() {
    let mut program = calculator_program();
    let s1 = program.latest().id();

    let reference = DeclRef::from_decl(
        program
            .snapshot(s1)
            .decl_by_serialized_id("M:main.Calculator.add(int,int)")
            .unwrap(),
    );

    // Derive twice; the handle minted against the first snapshot translates
    // into each of them by structural identity.
    let s2 = program.derive_snapshot(s1).freeze();
    let s3 = program.derive_snapshot(s2).freeze();

    let in_s2 = reference.resolve(program.snapshot(s2)).unwrap();
    let in_s3 = reference.resolve(program.snapshot(s3)).unwrap();
    assert_eq!(in_s2.snapshot, s2);
    assert_eq!(in_s3.snapshot, s3);
    assert_eq!(in_s2.path, in_s3.path);
}

#[test]
fn resolution_is_idempotent_within_a_snapshot() {
    let program = calculator_program();
    let snapshot = program.latest();
    let reference = DeclRef::from_decl(
        snapshot
            .decl_by_serialized_id("M:main.Calculator.add(int,int)")
            .unwrap(),
    );

    let first = reference.resolve(snapshot).unwrap();
    let second = reference.resolve(snapshot).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn removed_declarations_resolve_to_stale() {
    let mut program = calculator_program();
    let s1 = program.latest().id();
    let total = program
        .snapshot(s1)
        .decl_by_serialized_id("F:main.Calculator.total")
        .unwrap()
        .id;
    let reference = DeclRef::from_decl(program.snapshot(s1).decl(total).unwrap());

    let mut builder = program.derive_snapshot(s1);
    builder.remove(total);
    let s2 = builder.freeze();

    assert!(reference.resolve(program.snapshot(s1)).is_ok());
    let err = reference.resolve(program.snapshot(s2)).unwrap_err();
    assert!(matches!(err, ResolveError::Stale { .. }));
    assert!(reference.is_dead(program.snapshot(s2)));
    assert!(!reference.is_dead(program.snapshot(s1)));
}

#[test]
fn builder_references_resolve_only_after_commit() {
    let mut program = calculator_program();
    let s1 = program.latest().id();
    let calc_id = program
        .snapshot(s1)
        .decl_by_serialized_id("T:main.Calculator")
        .unwrap()
        .id;

    let name = program.intern("reset");
    let pending = DeclBuilder::new(name, DeclKind::Method);
    let reference = DeclRef::from_builder(Arc::clone(&pending));

    // Before commit, resolution against any snapshot fails.
    let err = reference.resolve(program.snapshot(s1)).unwrap_err();
    assert!(matches!(err, ResolveError::BuilderNotCommitted { .. }));

    let mut builder = program.derive_snapshot(s1);
    builder.commit_builder(&pending, calc_id, Some(Signature::new([], TypeId::VOID)));
    let s2 = builder.freeze();

    let resolved = reference.resolve(program.snapshot(s2)).unwrap();
    assert_eq!(resolved.kind, DeclKind::Method);
    assert_eq!(resolved.name, name);

    // The origin snapshot predates the commit and still refuses.
    assert!(reference.resolve(program.snapshot(s1)).is_err());

    // Later derivations inherit the commit.
    let s3 = program.derive_snapshot(s2).freeze();
    assert!(reference.resolve(program.snapshot(s3)).is_ok());
}

#[test]
fn serialized_ids_round_trip() {
    let program = calculator_program();
    let snapshot = program.latest();
    let method = snapshot
        .decl_by_serialized_id("M:main.Calculator.add(int,int)")
        .unwrap();

    let id = DeclRef::from_decl(method).serialized_id(snapshot).unwrap();
    assert_eq!(id, "M:main.Calculator.add(int,int)");

    let restored: DeclRef<MethodDecl> = DeclRef::from_serialized_id(id).cast();
    let resolved = restored.resolve(snapshot).unwrap();
    assert!(Arc::ptr_eq(&resolved, method));

    let unknown = DeclRef::from_serialized_id("M:main.Calculator.sub(int)");
    let err = unknown.resolve(snapshot).unwrap_err();
    assert!(matches!(err, ResolveError::UnresolvableId { .. }));
}

#[test]
fn builder_references_are_not_serializable() {
    let mut program = calculator_program();
    let name = program.intern("pending");
    let reference = DeclRef::from_builder(DeclBuilder::new(name, DeclKind::Field));
    let err = reference.serialized_id(program.latest()).unwrap_err();
    assert!(matches!(err, ResolveError::NotSerializable { .. }));
}

#[test]
fn facets_project_to_synthesized_declarations() {
    let program = calculator_program();
    let snapshot = program.latest();

    let method = snapshot
        .decl_by_serialized_id("M:main.Calculator.add(int,int)")
        .unwrap();
    let slot = DeclRef::from_symbol(method, RefFacet::ReturnSlot)
        .unwrap()
        .resolve(snapshot)
        .unwrap();
    assert_eq!(slot.kind, DeclKind::Parameter);

    let property = snapshot
        .decl_by_serialized_id("P:main.Calculator.precision")
        .unwrap();
    let field = DeclRef::from_symbol(property, RefFacet::PropertyField)
        .unwrap()
        .resolve(snapshot)
        .unwrap();
    assert_eq!(field.kind, DeclKind::Field);
    assert_eq!(snapshot.names().resolve(field.name), "__precision");

    let value = DeclRef::from_symbol(property, RefFacet::AccessorParam)
        .unwrap()
        .resolve(snapshot)
        .unwrap();
    assert_eq!(value.kind, DeclKind::Parameter);
}

#[test]
fn property_without_storage_reports_no_backing_storage() {
    let mut program = Program::new();
    let mut builder = program.build_snapshot();
    let ty = builder.add_type("View", None);
    // Computed and read-only: no backing field, no setter parameter.
    builder.add_property(ty, "width", TypeId::INT, false, false);
    builder.freeze();

    let snapshot = program.latest();
    let property = snapshot.decl_by_serialized_id("P:main.View.width").unwrap();

    let err = DeclRef::from_symbol(property, RefFacet::PropertyField)
        .unwrap()
        .resolve(snapshot)
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoBackingStorage { .. }));

    let err = DeclRef::from_symbol(property, RefFacet::AccessorParam)
        .unwrap()
        .resolve(snapshot)
        .unwrap_err();
    assert!(matches!(err, ResolveError::Unresolvable { .. }));
}

#[test]
fn reference_equality_is_snapshot_independent() {
    let mut program = calculator_program();
    let s1 = program.latest().id();
    let s2 = program.derive_snapshot(s1).freeze();

    let a = DeclRef::from_decl(
        program
            .snapshot(s1)
            .decl_by_serialized_id("M:main.Calculator.add(int,int)")
            .unwrap(),
    );
    let b = DeclRef::from_decl(
        program
            .snapshot(s2)
            .decl_by_serialized_id("M:main.Calculator.add(int,int)")
            .unwrap(),
    );
    assert_eq!(a, b);

    let mut map = rustc_hash::FxHashMap::default();
    map.insert(a, "advice");
    assert_eq!(map.get(&b), Some(&"advice"));
}

#[test]
fn kind_mismatch_is_reported_with_both_kinds() {
    let program = calculator_program();
    let snapshot = program.latest();
    let field = snapshot
        .decl_by_serialized_id("F:main.Calculator.total")
        .unwrap();

    let as_method: DeclRef<MethodDecl> = DeclRef::from_decl(field).cast();
    match as_method.resolve(snapshot).unwrap_err() {
        ResolveError::KindMismatch { expected, found } => {
            assert_eq!(expected, "method");
            assert_eq!(found, "field");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn concurrent_readers_observe_one_resolution() {
    let program = calculator_program();
    let snapshot = program.latest();
    let calc = snapshot.decl_by_serialized_id("T:main.Calculator").unwrap();
    let members = calc.members(snapshot);

    let resolved: Vec<Vec<usize>> = std::thread::scope(|scope| {
        (0..8)
            .map(|_| {
                scope.spawn(|| {
                    members
                        .iter()
                        .map(|decl| Arc::as_ptr(decl.unwrap()) as usize)
                        .collect()
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    // Every thread saw the same cached declaration objects.
    for window in resolved.windows(2) {
        assert_eq!(window[0], window[1]);
    }
}

#[test]
fn parameters_and_return_slot_are_reachable_from_a_method() {
    let program = calculator_program();
    let snapshot = program.latest();
    let method = snapshot
        .decl_by_serialized_id("M:main.Calculator.add(int,int)")
        .unwrap();

    let params = method.parameters(snapshot);
    assert_eq!(params.len(), 2);
    let lhs = params.get(0).unwrap();
    assert_eq!(snapshot.names().resolve(lhs.name), "lhs");
    assert_eq!(lhs.param.as_ref().unwrap().ty, TypeId::INT);
    assert_eq!(lhs.param.as_ref().unwrap().ref_kind, RefKind::Value);

    let slot = snapshot.decl(method.return_slot.unwrap()).unwrap();
    assert_eq!(slot.kind, DeclKind::Parameter);
    assert_eq!(
        DeclRef::from_decl(slot).serialized_id(snapshot).unwrap(),
        "A:main.Calculator.add(int,int)@ret"
    );
}
