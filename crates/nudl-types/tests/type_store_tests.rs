//! End-to-end coverage of per-scope type registration and lookup (spec
//! §8, scenario 5, plus `AddAlias`/post-registration hooks of §4.4).

use std::cell::RefCell;
use std::rc::Rc;

use nudl_types::type_store::TypeExprRef;
use nudl_types::{Field, GlobalTypeStore, ScopeName, TypeId, TypeSpec};

#[test]
fn scenario_5_local_lookup_succeeds_but_unrelated_scope_fails_not_found() {
    let store = GlobalTypeStore::new();
    let declaring_scope = ScopeName::parse("foo.bar::baz").unwrap();
    let qux = TypeSpec::declare_struct(store.allocator(), "qux", Vec::new());
    store.declare_type(&declaring_scope, qux).unwrap();

    let found = store
        .find_type(&declaring_scope, &TypeExprRef::simple("qux"))
        .unwrap();
    assert_eq!(found.name(), "qux");

    let unrelated = ScopeName::parse("foo.other").unwrap();
    let err = store
        .find_type(&unrelated, &TypeExprRef::simple("qux"))
        .unwrap_err();
    assert_eq!(err.kind(), nudl_common::ErrorKind::NotFound);
}

#[test]
fn base_types_are_reachable_unqualified_from_any_scope() {
    let store = GlobalTypeStore::new();
    let deep_scope = ScopeName::parse("a.b::c").unwrap();
    let resolved = store
        .find_type(&deep_scope, &TypeExprRef::simple("Int8"))
        .unwrap();
    assert_eq!(resolved.type_id(), TypeId::Int8);
}

#[test]
fn add_alias_makes_a_scope_reachable_under_another_name() {
    let store = GlobalTypeStore::new();
    let real = ScopeName::parse("pkg.impl").unwrap();
    let alias = ScopeName::parse("pkg.public").unwrap();
    let widget = TypeSpec::declare_struct(
        store.allocator(),
        "Widget",
        vec![Field::new("id", TypeSpec::builtin_base(TypeId::Int))],
    );
    store.declare_type(&real, widget).unwrap();
    store.add_alias(&real, &alias).unwrap();

    assert!(store
        .find_type(&alias, &TypeExprRef::simple("Widget"))
        .is_ok());
}

#[test]
fn redeclaring_the_same_type_name_in_a_scope_is_an_error() {
    let store = GlobalTypeStore::new();
    let scope = ScopeName::parse("m").unwrap();
    let first = TypeSpec::declare_struct(store.allocator(), "Thing", Vec::new());
    let second = TypeSpec::declare_struct(store.allocator(), "Thing", Vec::new());
    store.declare_type(&scope, first).unwrap();
    let err = store.declare_type(&scope, second).unwrap_err();
    assert_eq!(err.kind(), nudl_common::ErrorKind::AlreadyExists);
}

#[test]
fn post_registration_hook_fires_once_per_declared_type() {
    let store = GlobalTypeStore::new();
    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_for_hook = Rc::clone(&seen);
    store.on_register(move |_scope, spec| {
        seen_for_hook.borrow_mut().push(spec.name().to_string());
    });

    let scope = ScopeName::parse("hooked").unwrap();
    let a = TypeSpec::declare_struct(store.allocator(), "A", Vec::new());
    let b = TypeSpec::declare_struct(store.allocator(), "B", Vec::new());
    store.declare_type(&scope, a).unwrap();
    store.declare_type(&scope, b).unwrap();

    assert_eq!(*seen.borrow(), vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn find_type_resolves_parametric_expression_with_nested_args() {
    let store = GlobalTypeStore::new();
    let scope = ScopeName::parse("m").unwrap();
    let expr = TypeExprRef::named(
        "Map",
        vec![
            TypeExprRef::simple("String"),
            TypeExprRef::named("Array", vec![TypeExprRef::simple("Int8")]),
        ],
    );
    let resolved = store.find_type(&scope, &expr).unwrap();
    assert_eq!(resolved.type_id(), TypeId::Map);
    assert_eq!(resolved.parameters()[1].type_id(), TypeId::Array);
    assert_eq!(resolved.parameters()[1].parameters()[0].type_id(), TypeId::Int8);
}

#[test]
fn find_type_declares_a_local_type_variable_and_rejects_redeclaration() {
    let store = GlobalTypeStore::new();
    let scope = ScopeName::parse("m::f").unwrap();
    let expr = TypeExprRef::LocalDef {
        local_name: "T".to_string(),
        constraint: Some(Box::new(TypeExprRef::simple("Numeric"))),
    };
    let declared = store.find_type(&scope, &expr).unwrap();
    assert_eq!(declared.local_name().as_deref(), Some("T"));

    let err = store.find_type(&scope, &expr).unwrap_err();
    assert_eq!(err.kind(), nudl_common::ErrorKind::AlreadyExists);
}
