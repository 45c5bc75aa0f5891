//! End-to-end coverage of scoped-name parsing and composition (spec §8,
//! scenario 6, plus the prefix/suffix/subscope operations of §4.1).

use nudl_types::{ScopeName, ScopedName};

#[test]
fn parsing_a_nested_module_and_function_path() {
    let scope = ScopeName::parse("foo.bar::baz::qux").unwrap();
    assert_eq!(scope.module_names(), ["foo", "bar"]);
    assert_eq!(scope.function_names(), ["baz", "qux"]);
    assert_eq!(scope.prefix_scope_name(3), "foo.bar::baz");
}

#[test]
fn resolution_order_example_searches_declared_stores_in_prefix_order() {
    // `foo.bar::baz.qux` inside scope `foo.bar::baz` resolves locally;
    // the search order for a qualified lookup from `foo.other` walks
    // `foo.other`, `foo`, then the empty built-in scope.
    let lookup = ScopeName::parse("foo.other").unwrap();
    let mut probed = Vec::new();
    for k in (0..=lookup.size()).rev() {
        probed.push(lookup.prefix(k).name().to_string());
    }
    assert_eq!(probed, vec!["foo.other", "foo", ""]);
}

#[test]
fn scoped_name_round_trips_through_parse_and_render() {
    let scoped = ScopedName::parse("foo.bar::baz.qux").unwrap();
    assert_eq!(scoped.scope_name().name(), "foo.bar::baz");
    assert_eq!(scoped.name(), "qux");
    assert_eq!(scoped.full_name(), "foo.bar::baz.qux");
}

#[test]
fn submodule_and_subfunction_compose_the_expected_paths() {
    let base = ScopeName::parse("foo").unwrap();
    let with_module = base.submodule("bar").unwrap();
    assert_eq!(with_module.name(), "foo.bar");

    let with_function = with_module.subfunction("baz").unwrap();
    assert_eq!(with_function.name(), "foo.bar::baz");

    // Once a function segment exists, further submodule calls are rejected.
    assert!(with_function.submodule("nope").is_err());
}

#[test]
fn is_prefix_scope_requires_a_segment_boundary() {
    let a = ScopeName::parse("foo").unwrap();
    let b = ScopeName::parse("foo.bar").unwrap();
    let confusable = ScopeName::parse("foobar").unwrap();
    assert!(a.is_prefix_scope(&b));
    assert!(!a.is_prefix_scope(&confusable));
}
