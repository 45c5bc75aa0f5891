//! End-to-end coverage of local type-name unification across a function
//! signature (spec §8, scenario 3).

use nudl_types::{BindArg, LocalNamesRebinder, TypeId, TypeIdAllocator, TypeSpec};

fn numeric_t() -> TypeSpec {
    TypeSpec::local_type_variable("T", Some(TypeSpec::builtin_base(TypeId::Numeric)))
}

#[test]
fn scenario_3_binding_function_t_t_result_t_with_matching_ints() {
    let alloc = TypeIdAllocator::new();
    let t = numeric_t();
    let template = TypeSpec::builtin_base(TypeId::Function)
        .bind(
            &[
                BindArg::Named("arg_1".to_string(), t.clone()),
                BindArg::Named("arg_2".to_string(), t.clone()),
                BindArg::Type(t),
            ],
            &alloc,
        )
        .unwrap();

    let rebinder = LocalNamesRebinder::new();
    let int = TypeSpec::builtin_base(TypeId::Int);
    for param in &template.parameters()[..2] {
        let local_name = param.local_name().unwrap();
        rebinder.record(&local_name, &int, &alloc).unwrap();
    }

    let rebuilt = rebinder.rebuild_type(&template, &alloc).unwrap();
    assert_eq!(rebuilt.slot_name(0), Some("arg_1"));
    assert_eq!(rebuilt.slot_name(1), Some("arg_2"));
    assert!(rebuilt.parameters()[0].is_equal(&int));
    assert!(rebuilt.parameters()[1].is_equal(&int));
    assert!(rebuilt.result_type().unwrap().is_equal(&int));
}

#[test]
fn scenario_3_binding_function_t_t_with_incompatible_concretes_fails() {
    let alloc = TypeIdAllocator::new();
    let t = numeric_t();
    let local_name = t.local_name().unwrap();

    let rebinder = LocalNamesRebinder::new();
    let int = TypeSpec::builtin_base(TypeId::Int);
    let decimal = TypeSpec::builtin_base(TypeId::Decimal)
        .bind(&[BindArg::Int(10), BindArg::Int(2)], &alloc)
        .unwrap();

    rebinder.record(&local_name, &int, &alloc).unwrap();
    let err = rebinder.record(&local_name, &decimal, &alloc).unwrap_err();
    assert_eq!(err.kind(), nudl_common::ErrorKind::InvalidArgument);
    assert!(err.to_string().contains(&local_name));
}

#[test]
fn unconstrained_local_name_accepts_any_concrete_binding() {
    let alloc = TypeIdAllocator::new();
    let t = TypeSpec::local_type_variable("U", None);
    let local_name = t.local_name().unwrap();
    let rebinder = LocalNamesRebinder::new();

    let string = TypeSpec::builtin_base(TypeId::String);
    rebinder.record(&local_name, &string, &alloc).unwrap();
    assert!(rebinder.binding(&local_name).unwrap().is_equal(&string));
}
