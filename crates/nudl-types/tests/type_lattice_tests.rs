//! End-to-end coverage of the type lattice's ancestry/equality/
//! convertibility relations (spec §8 invariants and literal scenarios 1-2).

use nudl_types::{BindArg, TypeId, TypeIdAllocator, TypeSpec};

fn bind1(base: TypeId, param: TypeSpec, alloc: &TypeIdAllocator) -> TypeSpec {
    TypeSpec::builtin_base(base)
        .bind(&[BindArg::Type(param)], alloc)
        .unwrap()
}

#[test]
fn scenario_1_array_int_ancestor_of_array_int8() {
    let alloc = TypeIdAllocator::new();
    let array_int = bind1(TypeId::Array, TypeSpec::builtin_base(TypeId::Int), &alloc);
    let array_int8 = bind1(TypeId::Array, TypeSpec::builtin_base(TypeId::Int8), &alloc);
    assert!(array_int.is_ancestor_of(&array_int8));
    assert!(array_int.is_convertible_from(&array_int8));
}

#[test]
fn scenario_2_function_argument_covariance_is_asymmetric() {
    let alloc = TypeIdAllocator::new();
    let integral = TypeSpec::builtin_base(TypeId::Integral);
    let string = TypeSpec::builtin_base(TypeId::String);
    let union = TypeSpec::builtin_base(TypeId::Union)
        .bind(&[BindArg::Type(integral), BindArg::Type(string)], &alloc)
        .unwrap();
    let bool_ty = TypeSpec::builtin_base(TypeId::Bool);

    let f1 = TypeSpec::builtin_base(TypeId::Function)
        .bind(
            &[BindArg::Type(union.clone()), BindArg::Type(bool_ty.clone())],
            &alloc,
        )
        .unwrap();

    let nullable_union = bind1(TypeId::Nullable, union, &alloc);
    let f2 = TypeSpec::builtin_base(TypeId::Function)
        .bind(&[BindArg::Type(nullable_union), BindArg::Type(bool_ty)], &alloc)
        .unwrap();

    assert!(!f1.is_ancestor_of(&f2));
    assert!(f2.is_ancestor_of(&f1));
}

#[test]
fn reflexivity_holds_for_a_parametric_type() {
    let alloc = TypeIdAllocator::new();
    let map = TypeSpec::builtin_base(TypeId::Map)
        .bind(
            &[
                BindArg::Type(TypeSpec::builtin_base(TypeId::String)),
                BindArg::Type(TypeSpec::builtin_base(TypeId::Int)),
            ],
            &alloc,
        )
        .unwrap();
    assert!(map.is_ancestor_of(&map));
    assert!(map.is_equal(&map));
    assert!(map.is_convertible_from(&map));
}

#[test]
fn nullable_of_nullable_normalizes_to_single_wrap() {
    let alloc = TypeIdAllocator::new();
    let int = TypeSpec::builtin_base(TypeId::Int);
    let once = bind1(TypeId::Nullable, int, &alloc);
    let twice = bind1(TypeId::Nullable, once.clone(), &alloc);
    assert!(twice.is_equal(&once));
}

#[test]
fn union_with_duplicate_and_three_members_normalizes_to_two() {
    let alloc = TypeIdAllocator::new();
    let a = TypeSpec::builtin_base(TypeId::Int);
    let b = TypeSpec::builtin_base(TypeId::String);
    let union = TypeSpec::builtin_base(TypeId::Union)
        .bind(
            &[
                BindArg::Type(a.clone()),
                BindArg::Type(b),
                BindArg::Type(a),
            ],
            &alloc,
        )
        .unwrap();
    assert_eq!(union.parameters().len(), 2);
}

#[test]
fn union_of_a_single_type_is_rejected() {
    let alloc = TypeIdAllocator::new();
    let err = TypeSpec::builtin_base(TypeId::Union)
        .bind(&[BindArg::Type(TypeSpec::builtin_base(TypeId::Int))], &alloc)
        .unwrap_err();
    assert_eq!(err.kind(), nudl_common::ErrorKind::InvalidArgument);
}

#[test]
fn binding_is_idempotent_under_cloning() {
    let alloc = TypeIdAllocator::new();
    let generator = TypeSpec::builtin_base(TypeId::Array);
    let first = generator
        .bind(&[BindArg::Type(TypeSpec::builtin_base(TypeId::Int8))], &alloc)
        .unwrap();
    let second = generator
        .bind(&[BindArg::Type(TypeSpec::builtin_base(TypeId::Int8))], &alloc)
        .unwrap();
    assert!(first.clone().is_equal(&second));
    assert!(first.is_equal(&first.clone()));
}

#[test]
fn is_bound_requires_every_parameter_bound() {
    let alloc = TypeIdAllocator::new();
    let t = TypeSpec::local_type_variable("T", None);
    assert!(!t.is_bound());
    let array_of_t = bind1(TypeId::Array, t, &alloc);
    assert!(!array_of_t.is_bound());

    let array_of_int = bind1(TypeId::Array, TypeSpec::builtin_base(TypeId::Int), &alloc);
    assert!(array_of_int.is_bound());
}
