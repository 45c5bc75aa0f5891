//! End-to-end coverage of the three struct-synthesizing generator types
//! (spec §4.3 "Synthesized types"; scenario 4 of spec §8).

use nudl_types::{BindArg, Field, TypeId, TypeIdAllocator, TypeSpec};

fn named_tuple1(name: &str, ty: TypeSpec, alloc: &TypeIdAllocator) -> TypeSpec {
    TypeSpec::builtin_base(TypeId::Tuple)
        .bind(&[BindArg::Named(name.to_string(), ty)], alloc)
        .unwrap()
}

#[test]
fn scenario_4_dataset_aggregate_produces_struct_with_fields_in_order() {
    let alloc = TypeIdAllocator::new();
    let row = TypeSpec::declare_struct(
        &alloc,
        "Row",
        vec![
            Field::new("f0", TypeSpec::builtin_base(TypeId::Int)),
            Field::new("f1", TypeSpec::builtin_base(TypeId::String)),
        ],
    );

    let spec = TypeSpec::builtin_base(TypeId::Tuple)
        .bind(
            &[
                BindArg::Type(row),
                BindArg::Named(
                    "count".to_string(),
                    named_tuple1("my_count", TypeSpec::builtin_base(TypeId::Int), &alloc),
                ),
                BindArg::Named(
                    "sum".to_string(),
                    named_tuple1("my_sum", TypeSpec::builtin_base(TypeId::Int), &alloc),
                ),
                BindArg::Named(
                    "to_set".to_string(),
                    named_tuple1("my_set", TypeSpec::builtin_base(TypeId::String), &alloc),
                ),
                BindArg::Named(
                    "to_array".to_string(),
                    named_tuple1("my_array", TypeSpec::builtin_base(TypeId::Bytes), &alloc),
                ),
            ],
            &alloc,
        )
        .unwrap();

    let dataset = TypeSpec::builtin_base(TypeId::DatasetAggregate)
        .bind(&[BindArg::Type(spec)], &alloc)
        .unwrap();

    assert_eq!(dataset.type_id(), TypeId::Dataset);
    let synthesized = dataset.result_type().unwrap();
    let store = synthesized.member_store().unwrap();
    let fields = store.fields();
    let names: Vec<&str> = fields.iter().map(Field::name).collect();
    assert_eq!(names, ["my_count", "my_sum", "my_set", "my_array"]);

    assert_eq!(fields[0].field_type().type_id(), TypeId::Int);
    assert_eq!(fields[1].field_type().type_id(), TypeId::Int);
    assert_eq!(fields[2].field_type().type_id(), TypeId::Set);
    assert_eq!(fields[2].field_type().parameters()[0].type_id(), TypeId::String);
    assert_eq!(fields[3].field_type().type_id(), TypeId::Array);
    assert_eq!(fields[3].field_type().parameters()[0].type_id(), TypeId::Bytes);
}

#[test]
fn dataset_aggregate_rejects_sum_over_non_numeric_field() {
    let alloc = TypeIdAllocator::new();
    let row = TypeSpec::declare_struct(&alloc, "Row", vec![Field::new("f0", TypeSpec::builtin_base(TypeId::String))]);
    let spec = TypeSpec::builtin_base(TypeId::Tuple)
        .bind(
            &[
                BindArg::Type(row),
                BindArg::Named(
                    "sum".to_string(),
                    named_tuple1("my_sum", TypeSpec::builtin_base(TypeId::String), &alloc),
                ),
            ],
            &alloc,
        )
        .unwrap();

    let err = TypeSpec::builtin_base(TypeId::DatasetAggregate)
        .bind(&[BindArg::Type(spec)], &alloc)
        .unwrap_err();
    assert_eq!(err.kind(), nudl_common::ErrorKind::InvalidArgument);
}

#[test]
fn dataset_join_copies_left_fields_and_wraps_right_side_nullable() {
    let alloc = TypeIdAllocator::new();
    let left = TypeSpec::declare_struct(
        &alloc,
        "Left",
        vec![
            Field::new("id", TypeSpec::builtin_base(TypeId::Int)),
            Field::new("name", TypeSpec::builtin_base(TypeId::String)),
        ],
    );
    let right = TypeSpec::declare_struct(&alloc, "Right", vec![Field::new("id", TypeSpec::builtin_base(TypeId::Int))]);

    let key_fn = TypeSpec::builtin_base(TypeId::Function)
        .bind(&[BindArg::Type(TypeSpec::builtin_base(TypeId::Int))], &alloc)
        .unwrap();

    let join_slot = TypeSpec::builtin_base(TypeId::Tuple)
        .bind(
            &[BindArg::Type(right), BindArg::Type(key_fn.clone())],
            &alloc,
        )
        .unwrap();
    let joins = TypeSpec::builtin_base(TypeId::Tuple)
        .bind(&[BindArg::Named("right".to_string(), join_slot)], &alloc)
        .unwrap();

    let dataset = TypeSpec::builtin_base(TypeId::DatasetJoin)
        .bind(
            &[BindArg::Type(left), BindArg::Type(key_fn), BindArg::Type(joins)],
            &alloc,
        )
        .unwrap();

    let synthesized = dataset.result_type().unwrap();
    let fields = synthesized.member_store().unwrap().fields();
    let names: Vec<&str> = fields.iter().map(Field::name).collect();
    assert_eq!(names, ["id", "name", "right"]);
    assert_eq!(fields[2].field_type().type_id(), TypeId::Nullable);
}

#[test]
fn dataset_join_rejects_mismatched_key_types() {
    let alloc = TypeIdAllocator::new();
    let left = TypeSpec::declare_struct(&alloc, "Left", vec![Field::new("id", TypeSpec::builtin_base(TypeId::Int))]);
    let right = TypeSpec::declare_struct(&alloc, "Right", vec![Field::new("id", TypeSpec::builtin_base(TypeId::String))]);

    let left_key = TypeSpec::builtin_base(TypeId::Function)
        .bind(&[BindArg::Type(TypeSpec::builtin_base(TypeId::Int))], &alloc)
        .unwrap();
    let right_key = TypeSpec::builtin_base(TypeId::Function)
        .bind(&[BindArg::Type(TypeSpec::builtin_base(TypeId::String))], &alloc)
        .unwrap();

    let join_slot = TypeSpec::builtin_base(TypeId::Tuple)
        .bind(&[BindArg::Type(right), BindArg::Type(right_key)], &alloc)
        .unwrap();
    let joins = TypeSpec::builtin_base(TypeId::Tuple)
        .bind(&[BindArg::Named("right".to_string(), join_slot)], &alloc)
        .unwrap();

    let err = TypeSpec::builtin_base(TypeId::DatasetJoin)
        .bind(&[BindArg::Type(left), BindArg::Type(left_key), BindArg::Type(joins)], &alloc)
        .unwrap_err();
    assert_eq!(err.kind(), nudl_common::ErrorKind::InvalidArgument);
}

#[test]
fn tuple_join_flattens_nested_tuples_preserving_names() {
    let alloc = TypeIdAllocator::new();
    let inner = TypeSpec::builtin_base(TypeId::Tuple)
        .bind(
            &[
                BindArg::Named("a".to_string(), TypeSpec::builtin_base(TypeId::Int)),
                BindArg::Named("b".to_string(), TypeSpec::builtin_base(TypeId::String)),
            ],
            &alloc,
        )
        .unwrap();
    let plain = TypeSpec::builtin_base(TypeId::Bool);

    let joined = TypeSpec::builtin_base(TypeId::TupleJoin)
        .bind(&[BindArg::Type(inner), BindArg::Type(plain)], &alloc)
        .unwrap();

    assert_eq!(joined.type_id(), TypeId::Tuple);
    assert_eq!(joined.parameters().len(), 3);
    assert_eq!(joined.slot_name(0), Some("a"));
    assert_eq!(joined.slot_name(1), Some("b"));
    assert_eq!(joined.slot_name(2), None);
}
