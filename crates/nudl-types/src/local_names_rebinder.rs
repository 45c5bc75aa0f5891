//! Unifies repeated occurrences of a local type name across a function's
//! declared parameters.
//!
//! Grounded on `LocalNamesRebinder`/`RebuildType`/`RebuildFunctionWithComponents`
//! in `nudl/analysis/type_spec.cc` (spec §4.3 "Local-name unification"): a
//! source parameter like `{T: Numeric}` may appear several times across a
//! signature, and each concrete observation has to be merged into a single
//! chosen binding for `T` before the signature can be rebuilt with concrete
//! types substituted in.

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use nudl_common::{NudlError, NudlResult};

use crate::type_spec::{BindArg, TypeSpec};
use crate::types::{TypeId, TypeIdAllocator};

/// Merges successive observations of the same local type name into one
/// chosen concrete type, then rebuilds parametric types substituting the
/// chosen concretes for every local name they reference.
#[derive(Default)]
pub struct LocalNamesRebinder {
    bindings: RefCell<FxHashMap<String, TypeSpec>>,
}

impl LocalNamesRebinder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn binding(&self, local_name: &str) -> Option<TypeSpec> {
        self.bindings.borrow().get(local_name).cloned()
    }

    /// Folds a newly observed concrete type into the running binding for
    /// `local_name`, per the seven merge rules (spec §4.3).
    pub fn record(
        &self,
        local_name: &str,
        observed: &TypeSpec,
        alloc: &TypeIdAllocator,
    ) -> NudlResult<()> {
        let mut bindings = self.bindings.borrow_mut();
        let merged = match bindings.get(local_name) {
            Some(existing) => merge_local_binding(existing, observed, local_name, alloc)?,
            None => observed.clone(),
        };
        bindings.insert(local_name.to_string(), merged);
        Ok(())
    }

    /// Substitutes the chosen concrete binding for every local-named type
    /// appearing in `spec`'s parameter tree, recursively. Types with no
    /// local name, and types with no parameters (including nominal
    /// structs, whose fields live in the member store rather than the
    /// parameter list), pass through unchanged.
    pub fn rebuild_type(&self, spec: &TypeSpec, alloc: &TypeIdAllocator) -> NudlResult<TypeSpec> {
        self.rebuild_inner(spec, alloc, 0)
    }

    fn rebuild_inner(
        &self,
        spec: &TypeSpec,
        alloc: &TypeIdAllocator,
        depth: u32,
    ) -> NudlResult<TypeSpec> {
        if depth > nudl_common::limits::MAX_REBINDER_DEPTH {
            return Err(NudlError::internal(
                "Local-name rebinder exceeded maximum recursion depth",
            ));
        }
        if let Some(local_name) = spec.local_name() {
            if let Some(bound) = self.binding(&local_name) {
                return Ok(bound);
            }
            return Ok(spec.clone());
        }
        if spec.parameters().is_empty() {
            return Ok(spec.clone());
        }
        let mut args = Vec::with_capacity(spec.parameters().len());
        for (i, param) in spec.parameters().iter().enumerate() {
            let rebuilt = self.rebuild_inner(param, alloc, depth + 1)?;
            args.push(match spec.slot_name(i) {
                Some(name) => BindArg::Named(name.to_string(), rebuilt),
                None => BindArg::Type(rebuilt),
            });
        }
        TypeSpec::builtin_base(spec.type_id()).bind(&args, alloc)
    }

    /// The function-specialized variant: rebuilds `function` directly from
    /// already-resolved argument/result `components`, without re-walking
    /// each component's own parameter tree (used once overload resolution
    /// has already settled each argument's concrete type).
    pub fn rebuild_function_with_components(
        &self,
        function: &TypeSpec,
        components: &[TypeSpec],
        alloc: &TypeIdAllocator,
    ) -> NudlResult<TypeSpec> {
        if function.type_id() != TypeId::Function {
            return Err(NudlError::invalid_argument(
                "rebuild_function_with_components requires a Function type",
            ));
        }
        if components.len() != function.parameters().len() {
            return Err(NudlError::invalid_argument(format!(
                "Expected {} components for `{}`, got {}",
                function.parameters().len(),
                function.full_name(),
                components.len()
            )));
        }
        let args: Vec<BindArg> = components
            .iter()
            .enumerate()
            .map(|(i, component)| match function.slot_name(i) {
                Some(name) => BindArg::Named(name.to_string(), component.clone()),
                None => BindArg::Type(component.clone()),
            })
            .collect();
        TypeSpec::builtin_base(TypeId::Function).bind(&args, alloc)
    }
}

/// The seven merge rules of spec §4.3, `t1` the existing binding, `t2` the
/// newly observed type.
fn merge_local_binding(
    t1: &TypeSpec,
    t2: &TypeSpec,
    local_name: &str,
    alloc: &TypeIdAllocator,
) -> NudlResult<TypeSpec> {
    if t1.type_id() == TypeId::Null && t2.type_id() == TypeId::Any {
        return Ok(t1.clone());
    }
    if t1.type_id() == TypeId::Null && t2.type_id() == TypeId::Nullable {
        return Ok(t2.clone());
    }
    if t1.type_id() == TypeId::Null && t2.type_id() == TypeId::Null {
        return Ok(t1.clone());
    }
    if t1.type_id() == TypeId::Null {
        return TypeSpec::builtin_base(TypeId::Nullable).bind(&[BindArg::Type(t2.clone())], alloc);
    }
    if t1.type_id() == TypeId::Nullable && t2.type_id() == TypeId::Null {
        return Ok(t1.clone());
    }
    if t1.type_id() == TypeId::Nullable {
        let inner1 = t1
            .result_type()
            .expect("Nullable always carries an inner type");
        let inner2 = if t2.type_id() == TypeId::Nullable {
            t2.result_type().expect("Nullable always carries an inner type")
        } else {
            t2.clone()
        };
        let merged_inner = merge_local_binding(&inner1, &inner2, local_name, alloc)?;
        return TypeSpec::builtin_base(TypeId::Nullable)
            .bind(&[BindArg::Type(merged_inner)], alloc);
    }
    if t1.type_id() == TypeId::Any {
        return Ok(t2.clone());
    }
    if t2.type_id() == TypeId::Any {
        return Ok(t1.clone());
    }
    if t1.is_equal(t2) {
        return Ok(t1.clone());
    }
    if t1.is_bound() && !t2.is_bound() {
        return Ok(t1.clone());
    }
    if t2.is_bound() && !t1.is_bound() {
        return Ok(t2.clone());
    }
    if t1.is_convertible_from(t2) {
        return Ok(t1.clone());
    }
    if t2.is_convertible_from(t1) {
        return Ok(t2.clone());
    }
    Err(NudlError::invalid_argument(format!(
        "incompatible bindings for named type {local_name}: `{}` vs `{}`",
        t1.full_name(),
        t2.full_name()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc() -> TypeIdAllocator {
        TypeIdAllocator::new()
    }

    #[test]
    fn first_observation_is_recorded_as_is() {
        let rebinder = LocalNamesRebinder::new();
        let int8 = TypeSpec::builtin_base(TypeId::Int8);
        rebinder.record("T", &int8, &alloc()).unwrap();
        assert!(rebinder.binding("T").unwrap().is_equal(&int8));
    }

    #[test]
    fn null_then_plain_type_wraps_nullable() {
        let rebinder = LocalNamesRebinder::new();
        let a = alloc();
        rebinder.record("T", &TypeSpec::null(), &a).unwrap();
        let int8 = TypeSpec::builtin_base(TypeId::Int8);
        rebinder.record("T", &int8, &a).unwrap();
        let bound = rebinder.binding("T").unwrap();
        assert_eq!(bound.type_id(), TypeId::Nullable);
        assert!(bound.result_type().unwrap().is_equal(&int8));
    }

    #[test]
    fn any_then_concrete_accepts_concrete() {
        let rebinder = LocalNamesRebinder::new();
        let a = alloc();
        rebinder.record("T", &TypeSpec::any(), &a).unwrap();
        let string = TypeSpec::builtin_base(TypeId::String);
        rebinder.record("T", &string, &a).unwrap();
        assert!(rebinder.binding("T").unwrap().is_equal(&string));
    }

    #[test]
    fn incompatible_concrete_bindings_fail() {
        let rebinder = LocalNamesRebinder::new();
        let a = alloc();
        rebinder
            .record("T", &TypeSpec::builtin_base(TypeId::String), &a)
            .unwrap();
        let err = rebinder
            .record("T", &TypeSpec::builtin_base(TypeId::Bool), &a)
            .unwrap_err();
        assert_eq!(err.kind(), nudl_common::ErrorKind::InvalidArgument);
    }

    #[test]
    fn rebuild_type_substitutes_local_name_inside_parametric_type() {
        let rebinder = LocalNamesRebinder::new();
        let a = alloc();
        let numeric = TypeSpec::builtin_base(TypeId::Numeric);
        let t = TypeSpec::local_type_variable("T", Some(numeric));
        let array_of_t = TypeSpec::builtin_base(TypeId::Array)
            .bind(&[BindArg::Type(t)], &a)
            .unwrap();

        let int32 = TypeSpec::builtin_base(TypeId::Int32);
        rebinder.record("T", &int32, &a).unwrap();

        let rebuilt = rebinder.rebuild_type(&array_of_t, &a).unwrap();
        assert_eq!(rebuilt.type_id(), TypeId::Array);
        assert!(rebuilt.parameters()[0].is_equal(&int32));
    }

    #[test]
    fn rebuild_function_with_components_preserves_slot_names() {
        let rebinder = LocalNamesRebinder::new();
        let a = alloc();
        let int = TypeSpec::builtin_base(TypeId::Int);
        let function = TypeSpec::builtin_base(TypeId::Function)
            .bind(
                &[
                    BindArg::Named("x".to_string(), int.clone()),
                    BindArg::Type(int.clone()),
                ],
                &a,
            )
            .unwrap();
        let bool_ty = TypeSpec::builtin_base(TypeId::Bool);
        let rebuilt = rebinder
            .rebuild_function_with_components(&function, &[int.clone(), bool_ty.clone()], &a)
            .unwrap();
        assert_eq!(rebuilt.slot_name(0), Some("x"));
        assert!(rebuilt.result_type().unwrap().is_equal(&bool_ty));
    }
}
