//! Renders a bound `TypeSpec` as a Python type annotation.
//!
//! Grounded on the declaration-to-target-syntax mapping in
//! `tsz-emitter/src/declaration_emitter/mod.rs` (there, a `tsz` type is
//! rendered as a `.d.ts` type annotation; here, a NuDL `TypeSpec` is
//! rendered as a `typing`-module Python annotation). Every case requires
//! its `TypeSpec` to be bound (spec §3 `IsBound`): an unbound type reaching
//! the emitter is the internal error spec §4.9 calls out ("every expression
//! has a cached type ... a violation is an internal error").

use nudl_common::{NudlError, NudlResult};
use nudl_types::{TypeId, TypeSpec};

use crate::emit_context::EmitState;
use crate::identifiers::sanitize_qualified_name;

/// Renders `ty` as a Python type annotation, registering whatever imports
/// (`typing`, `datetime`, `decimal`) the rendering needs against `state`.
///
/// `short_proto_output` (spec §6) renders a struct by its bare class name
/// rather than a fully qualified one; it has no other effect since this
/// emitter has no separate "structural proto" form to fall back to.
pub fn type_annotation(ty: &TypeSpec, short_proto_output: bool, state: &mut EmitState) -> NudlResult<String> {
    if !ty.is_bound() {
        return Err(NudlError::internal(format!(
            "cannot emit an annotation for unbound type `{}`",
            ty.full_name()
        )));
    }
    render(ty, short_proto_output, state)
}

fn render(ty: &TypeSpec, short_proto_output: bool, state: &mut EmitState) -> NudlResult<String> {
    use TypeId::*;
    match ty.type_id() {
        Any => {
            state.require_import("typing");
            Ok("typing.Any".to_string())
        }
        Null => Ok("None".to_string()),
        Int | Int8 | Int16 | Int32 | UInt | UInt8 | UInt16 | UInt32 | Integral => {
            Ok("int".to_string())
        }
        Float64 | Float32 => Ok("float".to_string()),
        Decimal => {
            state.require_import("decimal");
            Ok("decimal.Decimal".to_string())
        }
        Numeric => {
            state.require_import("typing");
            Ok("typing.Union[int, float]".to_string())
        }
        String => Ok("str".to_string()),
        Bytes => Ok("bytes".to_string()),
        Bool => Ok("bool".to_string()),
        Date => {
            state.require_import("datetime");
            Ok("datetime.date".to_string())
        }
        Timestamp | DateTime => {
            state.require_import("datetime");
            Ok("datetime.datetime".to_string())
        }
        TimeInterval => {
            state.require_import("datetime");
            Ok("datetime.timedelta".to_string())
        }
        Array | Container => {
            state.require_import("typing");
            let inner = element_annotation(ty, short_proto_output, state)?;
            Ok(format!("typing.List[{inner}]"))
        }
        Set => {
            state.require_import("typing");
            let inner = element_annotation(ty, short_proto_output, state)?;
            Ok(format!("typing.Set[{inner}]"))
        }
        Map => {
            state.require_import("typing");
            let key = ty
                .parameters()
                .first()
                .ok_or_else(|| NudlError::internal("Map type has no key parameter"))?;
            let value = ty
                .parameters()
                .get(1)
                .ok_or_else(|| NudlError::internal("Map type has no value parameter"))?;
            let key = render(key, short_proto_output, state)?;
            let value = render(value, short_proto_output, state)?;
            Ok(format!("typing.Dict[{key}, {value}]"))
        }
        Iterable | Generator | Dataset => {
            state.require_import("typing");
            let inner = element_annotation(ty, short_proto_output, state)?;
            Ok(format!("typing.Iterator[{inner}]"))
        }
        Tuple => {
            state.require_import("typing");
            if ty.parameters().is_empty() {
                return Ok("typing.Tuple[()]".to_string());
            }
            let mut parts = Vec::with_capacity(ty.parameters().len());
            for p in ty.parameters() {
                parts.push(render(p, short_proto_output, state)?);
            }
            Ok(format!("typing.Tuple[{}]", parts.join(", ")))
        }
        Function => {
            state.require_import("typing");
            let params = &ty.parameters()[..ty.parameters().len().saturating_sub(1)];
            let mut arg_parts = Vec::with_capacity(params.len());
            for p in params {
                arg_parts.push(render(p, short_proto_output, state)?);
            }
            let result = ty
                .result_type()
                .ok_or_else(|| NudlError::internal("Function type has no result type"))?;
            let result = render(&result, short_proto_output, state)?;
            Ok(format!("typing.Callable[[{}], {result}]", arg_parts.join(", ")))
        }
        Union => {
            state.require_import("typing");
            let mut parts = Vec::with_capacity(ty.parameters().len());
            for p in ty.parameters() {
                parts.push(render(p, short_proto_output, state)?);
            }
            Ok(format!("typing.Union[{}]", parts.join(", ")))
        }
        Nullable => {
            state.require_import("typing");
            let inner = ty
                .result_type()
                .ok_or_else(|| NudlError::internal("Nullable type has no inner type"))?;
            let inner = render(&inner, short_proto_output, state)?;
            Ok(format!("typing.Optional[{inner}]"))
        }
        Struct | User(_) => Ok(struct_class_name(ty, short_proto_output)),
        Type => Ok("type".to_string()),
        Module => Err(NudlError::internal("cannot emit an annotation for a Module type")),
        TupleJoin | DatasetAggregate | DatasetJoin => Err(NudlError::internal(format!(
            "generator type `{}` reached the emitter unbound",
            ty.full_name()
        ))),
    }
}

fn element_annotation(ty: &TypeSpec, short_proto_output: bool, state: &mut EmitState) -> NudlResult<String> {
    let inner = ty
        .result_type()
        .ok_or_else(|| NudlError::internal(format!("`{}` has no element type", ty.full_name())))?;
    render(&inner, short_proto_output, state)
}

/// The Python class name a struct type emits as: its bare name if
/// `short_proto_output`, otherwise its qualified name sanitized into a
/// valid identifier (Python classes can't have `.` in their name).
#[must_use]
pub fn struct_class_name(ty: &TypeSpec, short_proto_output: bool) -> String {
    if short_proto_output {
        sanitize_qualified_name(ty.name().rsplit('.').next().unwrap_or(ty.name()))
    } else {
        sanitize_qualified_name(ty.name())
    }
}
