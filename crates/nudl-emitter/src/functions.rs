//! Struct (`dataclass`) and function (`def`) emission.
//!
//! Grounded on `tsz-emitter/src/emitter/declarations.rs`, which walks the
//! checker's type/function declarations and prints their `.d.ts`
//! equivalents; here the target is a Python `@dataclasses.dataclass` for
//! every struct and a `def` for every function, with the field-usage
//! pruning of spec §4.8 and the overload-instance naming spec §4.7's
//! `FunctionGroup.instances` calls for.

use std::rc::Rc;

use nudl_common::{CompilerOptions, NudlError, NudlResult};
use nudl_types::named_object::NamedObject;
use nudl_types::type_member_store::TypeMemberStore;
use nudl_types::TypeSpec;

use nudl_checker::field_usage::FieldUsageVisitor;
use nudl_checker::Function;

use crate::emit_context::EmitState;
use crate::expressions::{emit_tail, emit_value};
use crate::identifiers::rename_identifier;
use crate::types::{struct_class_name, type_annotation};

/// The Python name a concrete function emits/calls under: its own
/// (renamed) declared name when it's not an instantiation of an abstract
/// declaration, otherwise that name suffixed with a signature-derived tag
/// so sibling instances of the same generic function don't collide.
#[must_use]
pub fn python_function_name(function: &Rc<Function>) -> String {
    let base = rename_identifier(function.name(), function.skip_conversion());
    if function.binding_parent().is_some() {
        format!("{base}__{}", instance_tag(function))
    } else {
        base
    }
}

fn instance_tag(function: &Function) -> String {
    let raw: String = function
        .arguments()
        .iter()
        .map(|a| a.declared_type().type_signature())
        .collect::<Vec<_>>()
        .join("_");
    crate::identifiers::sanitize_qualified_name(&raw)
}

/// Emits a struct type as a `@dataclasses.dataclass` class, pruning
/// fields [`FieldUsageVisitor`] never saw read in this module (spec §4.8).
pub fn emit_struct(
    struct_type: &TypeSpec,
    usage: &FieldUsageVisitor,
    state: &mut EmitState,
    options: &CompilerOptions,
) -> NudlResult<()> {
    let class_name = struct_class_name(struct_type, options.short_proto_output);
    if !state.mark_struct_seen(struct_type.full_name()) {
        return Ok(());
    }
    let store: Rc<TypeMemberStore> = struct_type.member_store().ok_or_else(|| {
        NudlError::internal(format!("struct `{}` has no member store", struct_type.full_name()))
    })?;
    let used = usage.fields_of(&struct_type.full_name());
    tracing::debug!(name = %class_name, fields = store.fields().len(), "emitting struct");
    state.require_import("dataclasses");
    state.write_line("@dataclasses.dataclass");
    state.write_line(&format!("class {class_name}:"));
    state.indent();
    let mut wrote_any = false;
    for field in store.fields() {
        if !used.is_empty() && !used.contains(field.name()) {
            continue;
        }
        wrote_any = true;
        let annotation = type_annotation(field.field_type(), options.short_proto_output, state)?;
        let default = default_literal(field.field_type(), options, state)?;
        match default {
            Some(default) => state.write_line(&format!("{}: {annotation} = {default}", rename_identifier(field.name(), false))),
            None => state.write_line(&format!("{}: {annotation}", rename_identifier(field.name(), false))),
        }
    }
    if !wrote_any {
        state.write_line("pass");
    }
    state.dedent();
    state.blank_line();
    Ok(())
}

/// An implicit default for a struct field or trailing argument lacking an
/// explicit one: only synthesized for `Nullable<T>` (spec §6 "non-null
/// default for Nullable"), and only when `nullable_default_is_value` asks
/// for `default(T)` rather than the null literal.
fn default_literal(ty: &TypeSpec, options: &CompilerOptions, state: &mut EmitState) -> NudlResult<Option<String>> {
    if ty.type_id() != nudl_types::TypeId::Nullable {
        return Ok(None);
    }
    if !options.nullable_default_is_value {
        return Ok(Some("None".to_string()));
    }
    let inner = ty
        .result_type()
        .ok_or_else(|| NudlError::internal("Nullable type has no inner type"))?;
    Ok(Some(zero_value(&inner, options, state)?))
}

fn zero_value(ty: &TypeSpec, options: &CompilerOptions, state: &mut EmitState) -> NudlResult<String> {
    use nudl_types::TypeId::*;
    Ok(match ty.type_id() {
        Int | Int8 | Int16 | Int32 | UInt | UInt8 | UInt16 | UInt32 | Integral | Numeric => "0".to_string(),
        Float64 | Float32 => "0.0".to_string(),
        Decimal => {
            state.require_import("decimal");
            "decimal.Decimal(0)".to_string()
        }
        String => "\"\"".to_string(),
        Bytes => "b\"\"".to_string(),
        Bool => "False".to_string(),
        Array | Container => "[]".to_string(),
        Set => "set()".to_string(),
        Map => "{}".to_string(),
        Tuple => "()".to_string(),
        Nullable => "None".to_string(),
        Struct | User(_) => format!("{}()", struct_class_name(ty, options.short_proto_output)),
        other => {
            return Err(NudlError::unimplemented(format!(
                "no implicit default literal for type id {other:?}"
            )))
        }
    })
}

/// Emits `function` as a top-level `def`. Abstract declarations have no
/// Python form of their own (spec §4.7: generics are resolved per call
/// site, not emitted); only a `Concrete` function or a concrete instance
/// reaches here.
pub fn emit_function(function: &Rc<Function>, state: &mut EmitState, options: &CompilerOptions) -> NudlResult<()> {
    if !state.mark_function_seen(function) {
        tracing::trace!(name = function.name(), "function already emitted, skipping");
        return Ok(());
    }
    if function.is_abstract() {
        tracing::trace!(name = function.name(), "skipping abstract declaration, no def of its own");
        return Ok(());
    }
    tracing::debug!(name = function.name(), instance = function.binding_parent().is_some(), "emitting function");
    let signature = function_signature(function, state, options)?;
    state.write_line(&signature);
    state.indent();
    state.push_call(Rc::clone(function));
    match function.body() {
        Some(body) => emit_tail(&body, state, options)?,
        None => state.write_line("raise NotImplementedError"),
    }
    state.pop_call();
    state.dedent();
    state.blank_line();
    function.mark_emitted()
}

/// Renders a concrete function instance's `def` into its own buffer
/// rather than directly into `state`'s main output, for splicing in
/// ahead of the statement that first calls it.
pub fn render_instance_def(function: &Rc<Function>, state: &mut EmitState, options: &CompilerOptions) -> NudlResult<String> {
    let mut scratch = EmitState::new();
    emit_function(function, &mut scratch, options)?;
    for import in scratch.imports() {
        state.require_import(import);
    }
    Ok(scratch.into_source())
}

/// A nested `def` inside another function's body (spec §4.6
/// `FunctionDefinition`): same rendering, just at the current indent.
pub fn emit_nested_function(function: &Rc<Function>, state: &mut EmitState, options: &CompilerOptions) -> NudlResult<()> {
    emit_function(function, state, options)
}

fn function_signature(function: &Function, state: &mut EmitState, options: &CompilerOptions) -> NudlResult<String> {
    let name = python_function_name_ref(function);
    let mut parts = Vec::with_capacity(function.arguments().len());
    let defaults_start = function.first_default_value_index().unwrap_or(function.arguments().len());
    for (i, arg) in function.arguments().iter().enumerate() {
        let annotation = type_annotation(&arg.declared_type(), options.short_proto_output, state)?;
        let arg_name = rename_identifier(arg.name(), false);
        if let Some(default_expr) = arg.default_value() {
            let default_text = emit_value(&default_expr, state, options)?;
            parts.push(format!("{arg_name}: {annotation} = {default_text}"));
        } else if i >= defaults_start {
            match default_literal(&arg.declared_type(), options, state)? {
                Some(default_text) => parts.push(format!("{arg_name}: {annotation} = {default_text}")),
                None => {
                    return Err(NudlError::internal(format!(
                        "argument `{}` of `{}` has no default but follows one",
                        arg.name(),
                        function.name()
                    )))
                }
            }
        } else {
            parts.push(format!("{arg_name}: {annotation}"));
        }
    }
    let result_type = function.result_type().ok_or_else(|| {
        NudlError::internal(format!("function `{}` has no result type set", function.name()))
    })?;
    let result_annotation = type_annotation(&result_type, options.short_proto_output, state)?;
    Ok(format!("def {name}({}) -> {result_annotation}:", parts.join(", ")))
}

fn python_function_name_ref(function: &Function) -> String {
    let base = rename_identifier(function.name(), function.skip_conversion());
    if function.binding_parent().is_some() {
        format!("{base}__{}", instance_tag(function))
    } else {
        base
    }
}
