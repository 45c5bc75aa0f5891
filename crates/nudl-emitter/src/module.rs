//! Top-level driver: assembles one analyzed [`Module`] into a complete
//! Python source file, plus the small runnable entry-point file a `main`
//! function produces (spec §6).
//!
//! Grounded on `tsz-emitter/src/lib.rs`'s `emit_file` entry point: walk
//! the module's top-level expressions in source order, rendering structs,
//! functions, and statements into one buffer, then prepend the imports
//! that rendering pass discovered it needed.

use nudl_common::{CompilerOptions, NudlResult};

use nudl_binder::var_base::TypedExpr;
use nudl_binder::Module;

use nudl_checker::field_usage::FieldUsageVisitor;
use nudl_checker::{Expression, ExpressionKind};

use crate::emit_context::EmitState;
use crate::expressions::emit_statement;
use crate::functions::{emit_function, emit_struct};

/// Renders `module` as a complete Python source file.
pub fn emit_module(module: &Module, options: &CompilerOptions) -> NudlResult<String> {
    tracing::debug!(dependencies = module.dependencies().len(), "emit_module called");
    let usage = FieldUsageVisitor::new();
    usage.visit_module(module);

    let mut state = EmitState::new();
    // `Module::top_level` hands out `Rc<dyn TypedExpr>`; everything this
    // crate ever pushes there is concretely an `Expression` (spec §3), so
    // the downcast always succeeds. Kept alive across all three passes,
    // same as `FieldUsageVisitor::visit_module`'s own downcast.
    let top_level = module.top_level();
    let exprs: Vec<&Expression> = top_level
        .iter()
        .filter_map(|expr| expr.as_any().downcast_ref::<Expression>())
        .collect();

    for expr in &exprs {
        if let ExpressionKind::SchemaDefinition { struct_type } = expr.kind() {
            emit_struct(struct_type, &usage, &mut state, options)?;
        }
    }
    for expr in &exprs {
        if let ExpressionKind::FunctionDefinition { function } = expr.kind() {
            emit_function(function, &mut state, options)?;
        }
    }
    for expr in &exprs {
        match expr.kind() {
            ExpressionKind::SchemaDefinition { .. } | ExpressionKind::FunctionDefinition { .. } => {}
            _ => emit_statement(expr, &mut state, options)?,
        }
    }

    let imports = state.imports();
    let instance_defs = state.instance_defs().join("\n");
    tracing::trace!(count = imports.len(), "required imports collected");
    let body = state.into_source();

    let mut out = String::new();
    for import in &imports {
        out.push_str(&format!("import {import}\n"));
    }
    if !imports.is_empty() {
        out.push('\n');
    }
    if !instance_defs.is_empty() {
        out.push_str(&instance_defs);
        out.push('\n');
    }
    out.push_str(&body);
    Ok(out)
}

/// Renders the small runnable entry-point file a module's `main` function
/// produces (spec §6): imports the module and invokes `main`.
#[must_use]
pub fn emit_entrypoint(module_file_stem: &str, main_function_name: &str) -> String {
    format!(
        "import {module_file_stem}\n\nif __name__ == \"__main__\":\n    {module_file_stem}.{main_function_name}()\n"
    )
}
